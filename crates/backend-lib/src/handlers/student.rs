//! Student pages: registration, checklist, code submission.
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use labpass_common::{
    Account, CheckOutcome, Checklist, ChecklistResponse, CodeCheckRequest, CodeCheckResponse,
    RegisterRequest, RegisterResponse, SeminarCheckRequest, StudentLabResponse, TALK_ENTRY,
    TALK_LAB,
};
use metrics::counter;
use tracing::{info, warn};

use super::CurrentSession;
use crate::error::AppError;
use crate::metrics::{CODE_CHECK_ACCEPTED, CODE_CHECK_REJECTED};
use crate::validation::{self, canonical_lab_name};
use crate::AppState;

const NOT_ACTIVATED: &str = "Code not yet activated.";
const INCORRECT: &str = "Incorrect code. Please check the code from lab head.";

pub async fn register(
    State(state): State<AppState>,
    current: CurrentSession,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, AppError> {
    let session = current.require_student()?;
    let mut account = find_account(&state, &session.sub_id).await?;
    if account.is_registered() {
        return Err(AppError::InvalidInput("Account is already registered.".to_string()));
    }

    let id_num = validation::validate_id_number(&body.id_num, &body.id_num_confirm)?.to_string();
    let course = validation::validate_course(body.course)?;
    if state.storage.find_by_id_num(&id_num).await?.is_some() {
        return Err(AppError::InvalidInput("ID Number already registered.".to_string()));
    }

    account.id_num = Some(id_num.clone());
    account.course = course;
    state.storage.save(&account).await?;
    state.catalog.create_checklist(&id_num).await?;
    info!(id_num = %id_num, "student registered");

    let logged_out = state.settings.event.register_only;
    if logged_out {
        state.sessions.remove(&current.token).await;
    }
    Ok(Json(RegisterResponse { id_num, logged_out }))
}

pub async fn checklist(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Result<Json<ChecklistResponse>, AppError> {
    let (_, checklist) = registered(&state, &current).await?;
    Ok(Json(to_response(checklist)))
}

pub async fn lab_page(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(lab): Path<String>,
) -> Result<Json<StudentLabResponse>, AppError> {
    let (id_num, checklist) = registered(&state, &current).await?;
    let lab = canonical_lab_name(&lab);
    if !state.catalog.contains(&lab) {
        return Err(AppError::UnknownLab(lab));
    }
    if checklist.is_visited(&lab) {
        return Err(AppError::AlreadyVisited(lab));
    }
    Ok(Json(StudentLabResponse { lab, id_num }))
}

pub async fn seminar_page(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Result<Json<StudentLabResponse>, AppError> {
    let (id_num, checklist) = registered(&state, &current).await?;
    if checklist.is_visited(TALK_ENTRY) {
        return Err(AppError::AlreadyVisited(TALK_ENTRY.to_string()));
    }
    Ok(Json(StudentLabResponse {
        lab: TALK_ENTRY.to_string(),
        id_num,
    }))
}

pub async fn code_check(
    State(state): State<AppState>,
    current: CurrentSession,
    Json(body): Json<CodeCheckRequest>,
) -> Result<Json<CodeCheckResponse>, AppError> {
    let (id_num, checklist) = registered(&state, &current).await?;
    let lab = canonical_lab_name(&body.lab_name);
    if !state.catalog.contains(&lab) {
        return Err(AppError::UnknownLab(lab));
    }
    if checklist.is_visited(&lab) {
        return Err(AppError::AlreadyVisited(lab));
    }

    let activated = state.registry.is_activated(&lab);
    let outcome = submit(&state, &current, &lab, &body.code, activated)?;
    respond(&state, &id_num, &lab, &lab, outcome).await
}

/// The seminar code is accepted from whichever lab is presenting
pub async fn seminar_check(
    State(state): State<AppState>,
    current: CurrentSession,
    Json(body): Json<SeminarCheckRequest>,
) -> Result<Json<CodeCheckResponse>, AppError> {
    let (id_num, checklist) = registered(&state, &current).await?;
    if checklist.is_visited(TALK_ENTRY) {
        return Err(AppError::AlreadyVisited(TALK_ENTRY.to_string()));
    }

    let activated = !state.registry.active_labs().is_empty();
    let outcome = submit(&state, &current, TALK_LAB, &body.code, activated)?;
    respond(&state, &id_num, TALK_ENTRY, TALK_ENTRY, outcome).await
}

pub async fn done(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Result<Json<ChecklistResponse>, AppError> {
    let (_, checklist) = registered(&state, &current).await?;
    if !checklist.is_complete() {
        return Err(AppError::Forbidden("Checklist is not complete".to_string()));
    }
    Ok(Json(to_response(checklist)))
}

/// Check a submission against `lab` and update the attempt counter
fn submit(
    state: &AppState,
    current: &CurrentSession,
    lab: &str,
    code: &str,
    activated: bool,
) -> Result<CheckOutcome, AppError> {
    let key = current.session.sub_id.as_str();
    if !state.code_attempts.check(key) {
        return Err(AppError::AttemptsExceeded);
    }
    if !activated {
        return Ok(CheckOutcome::NotActivated);
    }

    let accepted = validation::validate_code(code).is_ok() && state.registry.check_code(lab, code);
    if accepted {
        state.code_attempts.record_success(key);
        counter!(CODE_CHECK_ACCEPTED).increment(1);
        Ok(CheckOutcome::Accepted)
    } else {
        state.code_attempts.record_failure(key);
        counter!(CODE_CHECK_REJECTED).increment(1);
        Ok(CheckOutcome::Incorrect)
    }
}

async fn respond(
    state: &AppState,
    id_num: &str,
    entry: &str,
    display: &str,
    outcome: CheckOutcome,
) -> Result<Json<CodeCheckResponse>, AppError> {
    let message = match outcome {
        CheckOutcome::Accepted => {
            let marked = state.storage.mark_visited(id_num, entry, Utc::now()).await?;
            if !marked {
                warn!(id_num = %id_num, entry = %entry, "accepted code for a missing checklist entry");
                return Err(AppError::NotFound(format!("{entry} is not on the checklist")));
            }
            info!(id_num = %id_num, entry = %entry, "visit recorded");
            format!("{display} Code accepted.")
        }
        CheckOutcome::NotActivated => NOT_ACTIVATED.to_string(),
        CheckOutcome::Incorrect => INCORRECT.to_string(),
    };
    Ok(Json(CodeCheckResponse {
        lab_name: display.to_string(),
        outcome,
        message,
    }))
}

async fn find_account(state: &AppState, sub_id: &str) -> Result<Account, AppError> {
    state
        .storage
        .find_by_subject(sub_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Account not found".to_string()))
}

/// Registered student and their checklist
async fn registered(state: &AppState, current: &CurrentSession) -> Result<(String, Checklist), AppError> {
    let session = current.require_student()?;
    let account = find_account(state, &session.sub_id).await?;
    if !account.is_registered() {
        return Err(AppError::NotRegistered);
    }
    let id_num = account.id_num.ok_or(AppError::NotRegistered)?;
    let checklist = state
        .storage
        .find_by_student(&id_num)
        .await?
        .ok_or_else(|| AppError::NotFound("Checklist not found".to_string()))?;
    Ok((id_num, checklist))
}

fn to_response(checklist: Checklist) -> ChecklistResponse {
    ChecklistResponse {
        complete: checklist.is_complete(),
        id_num: checklist.id_num,
        lab_list: checklist.lab_list,
    }
}
