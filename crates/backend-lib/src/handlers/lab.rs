//! Lab head pages. Every render keeps the lab activated for another
//! heartbeat window.
use axum::{
    extract::{Path, State},
    Json,
};
use labpass_common::{CodeKind, LabCodeResponse, KEYNOTE};

use super::CurrentSession;
use crate::error::AppError;
use crate::validation::canonical_lab_name;
use crate::AppState;

pub async fn booth_page(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(lab): Path<String>,
) -> Result<Json<LabCodeResponse>, AppError> {
    lab_page(&state, &current, &lab, CodeKind::Booth).await.map(Json)
}

pub async fn talk_page(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(lab): Path<String>,
) -> Result<Json<LabCodeResponse>, AppError> {
    lab_page(&state, &current, &lab, CodeKind::Talk).await.map(Json)
}

/// The keynote shows only a talk code and belongs to the officers
pub async fn keynote_page(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Result<Json<LabCodeResponse>, AppError> {
    current.require_officer(&state)?;
    render(&state, KEYNOTE, CodeKind::Talk).await.map(Json)
}

async fn lab_page(
    state: &AppState,
    current: &CurrentSession,
    raw_lab: &str,
    kind: CodeKind,
) -> Result<LabCodeResponse, AppError> {
    let session = current.require_lab_head()?;
    let lab = canonical_lab_name(raw_lab);
    if !state.catalog.contains(&lab) {
        return Err(AppError::UnknownLab(lab));
    }
    if session.lab.as_deref() != Some(lab.as_str()) && !state.is_officer(session) {
        return Err(AppError::Forbidden(format!("Not the lab head of {lab}")));
    }
    render(state, &lab, kind).await
}

async fn render(state: &AppState, lab: &str, kind: CodeKind) -> Result<LabCodeResponse, AppError> {
    state.watchdog.ping(lab).await?;
    let code = state.registry.get_code(lab, kind)?;
    let clock = state.clock_for(kind);
    Ok(LabCodeResponse {
        lab_name: lab.to_string(),
        code,
        countdown: clock.remaining(),
        period: clock.period(),
        kind,
    })
}
