//! Sign-in, lab head login and logout.
use axum::{extract::State, http::StatusCode, Json};
use labpass_common::{IdentityRequest, LabLoginRequest, Role, SessionResponse};
use tracing::info;

use super::CurrentSession;
use crate::auth::{login_lab_head, sign_in_student};
use crate::error::AppError;
use crate::AppState;

/// Student sign-in with the subject forwarded by the identity provider
pub async fn identity(
    State(state): State<AppState>,
    Json(body): Json<IdentityRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let account = sign_in_student(state.storage.as_ref(), &body.subject).await?;

    if account.is_registered() && state.settings.event.register_only {
        return Ok(Json(SessionResponse {
            session_token: None,
            redirect: "/registered".to_string(),
        }));
    }

    let redirect = if account.is_registered() {
        "/student"
    } else {
        "/student/register"
    };
    let token = state
        .sessions
        .new_session(account.sub_id, Role::Student, None)
        .await;

    Ok(Json(SessionResponse {
        session_token: Some(token),
        redirect: redirect.to_string(),
    }))
}

pub async fn lab_login(
    State(state): State<AppState>,
    Json(body): Json<LabLoginRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let account = login_lab_head(state.storage.as_ref(), &body.username, &body.password).await?;
    let lab = account
        .name
        .clone()
        .ok_or_else(|| AppError::Forbidden("Account has no lab".to_string()))?;

    let redirect = if lab == state.settings.event.officers_name {
        "/lab/keynote".to_string()
    } else {
        format!("/lab/{lab}")
    };
    let token = state
        .sessions
        .new_session(account.sub_id, Role::LabHead, Some(lab.clone()))
        .await;
    info!(lab = %lab, "lab head logged in");

    Ok(Json(SessionResponse {
        session_token: Some(token),
        redirect,
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    current: CurrentSession,
) -> StatusCode {
    state.sessions.remove(&current.token).await;
    StatusCode::NO_CONTENT
}
