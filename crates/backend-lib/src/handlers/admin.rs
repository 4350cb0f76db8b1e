//! Officers-only catalog management.
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use labpass_common::{AddLabRequest, LabChangeResponse, LabListResponse};

use super::CurrentSession;
use crate::catalog::CatalogChange;
use crate::error::AppError;
use crate::AppState;

pub async fn list_labs(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Result<Json<LabListResponse>, AppError> {
    current.require_officer(&state)?;
    Ok(Json(LabListResponse {
        labs: state.catalog.list(),
    }))
}

pub async fn add_lab(
    State(state): State<AppState>,
    current: CurrentSession,
    Json(body): Json<AddLabRequest>,
) -> Result<(StatusCode, Json<LabChangeResponse>), AppError> {
    current.require_officer(&state)?;
    let change = state.catalog.add(&body.name, body.head.as_ref()).await?;
    Ok((StatusCode::CREATED, Json(change_response(&state, change))))
}

pub async fn remove_lab(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(lab): Path<String>,
) -> Result<Json<LabChangeResponse>, AppError> {
    current.require_officer(&state)?;
    let change = state.catalog.remove(&lab).await?;
    Ok(Json(change_response(&state, change)))
}

fn change_response(state: &AppState, change: CatalogChange) -> LabChangeResponse {
    LabChangeResponse {
        name: change.name,
        labs: state.catalog.list(),
        checklists: change.checklists,
        cascade_complete: change.cascade_complete,
    }
}
