// ============================
// labpass-backend/src/handlers/mod.rs
// ============================
//! HTTP handlers, grouped by who calls them.

pub mod admin;
pub mod auth;
pub mod lab;
pub mod student;

use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};
use labpass_common::Role;

use crate::auth::Session;
use crate::error::AppError;
use crate::AppState;

/// Bearer session resolved from the `Authorization` header
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub token: String,
    pub session: Session,
}

impl CurrentSession {
    pub fn require_student(&self) -> Result<&Session, AppError> {
        match self.session.role {
            Role::Student => Ok(&self.session),
            Role::LabHead => Err(AppError::Forbidden("Students only".to_string())),
        }
    }

    pub fn require_lab_head(&self) -> Result<&Session, AppError> {
        match self.session.role {
            Role::LabHead => Ok(&self.session),
            Role::Student => Err(AppError::Forbidden("Lab heads only".to_string())),
        }
    }

    /// Lab head session of the officers account
    pub fn require_officer(&self, state: &AppState) -> Result<&Session, AppError> {
        let session = self.require_lab_head()?;
        if !state.is_officer(session) {
            return Err(AppError::Forbidden("Officers only".to_string()));
        }
        Ok(session)
    }
}

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Auth("Missing bearer token".to_string()))?;

        let session = state
            .sessions
            .get(token)
            .await
            .ok_or_else(|| AppError::Auth("Session expired or invalid".to_string()))?;

        Ok(Self {
            token: token.to_string(),
            session,
        })
    }
}
