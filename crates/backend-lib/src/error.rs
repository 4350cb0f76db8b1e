// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unknown lab: {0}")]
    UnknownLab(String),

    #[error("Lab already exists: {0}")]
    DuplicateLab(String),

    #[error("Lab name is reserved: {0}")]
    ReservedLab(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Account is not registered")]
    NotRegistered,

    #[error("Already visited: {0}")]
    AlreadyVisited(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Too many incorrect codes")]
    AttemptsExceeded,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::NotRegistered => StatusCode::FORBIDDEN,
            AppError::UnknownLab(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateLab(_) | AppError::AlreadyVisited(_) => StatusCode::CONFLICT,
            AppError::ReservedLab(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimitExceeded | AppError::AttemptsExceeded => {
                StatusCode::TOO_MANY_REQUESTS
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::UnknownLab(_) => "LAB_001",
            AppError::DuplicateLab(_) => "LAB_002",
            AppError::ReservedLab(_) => "LAB_003",
            AppError::Configuration(_) => "CFG_001",
            AppError::Persistence(_) => "STORE_001",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
            AppError::Auth(_) => "AUTH_001",
            AppError::Forbidden(_) => "AUTH_002",
            AppError::NotFound(_) => "NF_001",
            AppError::NotRegistered => "REG_001",
            AppError::AlreadyVisited(_) => "CHK_001",
            AppError::InvalidInput(_) => "VAL_001",
            AppError::RateLimitExceeded => "RATE_001",
            AppError::AttemptsExceeded => "RATE_002",
            AppError::Internal(_) => "INT_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::UnknownLab(_) => "Invalid lab".to_string(),
            AppError::DuplicateLab(lab) => format!("Lab {lab} already exists"),
            AppError::ReservedLab(lab) => format!("Lab name {lab} is reserved"),
            AppError::Auth(_) => "Authentication failed".to_string(),
            AppError::Forbidden(_) => "You are unauthorized to access that route".to_string(),
            AppError::NotFound(_) => "Resource not found".to_string(),
            AppError::NotRegistered => "Please register first".to_string(),
            AppError::AlreadyVisited(lab) => format!("You have already visited {lab}"),
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::RateLimitExceeded => {
                "Rate limit exceeded, please try again later".to_string()
            },
            AppError::AttemptsExceeded => {
                "Too many incorrect codes, please try again later".to_string()
            },
            AppError::Json(_) => "Invalid request format".to_string(),
            AppError::Configuration(_)
            | AppError::Persistence(_)
            | AppError::Io(_)
            | AppError::Internal(_) => {
                "An internal error occurred, approach the registration booth".to_string()
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %self, "request failed");
        }

        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for AppError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        AppError::Internal("Failed to receive response".to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for AppError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        AppError::Internal("Failed to send message".to_string())
    }
}

impl From<figment::Error> for AppError {
    fn from(err: figment::Error) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}
