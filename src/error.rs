use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Event has already started")]
    AlreadyStarted,
    #[error("Event is full")]
    EventFull,
    #[error("Already registered for this event")]
    AlreadyRegistered,
    #[error("Not registered for this event")]
    NotRegistered,
    #[error("Token is invalid or expired")]
    InvalidOrExpiredToken,
    #[error("Too many requests for {action}, retry in {retry_after_secs}s")]
    RateLimited {
        action: &'static str,
        retry_after_secs: u64,
    },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal server error")]
    Internal,
    #[error("Internal server error: {0}")]
    InternalWithMsg(String),
}

/// Caller-facing classification of an [`AppError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Forbidden,
    InvalidState,
    RateLimited,
    Expired,
    Invalid,
    Internal,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Database(e) if is_unique_violation(e) => ErrorKind::Conflict,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Forbidden(_) => ErrorKind::Forbidden,
            AppError::Validation(_) => ErrorKind::Invalid,
            AppError::AlreadyStarted | AppError::NotRegistered => ErrorKind::InvalidState,
            AppError::EventFull | AppError::AlreadyRegistered => ErrorKind::Conflict,
            AppError::InvalidOrExpiredToken => ErrorKind::Expired,
            AppError::RateLimited { .. } => ErrorKind::RateLimited,
            AppError::Database(_)
            | AppError::Config(_)
            | AppError::Internal
            | AppError::InternalWithMsg(_) => ErrorKind::Internal,
        }
    }
}

// 2067 = SQLite unique constraint, 23505 = PostgreSQL unique violation
fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db_err| db_err.code())
        .is_some_and(|code| code == "2067" || code == "23505")
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::InvalidState | ErrorKind::Expired | ErrorKind::Invalid => StatusCode::BAD_REQUEST,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            AppError::Database(e) if status == StatusCode::CONFLICT => {
                tracing::debug!("Unique violation: {:?}", e);
                "Resource already exists (duplicate entry)".to_string()
            }
            AppError::Database(e) => {
                error!("Database error: {:?}", e);
                "Internal error".to_string()
            }
            AppError::InternalWithMsg(msg) | AppError::Config(msg) => {
                error!("Internal error: {}", msg);
                "Internal error".to_string()
            }
            AppError::Internal => "Internal error".to_string(),
            other => other.to_string(),
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();

        if let AppError::RateLimited { retry_after_secs, .. } = self
            && let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }

        response
    }
}
