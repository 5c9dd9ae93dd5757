use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Everything the backend can hand back instead of data.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unknown column {column} on table {table}")]
    UnknownColumn { table: &'static str, column: String },

    #[error("Row not found")]
    NotFound,

    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("User already registered")]
    EmailTaken,

    #[error("Auth session missing")]
    SessionMissing,

    #[error("Auth session expired")]
    SessionExpired,

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Password hash error: {0}")]
    PasswordHash(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound => ApiError::NotFound(err.to_string()),
            BackendError::InvalidCredentials
            | BackendError::SessionMissing
            | BackendError::SessionExpired
            | BackendError::Token(_) => ApiError::Unauthorized(err.to_string()),
            BackendError::EmailTaken => ApiError::Conflict(err.to_string()),
            BackendError::UnknownColumn { .. } | BackendError::InvalidInput(_) => {
                ApiError::BadRequest(err.to_string())
            }
            BackendError::Database(_) | BackendError::PasswordHash(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized: {}", msg);
                (StatusCode::UNAUTHORIZED, "Unauthorized", msg)
            }
            ApiError::NotFound(msg) => {
                tracing::warn!("Not found: {}", msg);
                (StatusCode::NOT_FOUND, "NotFound", msg)
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, "BadRequest", msg)
            }
            ApiError::Conflict(msg) => {
                tracing::warn!("Conflict: {}", msg);
                (StatusCode::CONFLICT, "Conflict", msg)
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError", msg)
            }
        };

        (status, Json(ErrorResponse { error, message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_errors_map_to_status() {
        let cases = [
            (BackendError::NotFound, StatusCode::NOT_FOUND),
            (BackendError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (BackendError::EmailTaken, StatusCode::CONFLICT),
            (
                BackendError::InvalidInput("price".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                BackendError::PasswordHash("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }
}
