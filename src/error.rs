use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::session::SessionError;

// Define a custom error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal Server Error: {0}")]
    InternalServerError(String),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Token creation failed")]
    TokenCreation(#[from] jsonwebtoken::errors::Error),

    #[error("Password hashing failed")]
    PasswordError(#[from] bcrypt::BcryptError),

    #[error("{0}")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationErrors),
}

// Session rejections collapse to a uniform 401 at the HTTP boundary. Which
// of the three checks failed stays in the logs only; revealing it would tell
// a caller whether a stolen token is merely expired or actively revoked.
impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound => AppError::SessionNotFound,
            _ => {
                tracing::warn!("Session rejected: {}", e);
                AppError::Unauthorized
            }
        }
    }
}

// Implement IntoResponse to convert AppError into an HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal server error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::DatabaseError(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::TokenCreation(e) => {
                tracing::error!("Failed to sign session token: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Token error".to_string())
            }
            AppError::PasswordError(e) => {
                tracing::error!("Password hashing error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Password error".to_string(),
                )
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()),
            AppError::SessionNotFound => (StatusCode::BAD_REQUEST, "Session not found".to_string()),
            AppError::ValidationError(errors) => {
                // The `errors` object contains detailed information on which fields failed.
                let message = format!("Input validation failed: {errors}").replace('\n', ", ");
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": message, "details": errors })),
                )
                    .into_response();
            }
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
