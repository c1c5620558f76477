use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// Login rejection. Unknown email and wrong password share this variant
    /// so the message never reveals which check failed.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Refresh-token rejection. Bad signature, unknown, revoked and expired
    /// tokens all collapse into this variant.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Db(String),

    #[error("JWT error")]
    Jwt,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<mongodb::error::Error> for AppError {
    fn from(e: mongodb::error::Error) -> Self {
        AppError::Db(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            AppError::Validation(s) => (StatusCode::BAD_REQUEST, s.as_str()),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid email or password"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::NotFound => (StatusCode::NOT_FOUND, "not found"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::Db(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database error"),
            AppError::Jwt => (StatusCode::BAD_REQUEST, "invalid token"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal error"),
        };

        if matches!(
            &self,
            AppError::Conflict(_) | AppError::Db(_) | AppError::Internal(_)
        ) {
            tracing::error!(error = %self, "request failed");
        }

        (status, Json(json!({ "error": msg }))).into_response()
    }
}
