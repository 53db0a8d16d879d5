use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Caller-visible auth failures. All variants are terminal for the
/// current operation; the caller must re-authenticate or correct input.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("User already exists")]
    UserAlreadyExists,

    /// Covers both unknown email and wrong password, so a caller cannot
    /// probe which field was wrong.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Access denied")]
    AccessDenied,

    /// Boundary-level input validation, not produced by the auth service.
    #[error("{0}")]
    Validation(String),

    /// Store or crypto failure. Detail is logged, never sent to the caller.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AuthError::UserAlreadyExists => {
                (StatusCode::FORBIDDEN, "USER_ALREADY_EXISTS", self.to_string())
            }
            AuthError::InvalidCredentials => {
                (StatusCode::FORBIDDEN, "INVALID_CREDENTIALS", self.to_string())
            }
            AuthError::UserNotFound => (StatusCode::FORBIDDEN, "USER_NOT_FOUND", self.to_string()),
            AuthError::AccessDenied => (StatusCode::FORBIDDEN, "ACCESS_DENIED", self.to_string()),
            AuthError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AuthError::Internal(err) => {
                tracing::error!(error = %err, "internal auth error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
