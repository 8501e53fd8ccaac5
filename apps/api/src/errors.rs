use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

const UPSTREAM_FALLBACK: &str = "Request failed";

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Every variant renders as `{ "success": false, "error": <message>, "code": <CODE> }`;
/// the editor shows `error` verbatim, so internal variants never put their
/// details there.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    /// The toolchain rejected the document. Carries the bounded diagnostic
    /// summary, which is safe to show to the user.
    #[error("Compilation failed: {0}")]
    Compilation(String),

    /// Non-2xx reply from the account/GitHub backend. The status is kept and
    /// the message is taken from the backend body.
    #[error("Upstream error (status {status})")]
    Upstream { status: StatusCode, body: Value },

    #[error("Backend request failed: {0}")]
    Backend(#[from] reqwest::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Not authenticated".to_string(),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::Compilation(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "COMPILATION_FAILED", msg)
            }
            AppError::Upstream { status, body } => {
                (status, "UPSTREAM_ERROR", upstream_message(&body))
            }
            AppError::Backend(e) => {
                tracing::error!("Backend request failed: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "BACKEND_ERROR",
                    "The backend service could not be reached".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

/// `message`, then `error`, then a generic fallback.
fn upstream_message(body: &Value) -> String {
    ["message", "error"]
        .iter()
        .filter_map(|key| body[*key].as_str())
        .find(|msg| !msg.trim().is_empty())
        .unwrap_or(UPSTREAM_FALLBACK)
        .to_string()
}
