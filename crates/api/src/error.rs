use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use opensees_core::error::CoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `opensees_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Resource(msg) => {
                    tracing::error!(error = %msg, "Workspace resource error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "RESOURCE_ERROR",
                        format!("Failed to prepare job workspace: {msg}"),
                    )
                }
                CoreError::EngineUnavailable(msg) => {
                    tracing::error!(error = %msg, "Engine unavailable");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "ENGINE_UNAVAILABLE",
                        format!("OpenSees is not available: {msg}"),
                    )
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        // `detail` and `stderr` repeat the message so clients render service
        // failures in the same place as engine errors.
        let body = json!({
            "success": false,
            "error": message,
            "code": code,
            "detail": message,
            "stderr": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
