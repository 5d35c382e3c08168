//! Tests for `AppError` → HTTP response mapping.
//!
//! These call `IntoResponse` directly on `AppError` values; no server or
//! engine is needed.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use opensees_api::error::AppError;
use opensees_core::error::CoreError;
use opensees_core::scripting::executor::ScriptError;

/// Helper: convert an `AppError` into its status code and parsed JSON body.
async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

// ---------------------------------------------------------------------------
// Test: CoreError::Validation maps to 400 with VALIDATION_ERROR code
// ---------------------------------------------------------------------------

#[tokio::test]
async fn validation_error_returns_400() {
    let err = AppError::Core(CoreError::Validation("Script content is empty".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "Script content is empty");
    assert_eq!(json["detail"], "Script content is empty");
}

// ---------------------------------------------------------------------------
// Test: AppError::BadRequest maps to 400 with BAD_REQUEST code
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bad_request_error_returns_400() {
    let err = AppError::BadRequest("No file uploaded".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert_eq!(json["error"], "No file uploaded");
}

// ---------------------------------------------------------------------------
// Test: CoreError::Resource maps to 500 with RESOURCE_ERROR code
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resource_error_returns_500() {
    let err = AppError::Core(CoreError::Resource("disk full".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "RESOURCE_ERROR");
    assert_eq!(json["error"], "Failed to prepare job workspace: disk full");
}

// ---------------------------------------------------------------------------
// Test: a spawn failure reaches the client as 503 ENGINE_UNAVAILABLE
// ---------------------------------------------------------------------------

#[tokio::test]
async fn engine_unavailable_returns_503() {
    let spawn_failure = ScriptError::EngineUnavailable {
        program: "OpenSees".into(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
    };
    let err = AppError::Core(spawn_failure.into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "ENGINE_UNAVAILABLE");
    let message = json["error"].as_str().unwrap();
    assert!(message.starts_with("OpenSees is not available"), "{message}");
    assert!(message.contains("No such file or directory"), "{message}");
    assert_eq!(json["stderr"], json["error"]);
}

// ---------------------------------------------------------------------------
// Test: internal errors do not leak details
// ---------------------------------------------------------------------------

#[tokio::test]
async fn internal_errors_are_sanitized() {
    for err in [
        AppError::Core(CoreError::Internal("wait() failed: EINTR".into())),
        AppError::InternalError("secret path /var/lib/x".into()),
    ] {
        let (status, json) = error_to_response(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["code"], "INTERNAL_ERROR");
        assert_eq!(json["error"], "An internal error occurred");
    }
}
