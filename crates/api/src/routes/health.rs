use std::sync::Arc;

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Root liveness payload.
#[derive(Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub status: &'static str,
}

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `"healthy"` when the service could answer, `"error"` if the probe
    /// itself broke.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the OpenSees engine can be started.
    pub opensees_available: bool,
    /// Version reported by the engine (may be empty).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opensees_version: Option<String>,
    /// Why the engine or the probe is unhealthy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// GET / -- confirms the API process is up.
async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "OpenSees Web API is running!",
        status: "success",
    })
}

/// GET /health -- probes the engine on every call.
///
/// Always responds. The probe runs on its own task so that even a panic
/// inside it is reported as `status: "error"`.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let prober = Arc::clone(&state.prober);
    let probe = tokio::spawn(async move { prober.probe().await }).await;

    let response = match probe {
        Ok(availability) if availability.available => HealthResponse {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            opensees_available: true,
            opensees_version: availability.version,
            message: None,
        },
        Ok(availability) => HealthResponse {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            opensees_available: false,
            opensees_version: None,
            message: Some(format!(
                "OpenSees is not available: {}",
                availability.reason.unwrap_or_default()
            )),
        },
        Err(e) => {
            tracing::error!(error = %e, "Engine probe task failed");
            HealthResponse {
                status: "error",
                version: env!("CARGO_PKG_VERSION"),
                opensees_available: false,
                opensees_version: None,
                message: Some(format!("Engine probe failed: {e}")),
            }
        }
    };

    Json(response)
}

/// Mount the root and health check routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
}
