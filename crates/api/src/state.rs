use std::sync::Arc;

use opensees_core::scripting::engine::EngineInvoker;
use opensees_core::scripting::health::HealthProber;

use crate::config::ServerConfig;
use crate::scripting::coordinator::{JobCoordinator, JobSettings};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Runs submitted scripts through the engine.
    pub coordinator: Arc<JobCoordinator>,
    /// Answers `/health` engine availability queries.
    pub prober: Arc<HealthProber>,
}

impl AppState {
    /// Build the coordinator and prober from configuration.
    pub fn new(config: &ServerConfig) -> Self {
        let prober = HealthProber::new(&config.engine);
        let settings = JobSettings {
            workspace_root: config.workspace_root.clone(),
            timeout: config.engine.timeout,
            max_concurrent_jobs: config.max_concurrent_jobs,
            gate: config.require_engine_probe.then(|| prober.clone()),
        };
        let coordinator = JobCoordinator::new(EngineInvoker::new(config.engine.clone()), settings);

        Self {
            coordinator: Arc::new(coordinator),
            prober: Arc::new(prober),
        }
    }
}
