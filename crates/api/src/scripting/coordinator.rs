//! Central job coordinator.
//!
//! Coordinates validation, workspace lifecycle, engine invocation and
//! cleanup for one script submission. Held in
//! [`AppState`](crate::state::AppState) as an `Arc<JobCoordinator>`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use opensees_core::error::CoreError;
use opensees_core::scripting::engine::EngineInvoker;
use opensees_core::scripting::executor::{ExecutionOutcome, ScriptPayload, ScriptRunner};
use opensees_core::scripting::health::HealthProber;
use opensees_core::scripting::status::JobState;
use opensees_core::scripting::workspace::Workspace;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Knobs the coordinator needs beyond the runner itself.
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub workspace_root: PathBuf,
    pub timeout: Duration,
    pub max_concurrent_jobs: usize,
    /// When set, every job probes the engine before provisioning.
    pub gate: Option<HealthProber>,
}

/// Runs script payloads through the engine, one isolated workspace per job.
///
/// Manages the full lifecycle:
/// 1. Reject blank scripts.
/// 2. Wait for a concurrency permit.
/// 3. Optionally probe the engine.
/// 4. Acquire a workspace and write the script.
/// 5. Invoke the engine.
/// 6. Release the workspace and return the outcome unchanged.
pub struct JobCoordinator<R = EngineInvoker> {
    runner: R,
    settings: JobSettings,
    permits: Arc<Semaphore>,
}

impl<R: ScriptRunner> JobCoordinator<R> {
    pub fn new(runner: R, settings: JobSettings) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent_jobs));
        Self {
            runner,
            settings,
            permits,
        }
    }

    /// Number of jobs that could start right now without waiting.
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// Execute one payload and return the engine's outcome.
    ///
    /// The workspace is released before this returns, and also if the
    /// returned future is dropped part-way (which kills the engine too).
    pub async fn execute(&self, payload: ScriptPayload) -> AppResult<ExecutionOutcome> {
        let mut job = JobRun::new(payload.filename());

        // 1. Validate.
        if payload.is_blank() {
            job.advance(JobState::Failed);
            return Err(CoreError::Validation("Script content is empty".to_string()).into());
        }

        // 2. Concurrency permit.
        let _permit = self.permits.acquire().await.map_err(|e| {
            job.advance(JobState::Failed);
            AppError::InternalError(format!("Job semaphore closed: {e}"))
        })?;

        // 3. Engine gate.
        if let Some(prober) = &self.settings.gate {
            let availability = prober.probe().await;
            if !availability.available {
                job.advance(JobState::Failed);
                return Err(CoreError::EngineUnavailable(
                    availability
                        .reason
                        .unwrap_or_else(|| "engine probe failed".to_string()),
                )
                .into());
            }
        }

        // 4. Provision.
        job.advance(JobState::Provisioning);
        let workspace = match Workspace::acquire(&self.settings.workspace_root).await {
            Ok(ws) => ws,
            Err(e) => {
                job.advance(JobState::Failed);
                return Err(CoreError::from(e).into());
            }
        };

        // 5. Write + run. Errors here still fall through to release.
        let result = self.run_in(&workspace, &payload, &mut job).await;

        // 6. Release.
        if let Err(e) = workspace.release().await {
            tracing::warn!(job_id = %job.id, error = %e, "Failed to release workspace");
        }

        let outcome = result?;
        job.advance(if outcome.timed_out {
            JobState::TimedOut
        } else {
            JobState::Completed
        });

        tracing::info!(
            job_id = %job.id,
            exit_code = outcome.exit_code,
            timed_out = outcome.timed_out,
            duration_ms = outcome.duration_ms(),
            "Job finished"
        );

        Ok(outcome)
    }

    async fn run_in(
        &self,
        workspace: &Workspace,
        payload: &ScriptPayload,
        job: &mut JobRun,
    ) -> AppResult<ExecutionOutcome> {
        let script_path = match workspace.write_script(payload.content()).await {
            Ok(path) => path,
            Err(e) => {
                job.advance(JobState::Failed);
                return Err(CoreError::from(e).into());
            }
        };

        job.advance(JobState::Running);
        match self
            .runner
            .run(&script_path, workspace.path(), self.settings.timeout)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                job.advance(JobState::Failed);
                Err(CoreError::from(e).into())
            }
        }
    }
}

/// Tracks one job's state and logs its transitions.
struct JobRun {
    id: Uuid,
    state: JobState,
}

impl JobRun {
    fn new(filename: Option<&str>) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(job_id = %id, filename = ?filename, "Job accepted");
        Self {
            id,
            state: JobState::Pending,
        }
    }

    fn advance(&mut self, next: JobState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid job transition {} -> {next}",
            self.state
        );
        tracing::debug!(job_id = %self.id, from = %self.state, to = %next, "Job state change");
        self.state = next;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
