//! OpenSees engine invoker.
//!
//! Runs the interpreter with the materialized script as its sole argument,
//! inside the job's workspace.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;

use super::executor::{ExecutionOutcome, ScriptError, ScriptRunner};
use super::subprocess::{self, RunLimits, DEFAULT_MAX_OUTPUT_BYTES};

/// Default program name, resolved through `PATH`.
pub const DEFAULT_ENGINE_PROGRAM: &str = "OpenSees";

/// How to launch the engine and how long it may run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Engine executable (bare name or absolute path).
    pub program: PathBuf,
    /// Arguments that make the engine print its version and exit.
    pub version_args: Vec<String>,
    /// Maximum wall-clock time for one script.
    pub timeout: Duration,
    /// Time between SIGTERM and SIGKILL once a timeout fires.
    pub kill_grace: Duration,
    /// Timeout for the version query used by health checks.
    pub probe_timeout: Duration,
    /// Per-stream output cap.
    pub max_output_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_ENGINE_PROGRAM),
            version_args: vec!["--version".to_string()],
            timeout: Duration::from_secs(60),
            kill_grace: Duration::from_secs(1),
            probe_timeout: Duration::from_secs(5),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

/// Launches the engine against a script file.
#[derive(Debug, Clone)]
pub struct EngineInvoker {
    config: EngineConfig,
}

impl EngineInvoker {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl ScriptRunner for EngineInvoker {
    async fn run(
        &self,
        script_path: &Path,
        working_dir: &Path,
        timeout: Duration,
    ) -> Result<ExecutionOutcome, ScriptError> {
        let mut cmd = Command::new(&self.config.program);
        cmd.arg(script_path).current_dir(working_dir);

        let limits = RunLimits {
            timeout,
            kill_grace: self.config.kill_grace,
            max_output_bytes: self.config.max_output_bytes,
        };
        subprocess::run_command(&mut cmd, limits).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::scripting::executor::TIMEOUT_EXIT_CODE;
    use crate::scripting::test_helpers::sh_engine;
    use crate::scripting::workspace::Workspace;

    async fn run_in_workspace(
        invoker: &EngineInvoker,
        script: &str,
        timeout: Duration,
    ) -> Result<ExecutionOutcome, ScriptError> {
        let root = tempfile::tempdir().expect("root");
        let ws = Workspace::acquire(root.path()).await.expect("acquire");
        let path = ws.write_script(script).await.expect("write");
        invoker.run(&path, ws.path(), timeout).await
    }

    #[test]
    fn test_default_config() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.program, PathBuf::from("OpenSees"));
        assert_eq!(cfg.version_args, vec!["--version".to_string()]);
        assert_eq!(cfg.timeout, Duration::from_secs(60));
        assert_eq!(cfg.max_output_bytes, 10 * 1024 * 1024);
    }

    #[tokio::test]
    async fn test_runs_script_file() {
        let invoker = EngineInvoker::new(sh_engine());
        let outcome = run_in_workspace(&invoker, "printf OK", Duration::from_secs(5))
            .await
            .expect("run");
        assert!(outcome.success);
        assert_eq!(outcome.stdout, "OK");
    }

    #[tokio::test]
    async fn test_working_directory_is_workspace() {
        let root = tempfile::tempdir().expect("root");
        let ws = Workspace::acquire(root.path()).await.expect("acquire");
        let path = ws
            .write_script("printf result > disp.out; pwd")
            .await
            .expect("write");

        let invoker = EngineInvoker::new(sh_engine());
        let outcome = invoker
            .run(&path, ws.path(), Duration::from_secs(5))
            .await
            .expect("run");

        assert_eq!(outcome.exit_code, 0);
        assert!(ws.path().join("disp.out").is_file());
        let expected = ws.path().canonicalize().expect("canonicalize");
        assert_eq!(
            PathBuf::from(outcome.stdout.trim())
                .canonicalize()
                .expect("canonicalize pwd"),
            expected
        );
    }

    #[tokio::test]
    async fn test_engine_failure_reports_stderr() {
        let invoker = EngineInvoker::new(sh_engine());
        let outcome = run_in_workspace(
            &invoker,
            "printf 'syntax error' >&2; exit 1",
            Duration::from_secs(5),
        )
        .await
        .expect("run");
        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, 1);
        assert_eq!(outcome.stderr, "syntax error");
    }

    #[tokio::test]
    async fn test_timeout_passed_by_caller() {
        let invoker = EngineInvoker::new(sh_engine());
        let outcome = run_in_workspace(&invoker, "sleep 30", Duration::from_millis(200))
            .await
            .expect("run");
        assert!(outcome.timed_out);
        assert_eq!(outcome.exit_code, TIMEOUT_EXIT_CODE);
    }

    #[tokio::test]
    async fn test_missing_engine() {
        let invoker = EngineInvoker::new(EngineConfig {
            program: PathBuf::from("/nonexistent/OpenSees"),
            ..EngineConfig::default()
        });
        let result = run_in_workspace(&invoker, "puts hi", Duration::from_secs(5)).await;
        assert_matches!(result, Err(ScriptError::EngineUnavailable { .. }));
    }
}
