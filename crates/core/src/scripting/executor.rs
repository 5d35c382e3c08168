//! Unified script execution interface and shared types.
//!
//! Defines [`ScriptRunner`], the trait the engine invoker implements, along
//! with [`ScriptPayload`], [`ExecutionOutcome`], and [`ScriptError`].

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;

/// Exit code reported when the invoker killed the engine on timeout.
///
/// Processes that die from a signal they did not receive from the invoker
/// report `128 + signal`, so this value is never produced by a real exit.
pub const TIMEOUT_EXIT_CODE: i32 = -1;

/// A script submitted for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptPayload {
    content: String,
    filename: Option<String>,
}

impl ScriptPayload {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            filename: None,
        }
    }

    /// Attach the client's original filename. Only ever echoed back in
    /// responses; it never takes part in path resolution.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// `true` if the script is empty or contains only whitespace.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Result of one engine invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionOutcome {
    /// Process exit code, or [`TIMEOUT_EXIT_CODE`] if the invoker killed it.
    pub exit_code: i32,
    /// Captured stdout (possibly truncated, with a marker appended).
    pub stdout: String,
    /// Captured stderr (possibly truncated, with a marker appended).
    pub stderr: String,
    /// Wall-clock time from spawn to terminal state.
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    /// Whether the process was killed for exceeding its timeout.
    pub timed_out: bool,
    /// `exit_code == 0 && !timed_out`.
    pub success: bool,
}

impl ExecutionOutcome {
    /// Outcome of a process that exited on its own.
    pub fn exited(exit_code: i32, stdout: String, stderr: String, duration: Duration) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            duration,
            timed_out: false,
            success: exit_code == 0,
        }
    }

    /// Outcome of a process killed after its timeout elapsed.
    pub fn timed_out(stdout: String, stderr: String, duration: Duration) -> Self {
        Self {
            exit_code: TIMEOUT_EXIT_CODE,
            stdout,
            stderr,
            duration,
            timed_out: true,
            success: false,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Errors that prevent an invocation from producing an [`ExecutionOutcome`].
#[derive(Debug)]
pub enum ScriptError {
    /// The engine binary could not be located or started.
    EngineUnavailable {
        program: String,
        source: std::io::Error,
    },
    /// An I/O error occurred while waiting on the running process.
    IoError(std::io::Error),
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EngineUnavailable { program, source } => {
                write!(f, "Failed to start engine '{program}': {source}")
            }
            Self::IoError(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for ScriptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::EngineUnavailable { source, .. } => Some(source),
            Self::IoError(err) => Some(err),
        }
    }
}

/// Runs a materialized script file through an interpreter.
///
/// Implemented by [`EngineInvoker`](super::engine::EngineInvoker); tests
/// substitute instrumented runners.
pub trait ScriptRunner: Send + Sync {
    /// Run the script at `script_path` with `working_dir` as the current
    /// directory, killing it once `timeout` elapses.
    fn run(
        &self,
        script_path: &Path,
        working_dir: &Path,
        timeout: Duration,
    ) -> impl std::future::Future<Output = Result<ExecutionOutcome, ScriptError>> + Send;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
