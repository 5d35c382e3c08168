//! Per-job lifecycle states.
//!
//! ```text
//! Pending -> Provisioning -> Running -> Completed | TimedOut | Failed
//!    \              \
//!     -> Failed      -> Failed
//! ```

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Accepted, waiting for validation and a concurrency permit.
    Pending,
    /// Workspace being created and the script written.
    Provisioning,
    /// Engine process running.
    Running,
    /// Engine exited on its own (any exit code).
    Completed,
    /// Engine killed after exceeding its timeout.
    TimedOut,
    /// Job aborted with a service-level error.
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::TimedOut | Self::Failed)
    }

    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, Provisioning)
                | (Pending, Failed)
                | (Provisioning, Running)
                | (Provisioning, Failed)
                | (Running, Completed)
                | (Running, TimedOut)
                | (Running, Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Provisioning => "provisioning",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::TimedOut => "timed_out",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
