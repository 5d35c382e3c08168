use crate::scripting::executor::ScriptError;
use crate::scripting::workspace::WorkspaceError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Resource error: {0}")]
    Resource(String),

    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<WorkspaceError> for CoreError {
    fn from(err: WorkspaceError) -> Self {
        CoreError::Resource(err.to_string())
    }
}

impl From<ScriptError> for CoreError {
    fn from(err: ScriptError) -> Self {
        match err {
            ScriptError::EngineUnavailable { .. } => CoreError::EngineUnavailable(err.to_string()),
            ScriptError::IoError(_) => CoreError::Internal(err.to_string()),
        }
    }
}
