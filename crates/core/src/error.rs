use thiserror::Error;

/// Coarse failure classes shared by every crate in the workspace.
///
/// Callers outside the core (an API layer, the CLI) map these onto their own
/// response envelope: `NotFound` and `Conflict` are terminal and never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Invalid,
    DataUnavailable,
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::NotFound => write!(f, "not_found"),
            ErrorCategory::Conflict => write!(f, "conflict"),
            ErrorCategory::Invalid => write!(f, "invalid"),
            ErrorCategory::DataUnavailable => write!(f, "data_unavailable"),
            ErrorCategory::Internal => write!(f, "internal"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ArmwatchError {
    #[error("Robot not found: {0}")]
    RobotNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Alarm not found: {0}")]
    AlarmNotFound(String),

    #[error("Duplicate open alarm for dedup key {0}")]
    DuplicateDedupKey(String),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}

impl ArmwatchError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ArmwatchError::RobotNotFound(_)
            | ArmwatchError::RunNotFound(_)
            | ArmwatchError::AlarmNotFound(_) => ErrorCategory::NotFound,
            ArmwatchError::DuplicateDedupKey(_) => ErrorCategory::Conflict,
            ArmwatchError::Serialize(_)
            | ArmwatchError::Storage(_)
            | ArmwatchError::Other(_) => ErrorCategory::Internal,
        }
    }
}

impl From<serde_json::Error> for ArmwatchError {
    fn from(e: serde_json::Error) -> Self {
        ArmwatchError::Serialize(e.to_string())
    }
}
