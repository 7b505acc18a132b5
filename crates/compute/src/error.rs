use armwatch_core::{AlarmId, ArmwatchError, ErrorCategory, Metric};

#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    #[error("Alarm not found: {0}")]
    AlarmNotFound(AlarmId),
    #[error("Alarm {0} is closed")]
    AlarmClosed(AlarmId),
    #[error("Detector already registered for {metric}: {name}")]
    DuplicateDetector { metric: Metric, name: String },
    #[error("Store error: {0}")]
    Store(#[from] ArmwatchError),
}

impl ComputeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ComputeError::AlarmNotFound(_) => ErrorCategory::NotFound,
            ComputeError::AlarmClosed(_) | ComputeError::DuplicateDetector { .. } => {
                ErrorCategory::Conflict
            }
            ComputeError::Store(e) => e.category(),
        }
    }
}
