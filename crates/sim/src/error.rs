use armwatch_compute::ComputeError;
use armwatch_core::{ArmwatchError, ErrorCategory, RunId};

use crate::source::SourceError;

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("Run not found: {0}")]
    RunNotFound(RunId),

    #[error("No robot available for run {0}")]
    NoRobots(RunId),

    #[error("Run {0} is already running")]
    AlreadyRunning(RunId),

    #[error("Run {0} is already being replayed")]
    ReplayActive(RunId),

    #[error("Run {0} was not recorded live and cannot be replayed")]
    NotReplayable(RunId),

    #[error("Run {0} has no recorded samples to replay")]
    NoSamples(RunId),

    #[error("Cannot switch data source while {0} run(s) are active")]
    RunsActive(usize),

    #[error("Invalid sampling rate: {0} Hz")]
    InvalidRate(u32),

    #[error("Invalid replay speed: {0}")]
    InvalidSpeed(f64),

    #[error("Data source error: {0}")]
    Source(#[from] SourceError),

    #[error(transparent)]
    Compute(#[from] ComputeError),

    #[error(transparent)]
    Store(#[from] ArmwatchError),
}

impl SimError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SimError::RunNotFound(_) | SimError::NoRobots(_) => ErrorCategory::NotFound,
            SimError::AlreadyRunning(_) | SimError::ReplayActive(_) | SimError::RunsActive(_) => {
                ErrorCategory::Conflict
            }
            SimError::NotReplayable(_)
            | SimError::NoSamples(_)
            | SimError::InvalidRate(_)
            | SimError::InvalidSpeed(_) => ErrorCategory::Invalid,
            SimError::Source(e) => e.category(),
            SimError::Compute(e) => e.category(),
            SimError::Store(e) => e.category(),
        }
    }
}
