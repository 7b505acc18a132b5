//! Interchangeable sample generators.
//!
//! Exactly one [`DataSource`] is active process-wide, held by a
//! [`DataSourceCell`]. The scheduler asks it for one joint sample per joint
//! and one pose sample per tick.

mod cell;
pub mod device;
pub mod faults;
pub mod synthetic;

pub use cell::DataSourceCell;
pub use device::{DeviceClient, DeviceSource, DeviceStatus, HttpDeviceClient};
pub use synthetic::SyntheticSource;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use armwatch_core::{
    ErrorCategory, FaultInjection, JointSample, NominalParams, PoseSample, RobotId, RunId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Synthetic,
    LiveDevice,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Synthetic => write!(f, "synthetic"),
            SourceKind::LiveDevice => write!(f, "live_device"),
        }
    }
}

/// Everything a source needs to produce the samples of one tick.
#[derive(Debug, Clone)]
pub struct SampleContext {
    pub ts: DateTime<Utc>,
    pub robot_id: RobotId,
    pub run_id: Option<RunId>,
    pub base: NominalParams,
    /// Faults active at `ts`.
    pub faults: Vec<FaultInjection>,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Device not configured: {0}")]
    NotConfigured(String),
    #[error("Device unavailable: {0}")]
    Unavailable(String),
    #[error("Device returned no reading for joint {0}")]
    MissingJoint(u32),
    #[error("Device returned no pose reading")]
    MissingPose,
    #[error("Device request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl SourceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SourceError::NotConfigured(_) => ErrorCategory::Invalid,
            _ => ErrorCategory::DataUnavailable,
        }
    }
}

/// A strategy producing samples for a timestamp, robot and fault set.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn joint_sample(&self, ctx: &SampleContext, joint_index: u32) -> Result<JointSample, SourceError>;

    async fn pose_sample(&self, ctx: &SampleContext) -> Result<PoseSample, SourceError>;

    async fn is_available(&self) -> bool;

    /// Called once after the source becomes the active strategy.
    async fn initialize(&self) -> Result<(), SourceError> {
        Ok(())
    }

    /// Called once before the source is replaced.
    async fn shutdown(&self) {}

    /// Reset randomness for a reproducible run. Sources without randomness ignore it.
    fn reseed(&self, _seed: u64) {}
}
