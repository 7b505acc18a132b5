use serde::{Deserialize, Serialize};

use crate::alarm::AlarmKind;

/// Monitored signal. Joint metrics exist once per joint; `PosePosition`
/// once per robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Current,
    Vibration,
    Temperature,
    PosePosition,
}

impl Metric {
    pub const JOINT: [Metric; 3] = [Metric::Current, Metric::Vibration, Metric::Temperature];

    pub const ALL: [Metric; 4] = [
        Metric::Current,
        Metric::Vibration,
        Metric::Temperature,
        Metric::PosePosition,
    ];

    /// Stable lowercase name used in dedup keys and env overrides.
    pub fn slug(&self) -> &'static str {
        match self {
            Metric::Current => "current",
            Metric::Vibration => "vibration",
            Metric::Temperature => "temperature",
            Metric::PosePosition => "pose",
        }
    }

    pub fn alarm_kind(&self) -> AlarmKind {
        match self {
            Metric::Current => AlarmKind::CurrentAnomaly,
            Metric::Vibration => AlarmKind::VibAnomaly,
            Metric::Temperature => AlarmKind::TempAnomaly,
            Metric::PosePosition => AlarmKind::PoseAnomaly,
        }
    }

    pub fn is_joint_metric(&self) -> bool {
        !matches!(self, Metric::PosePosition)
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

/// A (joint, metric) pair addressing one window per robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId {
    pub joint: Option<u32>,
    pub metric: Metric,
}

impl ChannelId {
    pub fn joint(joint: u32, metric: Metric) -> Self {
        Self {
            joint: Some(joint),
            metric,
        }
    }

    pub fn pose() -> Self {
        Self {
            joint: None,
            metric: Metric::PosePosition,
        }
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.joint {
            Some(j) => write!(f, "j{}/{}", j, self.metric),
            None => write!(f, "{}", self.metric),
        }
    }
}
