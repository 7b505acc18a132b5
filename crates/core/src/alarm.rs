use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::channel::Metric;
use crate::entity::{RobotId, RunId};

pub type AlarmId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warn,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warn => write!(f, "WARN"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmKind {
    CurrentAnomaly,
    VibAnomaly,
    TempAnomaly,
    PoseAnomaly,
}

impl std::fmt::Display for AlarmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlarmKind::CurrentAnomaly => write!(f, "CURRENT_ANOMALY"),
            AlarmKind::VibAnomaly => write!(f, "VIB_ANOMALY"),
            AlarmKind::TempAnomaly => write!(f, "TEMP_ANOMALY"),
            AlarmKind::PoseAnomaly => write!(f, "POSE_ANOMALY"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmStatus {
    Open,
    Acked,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmEvent {
    pub id: AlarmId,
    pub dedup_key: String,
    pub robot_id: RobotId,
    pub joint_index: Option<u32>,
    pub metric: Metric,
    pub kind: AlarmKind,
    pub severity: Severity,
    pub status: AlarmStatus,
    pub detector: String,
    pub score: f64,
    pub evidence: serde_json::Value,
    pub suppressed: bool,
    pub count: u32,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub run_id: Option<RunId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AlarmEvent {
    pub fn is_closed(&self) -> bool {
        self.status == AlarmStatus::Closed
    }
}

/// Append-only acknowledgment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmAck {
    pub id: Uuid,
    pub alarm_id: AlarmId,
    pub ack_by: String,
    pub ack_at: DateTime<Utc>,
    pub comment: Option<String>,
}
