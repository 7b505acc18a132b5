//! Notifier trait definition and shared event/error types.

use serde::Serialize;

use armwatch_core::{AlarmEvent, JointSample, PoseSample, RobotId, ScenarioRun};

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Endpoint rejected notification with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// One push emitted by the core.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEvent {
    /// Newest joint readings (one per joint) plus the newest pose of a robot.
    LatestSamples {
        robot_id: RobotId,
        joints: Vec<JointSample>,
        pose: Option<PoseSample>,
    },
    RunStatus { run: ScenarioRun },
    Alarm { alarm: AlarmEvent },
}

impl TelemetryEvent {
    /// Destination the event is published under.
    pub fn topic(&self) -> String {
        match self {
            TelemetryEvent::LatestSamples { robot_id, .. } => {
                format!("/topic/robots/{robot_id}/latest")
            }
            TelemetryEvent::RunStatus { run } => format!("/topic/sim/runs/{}/status", run.id),
            TelemetryEvent::Alarm { .. } => "/topic/alarms".to_string(),
        }
    }

    /// Identifier of the subject the event is about.
    pub fn subject_key(&self) -> String {
        match self {
            TelemetryEvent::LatestSamples { robot_id, .. } => robot_id.to_string(),
            TelemetryEvent::RunStatus { run } => run.id.to_string(),
            TelemetryEvent::Alarm { alarm } => alarm.dedup_key.clone(),
        }
    }
}

/// Trait for notification channel implementations.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one event through this channel.
    async fn send(&self, event: &TelemetryEvent) -> Result<(), NotifyError>;

    /// Human-readable name for this channel (e.g., "webhook", "log").
    fn channel_name(&self) -> &str;
}

/// Result of dispatching an event to a single channel.
#[derive(Debug)]
pub struct DispatchResult {
    pub channel: String,
    pub topic: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use armwatch_core::{RunMode, ScenarioRun};
    use uuid::Uuid;

    #[test]
    fn topics_follow_destination_layout() {
        let robot_id = Uuid::new_v4();
        let latest = TelemetryEvent::LatestSamples {
            robot_id,
            joints: Vec::new(),
            pose: None,
        };
        assert_eq!(latest.topic(), format!("/topic/robots/{robot_id}/latest"));

        let run = ScenarioRun::new("r", RunMode::Live, 1);
        let run_id = run.id;
        let status = TelemetryEvent::RunStatus { run };
        assert_eq!(status.topic(), format!("/topic/sim/runs/{run_id}/status"));
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let run = ScenarioRun::new("r", RunMode::Live, 1);
        let json = serde_json::to_value(TelemetryEvent::RunStatus { run }).unwrap();
        assert_eq!(json["type"], "run_status");
        assert_eq!(json["run"]["status"], "CREATED");
    }
}
