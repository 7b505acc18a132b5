use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use armwatch_core::config::{SUPPRESSION_THRESHOLD, SUPPRESSION_WINDOW_SECS};
use armwatch_core::{AlarmKind, AlarmStore, ArmwatchError, RobotId};

/// Storm control for new alarms of one robot + alarm kind.
#[derive(Debug, Clone, Copy)]
pub struct SuppressionPolicy {
    pub window: Duration,
    /// Alarms inside the window, counting the candidate, that trigger suppression.
    pub threshold: usize,
}

impl Default for SuppressionPolicy {
    fn default() -> Self {
        Self {
            window: Duration::seconds(SUPPRESSION_WINDOW_SECS),
            threshold: SUPPRESSION_THRESHOLD,
        }
    }
}

impl SuppressionPolicy {
    /// Whether a new alarm first seen at `at` should be suppressed.
    pub fn should_suppress(
        &self,
        store: &dyn AlarmStore,
        robot_id: RobotId,
        kind: AlarmKind,
        at: DateTime<Utc>,
    ) -> Result<bool, ArmwatchError> {
        let prior = store.count_alarms(robot_id, kind, at - self.window, at)?;
        Ok(prior + 1 >= self.threshold)
    }

    /// Stamp suppression facts into an evidence payload.
    pub fn mark(evidence: &mut Value, at: DateTime<Utc>) {
        if !evidence.is_object() {
            let original = std::mem::take(evidence);
            *evidence = serde_json::json!({ "detail": original });
        }
        if let Some(map) = evidence.as_object_mut() {
            map.insert("suppressed".into(), Value::Bool(true));
            map.insert("suppressed_at".into(), Value::String(at.to_rfc3339()));
        }
    }
}
