//! Channel that writes events to the tracing log.

use crate::traits::{Notifier, NotifyError, TelemetryEvent};

/// Logs alarms and run transitions at info, sample pushes at trace.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, event: &TelemetryEvent) -> Result<(), NotifyError> {
        match event {
            TelemetryEvent::LatestSamples { robot_id, joints, .. } => {
                tracing::trace!(robot_id = %robot_id, joints = joints.len(), "latest samples");
            }
            TelemetryEvent::RunStatus { run } => {
                tracing::info!(run_id = %run.id, status = %run.status, "run status");
            }
            TelemetryEvent::Alarm { alarm } => {
                tracing::info!(
                    alarm_id = %alarm.id,
                    kind = %alarm.kind,
                    severity = %alarm.severity,
                    status = ?alarm.status,
                    count = alarm.count,
                    score = alarm.score,
                    key = %alarm.dedup_key,
                    "alarm"
                );
            }
        }
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}
