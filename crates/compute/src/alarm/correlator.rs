use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use armwatch_core::{
    AlarmAck, AlarmEvent, AlarmId, AlarmStatus, AlarmStore, Metric, RobotId, RunId,
};
use armwatch_notify::Dispatcher;

use super::dedup::dedup_key;
use super::suppression::SuppressionPolicy;
use crate::detect::DetectionResult;
use crate::error::ComputeError;

/// An anomalous verdict for one channel of one sample.
#[derive(Debug, Clone)]
pub struct Detection {
    pub robot_id: RobotId,
    pub joint_index: Option<u32>,
    pub metric: Metric,
    pub detector: String,
    pub result: DetectionResult,
    /// Timestamp of the sample that produced the verdict.
    pub ts: DateTime<Utc>,
    pub run_id: Option<RunId>,
}

impl Detection {
    pub fn dedup_key(&self) -> String {
        dedup_key(self.robot_id, self.joint_index, self.metric, &self.detector)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmChange {
    Created,
    Updated,
}

#[derive(Debug, Clone)]
pub struct AlarmOutcome {
    pub alarm: AlarmEvent,
    pub change: AlarmChange,
}

impl AlarmOutcome {
    pub fn is_notifiable(&self) -> bool {
        !self.alarm.suppressed
    }
}

/// Turns anomalous detections into deduplicated alarm events and owns the
/// acknowledge/close lifecycle.
///
/// Lookup-then-create runs under one lock so concurrent detections on the
/// same key cannot both create. Notifications are sent after the lock is
/// released.
pub struct AlarmCorrelator {
    store: Arc<dyn AlarmStore>,
    dispatcher: Arc<Dispatcher>,
    policy: SuppressionPolicy,
    gate: Mutex<()>,
}

impl AlarmCorrelator {
    pub fn new(store: Arc<dyn AlarmStore>, dispatcher: Arc<Dispatcher>) -> Self {
        Self::with_policy(store, dispatcher, SuppressionPolicy::default())
    }

    pub fn with_policy(
        store: Arc<dyn AlarmStore>,
        dispatcher: Arc<Dispatcher>,
        policy: SuppressionPolicy,
    ) -> Self {
        Self {
            store,
            dispatcher,
            policy,
            gate: Mutex::new(()),
        }
    }

    /// Record a detection. Non-anomalous verdicts are ignored.
    pub async fn observe(&self, detection: &Detection) -> Result<Option<AlarmOutcome>, ComputeError> {
        if !detection.result.is_anomaly {
            return Ok(None);
        }

        let outcome = self.correlate(detection)?;
        if outcome.is_notifiable() {
            self.dispatcher.push_alarm(&outcome.alarm);
        }
        Ok(Some(outcome))
    }

    fn correlate(&self, d: &Detection) -> Result<AlarmOutcome, ComputeError> {
        let key = d.dedup_key();
        let _guard = self.gate.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(mut alarm) = self.store.open_alarm_by_dedup_key(&key)? {
            alarm.count += 1;
            alarm.last_seen = alarm.last_seen.max(d.ts);
            alarm.score = alarm.score.max(d.result.score);
            alarm.updated_at = Utc::now();
            let alarm = self.store.save_alarm(alarm)?;
            tracing::debug!(alarm_id = %alarm.id, key = %key, count = alarm.count, "alarm updated");
            return Ok(AlarmOutcome {
                alarm,
                change: AlarmChange::Updated,
            });
        }

        let kind = d.metric.alarm_kind();
        let suppressed = self
            .policy
            .should_suppress(self.store.as_ref(), d.robot_id, kind, d.ts)?;

        let mut evidence = d.result.evidence.clone();
        if suppressed {
            SuppressionPolicy::mark(&mut evidence, d.ts);
        }

        let now = Utc::now();
        let alarm = self.store.save_alarm(AlarmEvent {
            id: Uuid::new_v4(),
            dedup_key: key,
            robot_id: d.robot_id,
            joint_index: d.joint_index,
            metric: d.metric,
            kind,
            severity: d.result.severity,
            status: AlarmStatus::Open,
            detector: d.detector.clone(),
            score: d.result.score,
            evidence,
            suppressed,
            count: 1,
            first_seen: d.ts,
            last_seen: d.ts,
            run_id: d.run_id,
            created_at: now,
            updated_at: now,
        })?;

        if suppressed {
            tracing::warn!(
                alarm_id = %alarm.id,
                robot_id = %alarm.robot_id,
                kind = %alarm.kind,
                "alarm suppressed: too many recent alarms of this kind"
            );
        } else {
            tracing::info!(
                alarm_id = %alarm.id,
                key = %alarm.dedup_key,
                severity = %alarm.severity,
                score = alarm.score,
                "alarm raised"
            );
        }

        Ok(AlarmOutcome {
            alarm,
            change: AlarmChange::Created,
        })
    }

    /// Acknowledge an alarm that is not closed; appends one ack record.
    pub async fn acknowledge(
        &self,
        alarm_id: AlarmId,
        ack_by: &str,
        comment: Option<String>,
    ) -> Result<(AlarmEvent, AlarmAck), ComputeError> {
        let (alarm, ack) = {
            let _guard = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
            let mut alarm = self
                .store
                .alarm(alarm_id)?
                .ok_or(ComputeError::AlarmNotFound(alarm_id))?;
            if alarm.is_closed() {
                return Err(ComputeError::AlarmClosed(alarm_id));
            }

            let now = Utc::now();
            alarm.status = AlarmStatus::Acked;
            alarm.updated_at = now;
            let alarm = self.store.save_alarm(alarm)?;
            let ack = self.store.save_ack(AlarmAck {
                id: Uuid::new_v4(),
                alarm_id,
                ack_by: ack_by.to_string(),
                ack_at: now,
                comment,
            })?;
            (alarm, ack)
        };

        tracing::info!(alarm_id = %alarm_id, ack_by, "alarm acknowledged");
        self.dispatcher.push_alarm(&alarm);
        Ok((alarm, ack))
    }

    /// Close an alarm regardless of its current status.
    pub async fn close(&self, alarm_id: AlarmId) -> Result<AlarmEvent, ComputeError> {
        let alarm = {
            let _guard = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
            let mut alarm = self
                .store
                .alarm(alarm_id)?
                .ok_or(ComputeError::AlarmNotFound(alarm_id))?;
            alarm.status = AlarmStatus::Closed;
            alarm.updated_at = Utc::now();
            self.store.save_alarm(alarm)?
        };

        tracing::info!(alarm_id = %alarm_id, "alarm closed");
        self.dispatcher.push_alarm(&alarm);
        Ok(alarm)
    }
}
