use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use armwatch_core::{AlarmStatus, AlarmStore, MemoryStore, Metric, Severity};
use armwatch_notify::{Dispatcher, RecordingNotifier};

use super::*;
use crate::detect::DetectionResult;
use crate::error::ComputeError;

struct Harness {
    store: MemoryStore,
    recorder: RecordingNotifier,
    dispatcher: Arc<Dispatcher>,
    correlator: AlarmCorrelator,
}

impl Harness {
    /// Alarm pushes delivered so far, after draining the queue.
    async fn pushed_alarms(&self) -> usize {
        self.dispatcher.flush().await;
        self.recorder.alarm_count()
    }
}

fn harness() -> Harness {
    let store = MemoryStore::new();
    let recorder = RecordingNotifier::new();
    let dispatcher = Arc::new(Dispatcher::with_channels(vec![Box::new(recorder.clone())]));
    let correlator = AlarmCorrelator::new(Arc::new(store.clone()), Arc::clone(&dispatcher));
    Harness {
        store,
        recorder,
        dispatcher,
        correlator,
    }
}

fn detection(
    robot_id: Uuid,
    joint: Option<u32>,
    metric: Metric,
    detector: &str,
    score: f64,
    ts: chrono::DateTime<Utc>,
) -> Detection {
    Detection {
        robot_id,
        joint_index: joint,
        metric,
        detector: detector.to_string(),
        result: DetectionResult::anomaly(score, Severity::Warn, json!({ "score": score })),
        ts,
        run_id: None,
    }
}

#[tokio::test]
async fn repeat_detection_increments_one_alarm() {
    let h = harness();
    let robot = Uuid::new_v4();
    let t0 = Utc::now();

    let first = h
        .correlator
        .observe(&detection(robot, Some(1), Metric::Temperature, "threshold", 0.6, t0))
        .await
        .unwrap()
        .unwrap();
    let second = h
        .correlator
        .observe(&detection(
            robot,
            Some(1),
            Metric::Temperature,
            "threshold",
            0.4,
            t0 + Duration::seconds(1),
        ))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.change, AlarmChange::Created);
    assert_eq!(second.change, AlarmChange::Updated);
    assert_eq!(second.alarm.id, first.alarm.id);
    assert_eq!(second.alarm.count, 2);
    assert_eq!(second.alarm.score, 0.6);
    assert_eq!(second.alarm.last_seen, t0 + Duration::seconds(1));
    assert_eq!(second.alarm.first_seen, t0);
    assert_eq!(h.store.alarm_count(), 1);
}

#[tokio::test]
async fn third_alarm_of_a_kind_within_window_is_suppressed() {
    let h = harness();
    let robot = Uuid::new_v4();
    let t0 = Utc::now();

    let mut outcomes = Vec::new();
    for joint in 0..3 {
        let d = detection(
            robot,
            Some(joint),
            Metric::Vibration,
            "zscore",
            4.0,
            t0 + Duration::seconds(joint as i64 * 10),
        );
        outcomes.push(h.correlator.observe(&d).await.unwrap().unwrap());
    }

    assert!(!outcomes[0].alarm.suppressed);
    assert!(!outcomes[1].alarm.suppressed);
    let third = &outcomes[2].alarm;
    assert!(third.suppressed);
    assert_eq!(third.evidence["suppressed"], true);
    assert!(third.evidence["suppressed_at"].is_string());
    assert_eq!(third.evidence["score"], 4.0);

    // persisted, but only the first two were pushed
    assert!(h.store.alarm(third.id).unwrap().is_some());
    assert_eq!(h.pushed_alarms().await, 2);
}

#[tokio::test]
async fn suppression_window_expires() {
    let h = harness();
    let robot = Uuid::new_v4();
    let t0 = Utc::now();

    for joint in 0..2 {
        h.correlator
            .observe(&detection(robot, Some(joint), Metric::Current, "threshold", 1.0, t0))
            .await
            .unwrap();
    }
    let late = h
        .correlator
        .observe(&detection(
            robot,
            Some(5),
            Metric::Current,
            "threshold",
            1.0,
            t0 + Duration::seconds(60),
        ))
        .await
        .unwrap()
        .unwrap();
    assert!(!late.alarm.suppressed);
}

#[tokio::test]
async fn other_kinds_and_robots_do_not_count() {
    let h = harness();
    let robot = Uuid::new_v4();
    let t0 = Utc::now();

    h.correlator
        .observe(&detection(robot, Some(0), Metric::Current, "threshold", 1.0, t0))
        .await
        .unwrap();
    h.correlator
        .observe(&detection(Uuid::new_v4(), Some(0), Metric::Temperature, "threshold", 1.0, t0))
        .await
        .unwrap();
    let third = h
        .correlator
        .observe(&detection(robot, Some(0), Metric::Temperature, "threshold", 1.0, t0))
        .await
        .unwrap()
        .unwrap();
    assert!(!third.alarm.suppressed);
}

#[tokio::test]
async fn updates_do_not_trigger_suppression() {
    let h = harness();
    let robot = Uuid::new_v4();
    let t0 = Utc::now();

    for i in 0..5 {
        let outcome = h
            .correlator
            .observe(&detection(
                robot,
                Some(0),
                Metric::Temperature,
                "threshold",
                1.0,
                t0 + Duration::seconds(i),
            ))
            .await
            .unwrap()
            .unwrap();
        assert!(!outcome.alarm.suppressed);
    }
    assert_eq!(h.store.alarm_count(), 1);
    assert_eq!(h.pushed_alarms().await, 5);
}

#[tokio::test]
async fn pose_alarms_have_no_joint() {
    let h = harness();
    let robot = Uuid::new_v4();
    let outcome = h
        .correlator
        .observe(&detection(robot, None, Metric::PosePosition, "threshold", 0.2, Utc::now()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.alarm.joint_index, None);
    assert_eq!(outcome.alarm.kind, armwatch_core::AlarmKind::PoseAnomaly);
    assert!(outcome.alarm.dedup_key.ends_with("-pose-threshold"));
}

#[tokio::test]
async fn normal_verdicts_are_ignored() {
    let h = harness();
    let mut d = detection(Uuid::new_v4(), Some(0), Metric::Current, "zscore", 0.0, Utc::now());
    d.result = DetectionResult::normal(json!({}));
    assert!(h.correlator.observe(&d).await.unwrap().is_none());
    assert_eq!(h.store.alarm_count(), 0);
}

#[tokio::test]
async fn acknowledge_open_alarm_records_one_ack() {
    let h = harness();
    let outcome = h
        .correlator
        .observe(&detection(Uuid::new_v4(), Some(0), Metric::Current, "zscore", 3.5, Utc::now()))
        .await
        .unwrap()
        .unwrap();

    let (alarm, ack) = h
        .correlator
        .acknowledge(outcome.alarm.id, "operator", Some("checking coolant".into()))
        .await
        .unwrap();

    assert_eq!(alarm.status, AlarmStatus::Acked);
    assert_eq!(ack.alarm_id, alarm.id);
    assert_eq!(ack.comment.as_deref(), Some("checking coolant"));
    assert_eq!(h.store.acks_for_alarm(alarm.id).unwrap().len(), 1);
    assert_eq!(h.pushed_alarms().await, 2);
}

#[tokio::test]
async fn acknowledge_closed_alarm_is_rejected() {
    let h = harness();
    let outcome = h
        .correlator
        .observe(&detection(Uuid::new_v4(), Some(0), Metric::Current, "zscore", 3.5, Utc::now()))
        .await
        .unwrap()
        .unwrap();
    h.correlator.close(outcome.alarm.id).await.unwrap();

    let err = h
        .correlator
        .acknowledge(outcome.alarm.id, "operator", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ComputeError::AlarmClosed(_)));
    assert_eq!(err.category(), armwatch_core::ErrorCategory::Conflict);
    assert!(h.store.acks_for_alarm(outcome.alarm.id).unwrap().is_empty());
    assert_eq!(
        h.store.alarm(outcome.alarm.id).unwrap().unwrap().status,
        AlarmStatus::Closed
    );
}

#[tokio::test]
async fn unknown_alarm_is_not_found() {
    let h = harness();
    let err = h.correlator.close(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.category(), armwatch_core::ErrorCategory::NotFound);
}

#[tokio::test]
async fn closed_alarm_is_not_reopened_by_new_detection() {
    let h = harness();
    let robot = Uuid::new_v4();
    let t0 = Utc::now();
    let d = detection(robot, Some(0), Metric::Current, "zscore", 3.5, t0);

    let first = h.correlator.observe(&d).await.unwrap().unwrap();
    let closed = h.correlator.close(first.alarm.id).await.unwrap();
    assert_eq!(closed.status, AlarmStatus::Closed);

    let mut again = d.clone();
    again.ts = t0 + Duration::seconds(5);
    let second = h.correlator.observe(&again).await.unwrap().unwrap();

    assert_eq!(second.change, AlarmChange::Created);
    assert_ne!(second.alarm.id, first.alarm.id);
    assert_eq!(second.alarm.count, 1);
    let old = h.store.alarm(first.alarm.id).unwrap().unwrap();
    assert_eq!(old.status, AlarmStatus::Closed);
    assert_eq!(old.count, 1);
}

#[tokio::test]
async fn close_pushes_even_suppressed_alarms() {
    let h = harness();
    let robot = Uuid::new_v4();
    let t0 = Utc::now();
    let mut last = None;
    for joint in 0..3 {
        last = h
            .correlator
            .observe(&detection(robot, Some(joint), Metric::Temperature, "threshold", 1.0, t0))
            .await
            .unwrap();
    }
    let suppressed = last.unwrap().alarm;
    assert!(suppressed.suppressed);

    h.correlator.close(suppressed.id).await.unwrap();
    assert_eq!(h.pushed_alarms().await, 3);
}
