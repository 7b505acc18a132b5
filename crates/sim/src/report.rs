//! Post-run evaluation summary.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use armwatch_core::{
    AlarmEvent, AlarmStatus, AlarmStore, FaultInjection, FaultKind, RunId, RunStatus,
    TelemetryStore,
};

use crate::error::SimError;

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub name: String,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub rate_hz: u32,
    pub seed: u64,
    pub samples: SampleStats,
    pub alarms: AlarmStats,
    pub faults: Vec<FaultSummary>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SampleStats {
    pub joint_samples: usize,
    pub pose_samples: usize,
    /// Distinct joint indices seen in the recording.
    pub joints: usize,
    pub expected_interval_ms: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AlarmStats {
    pub total: usize,
    pub open: usize,
    pub acknowledged: usize,
    pub closed: usize,
    pub suppressed: usize,
    pub by_kind: BTreeMap<String, usize>,
    pub by_severity: BTreeMap<String, usize>,
    pub by_detector: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FaultSummary {
    pub kind: FaultKind,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_ms: i64,
    /// Whether any alarm of the run was first seen at or after the fault start.
    pub triggered_alarm: bool,
    /// Time from fault start to the first such alarm.
    pub detection_delay_ms: Option<i64>,
}

/// Summarize a run from what the stores recorded for it.
pub fn summarize_run(
    telemetry: &dyn TelemetryStore,
    alarms: &dyn AlarmStore,
    run_id: RunId,
) -> Result<RunSummary, SimError> {
    let run = telemetry.run(run_id)?.ok_or(SimError::RunNotFound(run_id))?;

    let joint_samples = telemetry.joint_samples_for_run(run_id)?;
    let pose_samples = telemetry.pose_samples_for_run(run_id)?;
    let mut joint_indices: Vec<u32> = joint_samples.iter().map(|s| s.joint_index).collect();
    joint_indices.sort_unstable();
    joint_indices.dedup();

    let samples = SampleStats {
        joint_samples: joint_samples.len(),
        pose_samples: pose_samples.len(),
        joints: joint_indices.len(),
        expected_interval_ms: 1000.0 / f64::from(run.rate_hz.max(1)),
    };

    let mut run_alarms = alarms.alarms_for_run(run_id)?;
    run_alarms.sort_by_key(|a| a.first_seen);

    let faults = telemetry
        .faults_for_run(run_id)?
        .iter()
        .map(|f| summarize_fault(f, &run_alarms))
        .collect();

    let duration_ms = match (run.started_at, run.ended_at) {
        (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
        _ => None,
    };

    Ok(RunSummary {
        run_id,
        name: run.name,
        status: run.status,
        started_at: run.started_at,
        ended_at: run.ended_at,
        duration_ms,
        rate_hz: run.rate_hz,
        seed: run.seed,
        samples,
        alarms: alarm_stats(&run_alarms),
        faults,
    })
}

fn alarm_stats(alarms: &[AlarmEvent]) -> AlarmStats {
    let mut stats = AlarmStats {
        total: alarms.len(),
        ..AlarmStats::default()
    };
    for alarm in alarms {
        match alarm.status {
            AlarmStatus::Open => stats.open += 1,
            AlarmStatus::Acked => stats.acknowledged += 1,
            AlarmStatus::Closed => stats.closed += 1,
        }
        if alarm.suppressed {
            stats.suppressed += 1;
        }
        *stats.by_kind.entry(alarm.kind.to_string()).or_default() += 1;
        *stats.by_severity.entry(alarm.severity.to_string()).or_default() += 1;
        *stats.by_detector.entry(alarm.detector.clone()).or_default() += 1;
    }
    stats
}

/// `alarms` must be sorted by `first_seen`.
fn summarize_fault(fault: &FaultInjection, alarms: &[AlarmEvent]) -> FaultSummary {
    let first = alarms.iter().find(|a| a.first_seen >= fault.start);
    FaultSummary {
        kind: fault.kind,
        start: fault.start,
        end: fault.end,
        duration_ms: (fault.end - fault.start).num_milliseconds(),
        triggered_alarm: first.is_some(),
        detection_delay_ms: first.map(|a| (a.first_seen - fault.start).num_milliseconds()),
    }
}
