use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use armwatch_compute::{AlarmChange, AlarmOutcome};
use armwatch_core::RunId;

/// What one live tick or replay group produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub joint_samples: u64,
    pub pose_samples: u64,
    pub alarms_raised: u64,
    pub alarms_updated: u64,
    pub alarms_suppressed: u64,
}

impl TickReport {
    pub fn count_outcomes(&mut self, outcomes: &[AlarmOutcome]) {
        for outcome in outcomes {
            match outcome.change {
                AlarmChange::Created => self.alarms_raised += 1,
                AlarmChange::Updated => self.alarms_updated += 1,
            }
            if outcome.alarm.suppressed && outcome.change == AlarmChange::Created {
                self.alarms_suppressed += 1;
            }
        }
    }
}

/// Running totals for one run across its live and replay tasks.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunCounters {
    pub ticks: u64,
    pub failed_ticks: u64,
    pub joint_samples: u64,
    pub pose_samples: u64,
    pub alarms_raised: u64,
    pub alarms_updated: u64,
    pub alarms_suppressed: u64,
    pub busy_time: Duration,
    pub slowest_tick: Duration,
    pub last_tick: Option<DateTime<Utc>>,
}

impl RunCounters {
    /// Mean handler time per tick; zero before the first tick.
    pub fn mean_tick_duration(&self) -> Duration {
        u32::try_from(self.ticks)
            .ok()
            .filter(|&n| n > 0)
            .map(|n| self.busy_time / n)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerMetrics {
    pub runs: HashMap<RunId, RunCounters>,
    /// Tasks currently registered.
    pub active_runs: usize,
}

impl SchedulerMetrics {
    pub fn record_tick(&mut self, run_id: RunId, report: TickReport, elapsed: Duration) {
        let run = self.runs.entry(run_id).or_default();
        run.ticks += 1;
        run.joint_samples += report.joint_samples;
        run.pose_samples += report.pose_samples;
        run.alarms_raised += report.alarms_raised;
        run.alarms_updated += report.alarms_updated;
        run.alarms_suppressed += report.alarms_suppressed;
        run.busy_time += elapsed;
        run.slowest_tick = run.slowest_tick.max(elapsed);
        run.last_tick = Some(Utc::now());
    }

    pub fn record_failure(&mut self, run_id: RunId) {
        self.runs.entry(run_id).or_default().failed_ticks += 1;
    }

    pub fn run(&self, run_id: RunId) -> Option<&RunCounters> {
        self.runs.get(&run_id)
    }

    pub fn ticks(&self, run_id: RunId) -> u64 {
        self.run(run_id).map_or(0, |r| r.ticks)
    }

    pub fn failed_ticks(&self, run_id: RunId) -> u64 {
        self.run(run_id).map_or(0, |r| r.failed_ticks)
    }
}
