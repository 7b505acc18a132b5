use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use armwatch_core::{RunId, RunMode, RunStatus, ScenarioRun};

use crate::error::SimError;
use crate::scheduler::cursor::{ReplayCursor, ReplayGroup};
use crate::scheduler::metrics::TickReport;
use crate::scheduler::registry::CancelSignal;
use crate::scheduler::types::{replay_interval, TaskKind};

use super::RunScheduler;

/// State owned by one replay task, including its position in the recording.
pub(super) struct ReplayTask {
    run_id: RunId,
    generation: u64,
    cancel: Arc<CancelSignal>,
    period: Duration,
    cursor: ReplayCursor,
}

impl RunScheduler {
    /// Replay the recorded samples of a live run through the anomaly
    /// pipeline, one timestamp group every `1000 / (rate_hz * speed)` ms.
    /// The run ends `FINISHED` once every group has been replayed.
    pub async fn start_replay(&self, run_id: RunId, speed: f64) -> Result<ScenarioRun, SimError> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(SimError::InvalidSpeed(speed));
        }
        let mut run = self.load_run(run_id)?;
        if run.mode != RunMode::Live {
            return Err(SimError::NotReplayable(run_id));
        }
        if let Some(existing) = self.registry.kind(run_id) {
            return Err(Self::conflict(run_id, existing));
        }
        if run.is_running() {
            return Err(SimError::AlreadyRunning(run_id));
        }
        if run.rate_hz == 0 {
            return Err(SimError::InvalidRate(run.rate_hz));
        }

        let cursor = ReplayCursor::new(
            self.telemetry.joint_samples_for_run(run_id)?,
            self.telemetry.pose_samples_for_run(run_id)?,
        );
        if cursor.is_empty() {
            return Err(SimError::NoSamples(run_id));
        }

        let source = self.source.read().await;
        let reservation = self
            .registry
            .try_reserve(run_id, TaskKind::Replay)
            .map_err(|existing| Self::conflict(run_id, existing))?;

        run.status = RunStatus::Running;
        run.started_at = Some(Utc::now());
        run.ended_at = None;
        let run = match self.telemetry.save_run(run) {
            Ok(run) => run,
            Err(e) => {
                self.registry.release(run_id, reservation.generation);
                return Err(e.into());
            }
        };
        drop(source);

        self.dispatcher.push_run_status(&run);

        let period = replay_interval(run.rate_hz, speed);
        let task = ReplayTask {
            run_id,
            generation: reservation.generation,
            cancel: reservation.cancel,
            period,
            cursor,
        };
        self.registry
            .launch(run_id, reservation.generation, self.clone().run_replay(task));

        info!(
            run_id = %run_id,
            speed,
            period_ms = period.as_millis() as u64,
            "Started replay"
        );
        Ok(run)
    }

    async fn run_replay(self, mut task: ReplayTask) {
        let mut ticker = tokio::time::interval(task.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = task.cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }

            match self.telemetry.run(task.run_id) {
                Ok(Some(run)) if run.is_running() => {}
                Ok(_) => {
                    debug!(run_id = %task.run_id, "Replay no longer running, ending task");
                    self.finish_task(task.run_id, task.generation, None).await;
                    return;
                }
                Err(e) => {
                    self.fail_replay(&task, e.into()).await;
                    return;
                }
            }

            let Some(group) = task.cursor.next_group() else {
                info!(
                    run_id = %task.run_id,
                    groups = task.cursor.groups_emitted(),
                    "Replay completed"
                );
                self.finish_task(task.run_id, task.generation, Some(RunStatus::Finished))
                    .await;
                return;
            };

            let started = Instant::now();
            match self.replay_group(task.run_id, group).await {
                Ok(report) => self.record_tick(task.run_id, report, started.elapsed()),
                Err(e) => {
                    self.fail_replay(&task, e).await;
                    return;
                }
            }
        }
    }

    async fn replay_group(&self, run_id: RunId, group: ReplayGroup) -> Result<TickReport, SimError> {
        let mut report = TickReport::default();
        for sample in &group.joints {
            report.joint_samples += 1;
            report.count_outcomes(&self.pipeline.process_joint(sample).await?);
        }
        if let Some(pose) = &group.pose {
            report.pose_samples += 1;
            report.count_outcomes(&self.pipeline.process_pose(pose).await?);
        }

        let robot_id = group
            .joints
            .first()
            .map(|s| s.robot_id)
            .or_else(|| group.pose.as_ref().map(|p| p.robot_id));
        if let Some(robot_id) = robot_id {
            debug!(
                run_id = %run_id,
                ts = %group.ts,
                joints = group.joints.len(),
                "Replayed group"
            );
            self.dispatcher
                .push_latest_samples(robot_id, group.joints, group.pose);
        }
        Ok(report)
    }

    async fn fail_replay(&self, task: &ReplayTask, e: SimError) {
        error!(
            run_id = %task.run_id,
            category = %e.category(),
            error = %e,
            "Replay failed, stopping run"
        );
        self.record_failure(task.run_id);
        self.finish_task(task.run_id, task.generation, Some(RunStatus::Stopped))
            .await;
    }
}
