use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use armwatch_core::{NominalParams, Robot, RunId, RunStatus, ScenarioRun};

use crate::error::SimError;
use crate::scheduler::metrics::TickReport;
use crate::scheduler::registry::CancelSignal;
use crate::scheduler::types::{tick_interval, TaskKind};
use crate::source::SampleContext;

use super::RunScheduler;

/// State owned by one live generation task.
pub(super) struct LiveTask {
    run_id: RunId,
    generation: u64,
    cancel: Arc<CancelSignal>,
    robot: Robot,
    rate_hz: u32,
    base: NominalParams,
}

impl RunScheduler {
    /// Start live generation for a run.
    ///
    /// Fails if the run is already `RUNNING` or has a registered task.
    /// Reseeds the active source with the run's seed, marks the run
    /// `RUNNING` and schedules a tick every `1000 / rate_hz` ms.
    pub async fn start(&self, run_id: RunId) -> Result<ScenarioRun, SimError> {
        let mut run = self.load_run(run_id)?;
        if let Some(existing) = self.registry.kind(run_id) {
            return Err(Self::conflict(run_id, existing));
        }
        if run.is_running() {
            return Err(SimError::AlreadyRunning(run_id));
        }
        if run.rate_hz == 0 {
            return Err(SimError::InvalidRate(run.rate_hz));
        }
        let robot = self.resolve_robot(&run)?;

        // Held until the task is registered so the source cannot be swapped in between.
        let source = self.source.read().await;
        let reservation = self
            .registry
            .try_reserve(run_id, TaskKind::Live)
            .map_err(|existing| Self::conflict(run_id, existing))?;
        source.reseed(run.seed);

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

        let task = LiveTask {
            run_id,
            generation: reservation.generation,
            cancel: reservation.cancel,
            robot,
            rate_hz: run.rate_hz,
            base: run.base,
        };
        self.registry
            .launch(run_id, reservation.generation, self.clone().run_live(task));

        info!(
            run_id = %run_id,
            rate_hz = run.rate_hz,
            seed = run.seed,
            source = %self.source.kind().await,
            "Started live run"
        );
        Ok(run)
    }

    async fn run_live(self, task: LiveTask) {
        let mut ticker = tokio::time::interval(tick_interval(task.rate_hz));
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
                    debug!(run_id = %task.run_id, "Run no longer running, ending task");
                    self.finish_task(task.run_id, task.generation, None).await;
                    return;
                }
                Err(e) => {
                    self.fail_live(&task, e.into()).await;
                    return;
                }
            }

            let started = Instant::now();
            match self.live_tick(&task).await {
                Ok(report) => self.record_tick(task.run_id, report, started.elapsed()),
                Err(e) => {
                    self.fail_live(&task, e).await;
                    return;
                }
            }
        }
    }

    /// One tick: every joint, then the pose, then the latest-samples push.
    async fn live_tick(&self, task: &LiveTask) -> Result<TickReport, SimError> {
        let now = Utc::now();
        let robot_id = task.robot.id;
        let ctx = SampleContext {
            ts: now,
            robot_id,
            run_id: Some(task.run_id),
            base: task.base,
            faults: self.telemetry.active_faults(task.run_id, now)?,
        };
        let source = self.source.current().await;
        let mut report = TickReport::default();

        for joint_index in 0..task.robot.joint_count {
            let sample = source.joint_sample(&ctx, joint_index).await?;
            let sample = self.telemetry.save_joint_sample(sample)?;
            report.joint_samples += 1;
            report.count_outcomes(&self.pipeline.process_joint(&sample).await?);
        }

        let pose = source.pose_sample(&ctx).await?;
        let pose = self.telemetry.save_pose_sample(pose)?;
        report.pose_samples += 1;
        report.count_outcomes(&self.pipeline.process_pose(&pose).await?);

        let latest = self.telemetry.latest_joint_samples(robot_id)?;
        self.dispatcher
            .push_latest_samples(robot_id, latest, Some(pose));

        debug!(
            run_id = %task.run_id,
            faults = ctx.faults.len(),
            alarms_raised = report.alarms_raised,
            "Live tick complete"
        );
        Ok(report)
    }

    async fn fail_live(&self, task: &LiveTask, e: SimError) {
        error!(
            run_id = %task.run_id,
            category = %e.category(),
            error = %e,
            "Live tick failed, stopping run"
        );
        self.record_failure(task.run_id);
        self.finish_task(task.run_id, task.generation, Some(RunStatus::Stopped))
            .await;
    }
}
