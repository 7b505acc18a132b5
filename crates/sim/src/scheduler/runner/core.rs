use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use armwatch_compute::AnomalyPipeline;
use armwatch_core::{ArmwatchError, Robot, RunId, RunStatus, ScenarioRun, TelemetryStore};
use armwatch_notify::Dispatcher;

use crate::error::SimError;
use crate::scheduler::metrics::{SchedulerMetrics, TickReport};
use crate::scheduler::registry::RunRegistry;
use crate::scheduler::types::{SchedulerConfig, TaskKind};
use crate::source::{DataSource, DataSourceCell, SourceKind};

/// Owns one repeating task per active run.
///
/// Cheap to clone; clones share the registry, metrics and collaborators.
#[derive(Clone)]
pub struct RunScheduler {
    pub(super) config: SchedulerConfig,
    pub(super) telemetry: Arc<dyn TelemetryStore>,
    pub(super) pipeline: Arc<AnomalyPipeline>,
    pub(super) dispatcher: Arc<Dispatcher>,
    /// The single active data source.
    pub(super) source: Arc<DataSourceCell>,
    /// Run id -> active task.
    pub(super) registry: Arc<RunRegistry>,
    pub(super) metrics: Arc<RwLock<SchedulerMetrics>>,
}

impl RunScheduler {
    pub fn new(
        config: SchedulerConfig,
        telemetry: Arc<dyn TelemetryStore>,
        pipeline: Arc<AnomalyPipeline>,
        dispatcher: Arc<Dispatcher>,
        source: Arc<DataSourceCell>,
    ) -> Self {
        info!(
            worker_threads = config.resolved_worker_threads(),
            "Run scheduler created"
        );
        Self {
            config,
            telemetry,
            pipeline,
            dispatcher,
            source,
            registry: Arc::new(RunRegistry::new()),
            metrics: Arc::new(RwLock::new(SchedulerMetrics::default())),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Arc<AnomalyPipeline> {
        &self.pipeline
    }

    /// Snapshot of the current scheduler metrics.
    pub fn metrics(&self) -> SchedulerMetrics {
        let mut snapshot = self
            .metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        snapshot.active_runs = self.registry.len();
        snapshot
    }

    /// Whether a live generation task is registered for `run_id`.
    pub fn is_running(&self, run_id: RunId) -> bool {
        self.registry.kind(run_id) == Some(TaskKind::Live)
    }

    pub fn is_replaying(&self, run_id: RunId) -> bool {
        self.registry.kind(run_id) == Some(TaskKind::Replay)
    }

    /// Run ids with a registered task, live or replay.
    pub fn active_runs(&self) -> Vec<RunId> {
        self.registry.run_ids()
    }

    pub fn status(&self, run_id: RunId) -> Result<ScenarioRun, SimError> {
        self.load_run(run_id)
    }

    pub async fn current_data_source(&self) -> SourceKind {
        self.source.kind().await
    }

    pub async fn is_data_source_available(&self) -> bool {
        self.source.current().await.is_available().await
    }

    /// Stop live generation. Waits for an in-flight tick to complete.
    /// A run without a live task is returned unchanged.
    pub async fn stop(&self, run_id: RunId) -> Result<ScenarioRun, SimError> {
        self.halt(run_id, TaskKind::Live).await
    }

    /// Stop a replay. Waits for an in-flight group to complete.
    pub async fn stop_replay(&self, run_id: RunId) -> Result<ScenarioRun, SimError> {
        self.halt(run_id, TaskKind::Replay).await
    }

    async fn halt(&self, run_id: RunId, kind: TaskKind) -> Result<ScenarioRun, SimError> {
        let run = self.load_run(run_id)?;
        let Some(removed) = self.registry.cancel_kind(run_id, kind) else {
            return Ok(run);
        };
        removed.join().await;

        let run = self.transition(run_id, RunStatus::Stopped).await?;
        info!(run_id = %run_id, task = %kind, "Run stopped");
        Ok(run)
    }

    /// Replace the active data source.
    ///
    /// Rejected while any run task is registered. The previous source is shut
    /// down before the new one is installed and initialized. A source that
    /// fails to initialize stays installed and the error is returned.
    pub async fn switch_data_source(&self, next: Arc<dyn DataSource>) -> Result<(), SimError> {
        let mut active = self.source.write().await;

        let running = self.registry.len();
        if running > 0 {
            warn!(active_runs = running, "Cannot switch data source while runs are active");
            return Err(SimError::RunsActive(running));
        }

        let previous = active.kind();
        info!(from = %previous, to = %next.kind(), "Switching data source");
        active.shutdown().await;
        *active = Arc::clone(&next);

        if let Err(e) = next.initialize().await {
            error!(source = %next.kind(), error = %e, "Data source failed to initialize");
            return Err(e.into());
        }

        info!(source = %next.kind(), "Data source switched");
        Ok(())
    }

    /// Cancel every task, wait for them, mark their runs stopped, and drain
    /// queued notifications.
    pub async fn shutdown(&self) {
        let removed = self.registry.cancel_all();
        info!(tasks = removed.len(), "Run scheduler shutting down");

        let mut run_ids = Vec::with_capacity(removed.len());
        for (run_id, task) in removed {
            task.join().await;
            run_ids.push(run_id);
        }
        for run_id in run_ids {
            if let Err(e) = self.transition(run_id, RunStatus::Stopped).await {
                warn!(run_id = %run_id, error = %e, "Failed to mark run stopped on shutdown");
            }
        }
        self.dispatcher.flush().await;
    }

    // ── shared helpers ───────────────────────────────────────

    pub(super) fn load_run(&self, run_id: RunId) -> Result<ScenarioRun, SimError> {
        self.telemetry
            .run(run_id)?
            .ok_or(SimError::RunNotFound(run_id))
    }

    /// The run's target robot, or the first robot when none is set.
    pub(super) fn resolve_robot(&self, run: &ScenarioRun) -> Result<Robot, SimError> {
        match run.robot_id {
            Some(robot_id) => self
                .telemetry
                .robot(robot_id)?
                .ok_or_else(|| ArmwatchError::RobotNotFound(robot_id.to_string()).into()),
            None => self
                .telemetry
                .robots()?
                .into_iter()
                .next()
                .ok_or(SimError::NoRobots(run.id)),
        }
    }

    pub(super) fn conflict(run_id: RunId, existing: TaskKind) -> SimError {
        match existing {
            TaskKind::Live => SimError::AlreadyRunning(run_id),
            TaskKind::Replay => SimError::ReplayActive(run_id),
        }
    }

    /// Persist a terminal status with its end time and push it.
    pub(super) async fn transition(
        &self,
        run_id: RunId,
        status: RunStatus,
    ) -> Result<ScenarioRun, SimError> {
        let mut run = self.load_run(run_id)?;
        run.status = status;
        run.ended_at = Some(Utc::now());
        let run = self.telemetry.save_run(run)?;
        self.dispatcher.push_run_status(&run);
        Ok(run)
    }

    pub(super) fn record_tick(&self, run_id: RunId, report: TickReport, elapsed: Duration) {
        self.metrics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .record_tick(run_id, report, elapsed);
    }

    pub(super) fn record_failure(&self, run_id: RunId) {
        self.metrics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .record_failure(run_id);
    }

    /// Called by a task that ends on its own. Only the task that still owns
    /// the registry slot performs the final transition.
    pub(super) async fn finish_task(
        &self,
        run_id: RunId,
        generation: u64,
        status: Option<RunStatus>,
    ) {
        if !self.registry.release(run_id, generation) {
            return;
        }
        if let Some(status) = status {
            match self.transition(run_id, status).await {
                Ok(run) => info!(run_id = %run_id, status = %run.status, "Run ended"),
                Err(e) => error!(run_id = %run_id, error = %e, "Failed to record run end"),
            }
        }
    }
}

impl std::fmt::Debug for RunScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunScheduler")
            .field("config", &self.config)
            .field("active_runs", &self.registry.len())
            .finish()
    }
}
