//! Persistence collaborator contracts.
//!
//! The core treats saves as synchronous and trusts the returned value to
//! carry any generated identifiers. [`MemoryStore`] is the in-process
//! implementation used by the CLI and the test suites.

mod memory;

pub use memory::MemoryStore;

use chrono::{DateTime, Utc};

use crate::alarm::{AlarmAck, AlarmEvent, AlarmId, AlarmKind};
use crate::entity::{
    FaultInjection, JointSample, PoseSample, Robot, RobotId, RunId, ScenarioRun,
};
use crate::error::ArmwatchError;

pub type Result<T> = std::result::Result<T, ArmwatchError>;

pub trait TelemetryStore: Send + Sync {
    /// All robots, oldest first.
    fn robots(&self) -> Result<Vec<Robot>>;
    fn robot(&self, id: RobotId) -> Result<Option<Robot>>;
    fn save_robot(&self, robot: Robot) -> Result<Robot>;

    fn run(&self, id: RunId) -> Result<Option<ScenarioRun>>;
    fn save_run(&self, run: ScenarioRun) -> Result<ScenarioRun>;

    fn save_fault(&self, fault: FaultInjection) -> Result<FaultInjection>;
    fn faults_for_run(&self, run_id: RunId) -> Result<Vec<FaultInjection>>;

    /// Faults of `run_id` whose `[start, end)` interval contains `at`.
    fn active_faults(&self, run_id: RunId, at: DateTime<Utc>) -> Result<Vec<FaultInjection>> {
        Ok(self
            .faults_for_run(run_id)?
            .into_iter()
            .filter(|f| f.is_active(at))
            .collect())
    }

    fn save_joint_sample(&self, sample: JointSample) -> Result<JointSample>;
    fn save_pose_sample(&self, sample: PoseSample) -> Result<PoseSample>;

    /// Recorded joint samples of a run, ordered by timestamp (stable for ties).
    fn joint_samples_for_run(&self, run_id: RunId) -> Result<Vec<JointSample>>;
    /// Recorded pose samples of a run, ordered by timestamp (stable for ties).
    fn pose_samples_for_run(&self, run_id: RunId) -> Result<Vec<PoseSample>>;

    /// Most recent sample per joint for a robot, ordered by joint index.
    fn latest_joint_samples(&self, robot_id: RobotId) -> Result<Vec<JointSample>>;
    fn latest_pose_sample(&self, robot_id: RobotId) -> Result<Option<PoseSample>>;
}

pub trait AlarmStore: Send + Sync {
    fn alarm(&self, id: AlarmId) -> Result<Option<AlarmEvent>>;

    /// Insert or replace by id. Fails with a conflict if another non-closed
    /// alarm already owns the same dedup key.
    fn save_alarm(&self, alarm: AlarmEvent) -> Result<AlarmEvent>;

    /// The non-closed alarm owning `dedup_key`, if any.
    fn open_alarm_by_dedup_key(&self, dedup_key: &str) -> Result<Option<AlarmEvent>>;

    /// Alarms for `robot_id` + `kind` first seen within `(from, to]`.
    fn count_alarms(
        &self,
        robot_id: RobotId,
        kind: AlarmKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<usize>;

    fn alarms_for_run(&self, run_id: RunId) -> Result<Vec<AlarmEvent>>;

    fn save_ack(&self, ack: AlarmAck) -> Result<AlarmAck>;
    fn acks_for_alarm(&self, alarm_id: AlarmId) -> Result<Vec<AlarmAck>>;
}
