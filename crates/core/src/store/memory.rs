use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{AlarmStore, Result, TelemetryStore};
use crate::alarm::{AlarmAck, AlarmEvent, AlarmId, AlarmKind};
use crate::entity::{
    FaultInjection, JointSample, PoseSample, Robot, RobotId, RunId, ScenarioRun,
};
use crate::error::ArmwatchError;

/// Concurrent in-memory store. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    robots: Arc<DashMap<RobotId, Robot>>,
    runs: Arc<DashMap<RunId, ScenarioRun>>,
    faults: Arc<DashMap<RunId, Vec<FaultInjection>>>,
    joint_samples: Arc<DashMap<RunId, Vec<JointSample>>>,
    pose_samples: Arc<DashMap<RunId, Vec<PoseSample>>>,
    latest_joint: Arc<DashMap<(RobotId, u32), JointSample>>,
    latest_pose: Arc<DashMap<RobotId, PoseSample>>,
    alarms: Arc<DashMap<AlarmId, AlarmEvent>>,
    /// dedup key -> id of the single non-closed alarm owning it.
    open_by_key: Arc<DashMap<String, AlarmId>>,
    acks: Arc<DashMap<AlarmId, Vec<AlarmAck>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alarm_count(&self) -> usize {
        self.alarms.len()
    }

    pub fn joint_sample_count(&self, run_id: RunId) -> usize {
        self.joint_samples.get(&run_id).map(|v| v.len()).unwrap_or(0)
    }
}

/// Replace the cached latest sample unless it is newer than `sample`.
fn keep_newest<K, T>(entry: Entry<'_, K, T>, sample: &T, ts: impl Fn(&T) -> DateTime<Utc>)
where
    K: Eq + std::hash::Hash,
    T: Clone,
{
    match entry {
        Entry::Occupied(mut current) => {
            if ts(sample) >= ts(current.get()) {
                current.insert(sample.clone());
            }
        }
        Entry::Vacant(slot) => {
            slot.insert(sample.clone());
        }
    }
}

impl TelemetryStore for MemoryStore {
    fn robots(&self) -> Result<Vec<Robot>> {
        let mut robots: Vec<Robot> = self.robots.iter().map(|r| r.value().clone()).collect();
        robots.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(robots)
    }

    fn robot(&self, id: RobotId) -> Result<Option<Robot>> {
        Ok(self.robots.get(&id).map(|r| r.clone()))
    }

    fn save_robot(&self, robot: Robot) -> Result<Robot> {
        self.robots.insert(robot.id, robot.clone());
        Ok(robot)
    }

    fn run(&self, id: RunId) -> Result<Option<ScenarioRun>> {
        Ok(self.runs.get(&id).map(|r| r.clone()))
    }

    fn save_run(&self, run: ScenarioRun) -> Result<ScenarioRun> {
        self.runs.insert(run.id, run.clone());
        Ok(run)
    }

    fn save_fault(&self, fault: FaultInjection) -> Result<FaultInjection> {
        let mut faults = self.faults.entry(fault.run_id).or_default();
        faults.retain(|f| f.id != fault.id);
        faults.push(fault.clone());
        Ok(fault)
    }

    fn faults_for_run(&self, run_id: RunId) -> Result<Vec<FaultInjection>> {
        Ok(self.faults.get(&run_id).map(|f| f.clone()).unwrap_or_default())
    }

    fn save_joint_sample(&self, sample: JointSample) -> Result<JointSample> {
        if let Some(run_id) = sample.run_id {
            self.joint_samples.entry(run_id).or_default().push(sample.clone());
        }
        keep_newest(
            self.latest_joint.entry((sample.robot_id, sample.joint_index)),
            &sample,
            |s| s.ts,
        );
        Ok(sample)
    }

    fn save_pose_sample(&self, sample: PoseSample) -> Result<PoseSample> {
        if let Some(run_id) = sample.run_id {
            self.pose_samples.entry(run_id).or_default().push(sample.clone());
        }
        keep_newest(self.latest_pose.entry(sample.robot_id), &sample, |s| s.ts);
        Ok(sample)
    }

    fn joint_samples_for_run(&self, run_id: RunId) -> Result<Vec<JointSample>> {
        let mut samples = self
            .joint_samples
            .get(&run_id)
            .map(|s| s.clone())
            .unwrap_or_default();
        samples.sort_by_key(|s| s.ts);
        Ok(samples)
    }

    fn pose_samples_for_run(&self, run_id: RunId) -> Result<Vec<PoseSample>> {
        let mut samples = self
            .pose_samples
            .get(&run_id)
            .map(|s| s.clone())
            .unwrap_or_default();
        samples.sort_by_key(|s| s.ts);
        Ok(samples)
    }

    fn latest_joint_samples(&self, robot_id: RobotId) -> Result<Vec<JointSample>> {
        let mut latest: Vec<JointSample> = self
            .latest_joint
            .iter()
            .filter(|e| e.key().0 == robot_id)
            .map(|e| e.value().clone())
            .collect();
        latest.sort_by_key(|s| s.joint_index);
        Ok(latest)
    }

    fn latest_pose_sample(&self, robot_id: RobotId) -> Result<Option<PoseSample>> {
        Ok(self.latest_pose.get(&robot_id).map(|p| p.clone()))
    }
}

impl AlarmStore for MemoryStore {
    fn alarm(&self, id: AlarmId) -> Result<Option<AlarmEvent>> {
        Ok(self.alarms.get(&id).map(|a| a.clone()))
    }

    fn save_alarm(&self, alarm: AlarmEvent) -> Result<AlarmEvent> {
        if alarm.is_closed() {
            self.open_by_key
                .remove_if(&alarm.dedup_key, |_, owner| *owner == alarm.id);
        } else {
            match self.open_by_key.entry(alarm.dedup_key.clone()) {
                Entry::Occupied(owner) if *owner.get() != alarm.id => {
                    return Err(ArmwatchError::DuplicateDedupKey(alarm.dedup_key.clone()));
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(slot) => {
                    slot.insert(alarm.id);
                }
            }
        }
        self.alarms.insert(alarm.id, alarm.clone());
        Ok(alarm)
    }

    fn open_alarm_by_dedup_key(&self, dedup_key: &str) -> Result<Option<AlarmEvent>> {
        let Some(id) = self.open_by_key.get(dedup_key).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.alarms.get(&id).map(|a| a.clone()))
    }

    fn count_alarms(
        &self,
        robot_id: RobotId,
        kind: AlarmKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<usize> {
        Ok(self
            .alarms
            .iter()
            .filter(|a| {
                a.robot_id == robot_id && a.kind == kind && a.first_seen > from && a.first_seen <= to
            })
            .count())
    }

    fn alarms_for_run(&self, run_id: RunId) -> Result<Vec<AlarmEvent>> {
        let mut alarms: Vec<AlarmEvent> = self
            .alarms
            .iter()
            .filter(|a| a.run_id == Some(run_id))
            .map(|a| a.value().clone())
            .collect();
        alarms.sort_by_key(|a| a.first_seen);
        Ok(alarms)
    }

    fn save_ack(&self, ack: AlarmAck) -> Result<AlarmAck> {
        self.acks.entry(ack.alarm_id).or_default().push(ack.clone());
        Ok(ack)
    }

    fn acks_for_alarm(&self, alarm_id: AlarmId) -> Result<Vec<AlarmAck>> {
        Ok(self.acks.get(&alarm_id).map(|a| a.clone()).unwrap_or_default())
    }
}
