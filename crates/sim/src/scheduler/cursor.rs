use chrono::{DateTime, Utc};

use armwatch_core::{JointSample, PoseSample};

/// Samples sharing one timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayGroup {
    pub ts: DateTime<Utc>,
    pub joints: Vec<JointSample>,
    pub pose: Option<PoseSample>,
}

/// Walks recorded samples of a run in timestamp order, one group of equal
/// timestamps at a time. Inputs must already be sorted by `ts`.
#[derive(Debug)]
pub struct ReplayCursor {
    joints: Vec<JointSample>,
    poses: Vec<PoseSample>,
    joint_pos: usize,
    pose_pos: usize,
    groups_emitted: u64,
}

impl ReplayCursor {
    pub fn new(joints: Vec<JointSample>, poses: Vec<PoseSample>) -> Self {
        Self {
            joints,
            poses,
            joint_pos: 0,
            pose_pos: 0,
            groups_emitted: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty() && self.poses.is_empty()
    }

    pub fn is_exhausted(&self) -> bool {
        self.joint_pos >= self.joints.len() && self.pose_pos >= self.poses.len()
    }

    pub fn groups_emitted(&self) -> u64 {
        self.groups_emitted
    }

    pub fn next_group(&mut self) -> Option<ReplayGroup> {
        let next_joint = self.joints.get(self.joint_pos).map(|s| s.ts);
        let next_pose = self.poses.get(self.pose_pos).map(|s| s.ts);
        let ts = match (next_joint, next_pose) {
            (Some(j), Some(p)) => j.min(p),
            (Some(j), None) => j,
            (None, Some(p)) => p,
            (None, None) => return None,
        };

        let start = self.joint_pos;
        while self.joints.get(self.joint_pos).is_some_and(|s| s.ts == ts) {
            self.joint_pos += 1;
        }
        let joints = self.joints[start..self.joint_pos].to_vec();

        let mut pose = None;
        while let Some(p) = self.poses.get(self.pose_pos).filter(|p| p.ts == ts) {
            if pose.is_none() {
                pose = Some(p.clone());
            }
            self.pose_pos += 1;
        }

        self.groups_emitted += 1;
        Some(ReplayGroup { ts, joints, pose })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armwatch_core::SampleLabel;
    use chrono::Duration;
    use uuid::Uuid;

    fn joint(ts: DateTime<Utc>, idx: u32) -> JointSample {
        JointSample {
            ts,
            robot_id: Uuid::nil(),
            joint_index: idx,
            current_a: 2.0,
            vibration_rms: 0.1,
            temperature_c: 40.0,
            run_id: None,
            label: SampleLabel::Normal,
        }
    }

    fn pose(ts: DateTime<Utc>) -> PoseSample {
        PoseSample {
            ts,
            robot_id: Uuid::nil(),
            x: 500.0,
            y: 300.0,
            z: 200.0,
            rx: 0.0,
            ry: 0.0,
            rz: 0.0,
            run_id: None,
            label: SampleLabel::Normal,
        }
    }

    #[test]
    fn groups_by_identical_timestamp() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(1);
        let mut cursor = ReplayCursor::new(
            vec![joint(t0, 0), joint(t0, 1), joint(t1, 0), joint(t1, 1)],
            vec![pose(t0), pose(t1)],
        );

        let first = cursor.next_group().unwrap();
        assert_eq!(first.ts, t0);
        assert_eq!(first.joints.len(), 2);
        assert!(first.pose.is_some());

        let second = cursor.next_group().unwrap();
        assert_eq!(second.ts, t1);
        assert!(cursor.is_exhausted());
        assert!(cursor.next_group().is_none());
        assert_eq!(cursor.groups_emitted(), 2);
    }

    #[test]
    fn pose_only_timestamps_form_their_own_group() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::milliseconds(500);
        let mut cursor = ReplayCursor::new(vec![joint(t1, 0)], vec![pose(t0), pose(t1)]);

        let first = cursor.next_group().unwrap();
        assert!(first.joints.is_empty());
        assert_eq!(first.pose.map(|p| p.ts), Some(t0));

        let second = cursor.next_group().unwrap();
        assert_eq!(second.joints.len(), 1);
        assert!(second.pose.is_some());
    }

    #[test]
    fn empty_cursor() {
        let mut cursor = ReplayCursor::new(Vec::new(), Vec::new());
        assert!(cursor.is_empty());
        assert!(cursor.next_group().is_none());
    }
}
