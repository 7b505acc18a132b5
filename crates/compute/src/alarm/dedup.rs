use armwatch_core::{Metric, RobotId};

/// Key grouping repeated detections of one anomaly source.
///
/// `{robot}-{joint}-{metric}-{detector}` for joint channels and
/// `{robot}-{metric}-{detector}` for the pose channel, lowercased.
pub fn dedup_key(robot_id: RobotId, joint: Option<u32>, metric: Metric, detector: &str) -> String {
    let key = match joint {
        Some(j) => format!("{}-{}-{}-{}", robot_id, j, metric.slug(), detector),
        None => format!("{}-{}-{}", robot_id, metric.slug(), detector),
    };
    key.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn joint_and_pose_layouts() {
        let robot = Uuid::nil();
        assert_eq!(
            dedup_key(robot, Some(2), Metric::Temperature, "ZScore"),
            "00000000-0000-0000-0000-000000000000-2-temperature-zscore"
        );
        assert_eq!(
            dedup_key(robot, None, Metric::PosePosition, "threshold"),
            "00000000-0000-0000-0000-000000000000-pose-threshold"
        );
    }

    #[test]
    fn detector_is_part_of_identity() {
        let robot = Uuid::new_v4();
        assert_ne!(
            dedup_key(robot, Some(0), Metric::Current, "threshold"),
            dedup_key(robot, Some(0), Metric::Current, "zscore")
        );
    }
}
