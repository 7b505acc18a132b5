//! Fault effects layered on top of raw readings.
//!
//! Shared by the synthetic model and the live-device adapter so an injected
//! fault looks the same whichever source is active.

use std::f64::consts::PI;

use chrono::{DateTime, Utc};

use armwatch_core::{FaultInjection, FaultKind, SampleLabel};

/// Base robot motion frequency.
pub const MOTION_FREQUENCY_HZ: f64 = 0.1;

pub const PARAM_AMPLITUDE: &str = "amplitude";
pub const PARAM_DRIFT_RATE: &str = "drift_rate";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointReading {
    pub current_a: f64,
    pub vibration_rms: f64,
    pub temperature_c: f64,
}

impl JointReading {
    fn clamp_non_negative(&mut self) {
        self.current_a = self.current_a.max(0.0);
        self.vibration_rms = self.vibration_rms.max(0.0);
        self.temperature_c = self.temperature_c.max(0.0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseReading {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
}

pub fn seconds(ts: DateTime<Utc>) -> f64 {
    ts.timestamp_millis() as f64 / 1000.0
}

/// Phase of the base motion cycle at `ts`, in radians.
pub fn motion_radians(ts: DateTime<Utc>) -> f64 {
    2.0 * PI * MOTION_FREQUENCY_HZ * seconds(ts)
}

/// Apply every fault active at `ts`, then clamp channels at zero.
///
/// `noise(sigma)` draws a zero-mean perturbation; deterministic callers pass
/// a closure returning `0.0`. Returns the label of the last applied fault.
pub fn apply_joint_faults(
    reading: &mut JointReading,
    faults: &[FaultInjection],
    ts: DateTime<Utc>,
    noise: &mut dyn FnMut(f64) -> f64,
) -> SampleLabel {
    let t = motion_radians(ts);
    let mut label = SampleLabel::Normal;

    for fault in faults.iter().filter(|f| f.is_active(ts)) {
        match fault.kind {
            FaultKind::Overheat => {
                reading.temperature_c += fault.param(PARAM_AMPLITUDE, 10.0) * (2.0 * t).sin();
            }
            FaultKind::HighVibration => {
                reading.vibration_rms += fault.param(PARAM_AMPLITUDE, 0.5) + 0.1 * (5.0 * t).sin();
            }
            FaultKind::CurrentSpike => {
                reading.current_a += fault.param(PARAM_AMPLITUDE, 2.0) * (1.0 + (3.0 * t).sin());
            }
            FaultKind::SensorDrift => {
                let drift =
                    fault.elapsed_secs(ts) * fault.param(PARAM_DRIFT_RATE, 0.01) + noise(0.005);
                reading.temperature_c += drift;
                reading.vibration_rms += drift.abs() * 0.1;
            }
        }
        label = fault.kind.label();
    }

    reading.clamp_non_negative();
    label
}

/// Pose is only affected by sensor drift; other fault kinds leave it intact.
pub fn apply_pose_faults(
    reading: &mut PoseReading,
    faults: &[FaultInjection],
    ts: DateTime<Utc>,
    noise: &mut dyn FnMut(f64) -> f64,
) -> SampleLabel {
    let mut label = SampleLabel::Normal;

    for fault in faults.iter().filter(|f| f.is_active(ts)) {
        match fault.kind {
            FaultKind::SensorDrift => {
                let elapsed = fault.elapsed_secs(ts);
                let rate = fault.param(PARAM_DRIFT_RATE, 0.001);
                let drift = elapsed * rate;

                reading.x += drift + noise(0.5);
                reading.y += drift + noise(0.3);
                reading.z += drift * 0.5 + noise(0.2);
                reading.rx += drift * 0.1;
                reading.ry += drift * 0.05;
                reading.rz += drift * 0.08;
                label = SampleLabel::FaultSensorDrift;
            }
            FaultKind::Overheat | FaultKind::HighVibration | FaultKind::CurrentSpike => {}
        }
    }

    label
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn nominal() -> JointReading {
        JointReading {
            current_a: 2.5,
            vibration_rms: 0.08,
            temperature_c: 40.0,
        }
    }

    fn no_noise(_sigma: f64) -> f64 {
        0.0
    }

    #[test]
    fn inactive_faults_leave_reading_untouched() {
        let ts = Utc::now();
        let fault = FaultInjection::new(
            Uuid::new_v4(),
            FaultKind::HighVibration,
            ts + Duration::seconds(1),
            ts + Duration::seconds(10),
        );
        let mut reading = nominal();
        let label = apply_joint_faults(&mut reading, &[fault], ts, &mut no_noise);
        assert_eq!(label, SampleLabel::Normal);
        assert_eq!(reading, nominal());
    }

    #[test]
    fn high_vibration_adds_amplitude() {
        let ts = Utc::now();
        let fault = FaultInjection::new(Uuid::new_v4(), FaultKind::HighVibration, ts, ts + Duration::seconds(10))
            .with_param(PARAM_AMPLITUDE, 2.0);
        let mut reading = nominal();
        let label = apply_joint_faults(&mut reading, &[fault], ts, &mut no_noise);
        assert_eq!(label, SampleLabel::FaultHighVibration);
        assert!(reading.vibration_rms >= 0.08 + 2.0 - 0.1 - 1e-9);
        assert_eq!(reading.temperature_c, 40.0);
    }

    #[test]
    fn current_spike_never_lowers_current() {
        let start = Utc::now();
        let fault = FaultInjection::new(Uuid::new_v4(), FaultKind::CurrentSpike, start, start + Duration::seconds(60));
        for s in 0..60 {
            let mut reading = nominal();
            apply_joint_faults(&mut reading, &[fault.clone()], start + Duration::seconds(s), &mut no_noise);
            assert!(reading.current_a >= 2.5 - 1e-9);
        }
    }

    #[test]
    fn sensor_drift_grows_with_elapsed_time() {
        let start = Utc::now();
        let fault = FaultInjection::new(Uuid::new_v4(), FaultKind::SensorDrift, start, start + Duration::seconds(1000))
            .with_param(PARAM_DRIFT_RATE, 0.1);

        let mut reading = nominal();
        apply_joint_faults(&mut reading, &[fault.clone()], start + Duration::seconds(100), &mut no_noise);
        assert!((reading.temperature_c - 50.0).abs() < 1e-9);
        assert!((reading.vibration_rms - 1.08).abs() < 1e-9);

        let mut pose = PoseReading { x: 0.0, y: 0.0, z: 0.0, rx: 0.0, ry: 0.0, rz: 0.0 };
        let label = apply_pose_faults(&mut pose, &[fault], start + Duration::seconds(100), &mut no_noise);
        assert_eq!(label, SampleLabel::FaultSensorDrift);
        assert!((pose.x - 10.0).abs() < 1e-9);
        assert!((pose.z - 5.0).abs() < 1e-9);
        assert!((pose.rx - 1.0).abs() < 1e-9);
    }

    #[test]
    fn readings_are_clamped_at_zero() {
        let ts = Utc::now();
        let fault = FaultInjection::new(Uuid::new_v4(), FaultKind::SensorDrift, ts, ts + Duration::seconds(10))
            .with_param(PARAM_DRIFT_RATE, -1000.0);
        let mut reading = nominal();
        apply_joint_faults(&mut reading, &[fault], ts + Duration::seconds(5), &mut no_noise);
        assert_eq!(reading.temperature_c, 0.0);
    }

    #[test]
    fn pose_ignores_joint_only_faults() {
        let ts = Utc::now();
        let fault = FaultInjection::new(Uuid::new_v4(), FaultKind::Overheat, ts, ts + Duration::seconds(10));
        let mut pose = PoseReading { x: 1.0, y: 2.0, z: 3.0, rx: 0.0, ry: 0.0, rz: 0.0 };
        let label = apply_pose_faults(&mut pose, &[fault], ts, &mut no_noise);
        assert_eq!(label, SampleLabel::Normal);
        assert_eq!(pose.x, 1.0);
    }
}
