//! Parametric waveform model with gaussian sensor noise.

use std::f64::consts::PI;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use armwatch_core::{JointSample, PoseSample};

use super::faults::{
    apply_joint_faults, apply_pose_faults, motion_radians, seconds, JointReading, PoseReading,
};
use super::{DataSource, SampleContext, SourceError, SourceKind};

const CURRENT_AMPLITUDE: f64 = 1.5;
const TEMP_SEASONAL_AMPLITUDE: f64 = 3.0;
const TEMP_SEASONAL_HZ: f64 = 0.01;
const MOTION_VIBRATION_GAIN: f64 = 0.05;

/// Always-available generator. Reseeding makes a run reproducible.
pub struct SyntheticSource {
    rng: Mutex<StdRng>,
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }

    pub fn joint_reading(&self, ctx: &SampleContext, joint_index: u32) -> (JointReading, armwatch_core::SampleLabel) {
        let t = motion_radians(ctx.ts);
        let phase = joint_index as f64 * PI / 3.0;
        let motion = (t + phase).sin();
        let seasonal = (2.0 * PI * TEMP_SEASONAL_HZ * seconds(ctx.ts)).sin();

        self.with_rng(|rng| {
            let mut reading = JointReading {
                current_a: ctx.base.current_a + CURRENT_AMPLITUDE * motion + gaussian(rng, 0.15),
                temperature_c: ctx.base.temperature_c
                    + TEMP_SEASONAL_AMPLITUDE * seasonal
                    + gaussian(rng, 1.5),
                vibration_rms: (ctx.base.vibration_rms
                    + MOTION_VIBRATION_GAIN * motion.abs()
                    + gaussian(rng, 0.01))
                .abs(),
            };
            let label = apply_joint_faults(&mut reading, &ctx.faults, ctx.ts, &mut |s| gaussian(rng, s));
            (reading, label)
        })
    }

    pub fn pose_reading(&self, ctx: &SampleContext) -> (PoseReading, armwatch_core::SampleLabel) {
        let t = motion_radians(ctx.ts);

        self.with_rng(|rng| {
            let mut reading = PoseReading {
                x: 500.0 + 100.0 * t.sin() + 30.0 * (3.0 * t).sin() + gaussian(rng, 5.0),
                y: 300.0 + 80.0 * t.cos() + 20.0 * (2.5 * t).cos() + gaussian(rng, 3.0),
                z: 200.0 + 50.0 * (1.5 * t).sin() + gaussian(rng, 2.0),
                rx: PI / 4.0 + 0.5 * (2.0 * t).sin() + gaussian(rng, 0.1),
                ry: 0.3 * (1.8 * t).cos() + gaussian(rng, 0.05),
                rz: PI / 6.0 + 0.4 * (2.2 * t).sin() + gaussian(rng, 0.08),
            };
            let label = apply_pose_faults(&mut reading, &ctx.faults, ctx.ts, &mut |s| gaussian(rng, s));
            (reading, label)
        })
    }
}

/// Zero-mean normal draw with standard deviation `sigma`. A negative or
/// non-finite `sigma` yields no noise.
fn gaussian(rng: &mut StdRng, sigma: f64) -> f64 {
    Normal::new(0.0, sigma).map_or(0.0, |normal| normal.sample(rng))
}

#[async_trait]
impl DataSource for SyntheticSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Synthetic
    }

    async fn joint_sample(&self, ctx: &SampleContext, joint_index: u32) -> Result<JointSample, SourceError> {
        let (reading, label) = self.joint_reading(ctx, joint_index);
        Ok(JointSample {
            ts: ctx.ts,
            robot_id: ctx.robot_id,
            joint_index,
            current_a: reading.current_a,
            vibration_rms: reading.vibration_rms,
            temperature_c: reading.temperature_c,
            run_id: ctx.run_id,
            label,
        })
    }

    async fn pose_sample(&self, ctx: &SampleContext) -> Result<PoseSample, SourceError> {
        let (reading, label) = self.pose_reading(ctx);
        Ok(PoseSample {
            ts: ctx.ts,
            robot_id: ctx.robot_id,
            x: reading.x,
            y: reading.y,
            z: reading.z,
            rx: reading.rx,
            ry: reading.ry,
            rz: reading.rz,
            run_id: ctx.run_id,
            label,
        })
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn initialize(&self) -> Result<(), SourceError> {
        tracing::info!("synthetic data source initialized");
        Ok(())
    }

    async fn shutdown(&self) {
        tracing::info!("synthetic data source shut down");
    }

    fn reseed(&self, seed: u64) {
        self.with_rng(|rng| *rng = StdRng::seed_from_u64(seed));
        tracing::debug!(seed, "synthetic data source reseeded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armwatch_core::{FaultInjection, FaultKind, NominalParams, SampleLabel};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn ctx(faults: Vec<FaultInjection>) -> SampleContext {
        SampleContext {
            ts: Utc::now(),
            robot_id: Uuid::new_v4(),
            run_id: Some(Uuid::new_v4()),
            base: NominalParams::default(),
            faults,
        }
    }

    #[tokio::test]
    async fn same_seed_same_samples() {
        let c = ctx(Vec::new());
        let a = SyntheticSource::seeded(7);
        let b = SyntheticSource::new();
        b.reseed(7);

        for joint in 0..6 {
            assert_eq!(
                a.joint_sample(&c, joint).await.unwrap(),
                b.joint_sample(&c, joint).await.unwrap()
            );
        }
        assert_eq!(a.pose_sample(&c).await.unwrap(), b.pose_sample(&c).await.unwrap());
    }

    #[tokio::test]
    async fn nominal_samples_stay_near_base() {
        let source = SyntheticSource::seeded(1);
        let c = ctx(Vec::new());
        for joint in 0..6 {
            let s = source.joint_sample(&c, joint).await.unwrap();
            assert_eq!(s.label, SampleLabel::Normal);
            assert_eq!(s.run_id, c.run_id);
            assert!(s.current_a >= 0.0 && s.current_a < 6.0);
            assert!(s.temperature_c > 25.0 && s.temperature_c < 55.0);
            assert!(s.vibration_rms >= 0.0 && s.vibration_rms < 0.5);
        }
    }

    #[tokio::test]
    async fn active_fault_labels_sample() {
        let source = SyntheticSource::seeded(3);
        let now = Utc::now();
        let fault = FaultInjection::new(Uuid::new_v4(), FaultKind::HighVibration, now - Duration::seconds(1), now + Duration::seconds(60));
        let mut c = ctx(vec![fault]);
        c.ts = now;

        let s = source.joint_sample(&c, 0).await.unwrap();
        assert_eq!(s.label, SampleLabel::FaultHighVibration);
        assert!(s.vibration_rms > 0.3);

        let pose = source.pose_sample(&c).await.unwrap();
        assert_eq!(pose.label, SampleLabel::Normal);
    }

    #[test]
    fn invalid_sigma_adds_no_noise() {
        let mut rng = StdRng::seed_from_u64(11);
        assert_eq!(gaussian(&mut rng, -1.0), 0.0);
        assert_eq!(gaussian(&mut rng, f64::NAN), 0.0);
        assert_eq!(gaussian(&mut rng, 0.0), 0.0);
    }

    #[test]
    fn gaussian_is_roughly_standard() {
        let mut rng = StdRng::seed_from_u64(11);
        let draws: Vec<f64> = (0..5000).map(|_| gaussian(&mut rng, 2.0)).collect();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        let var = draws.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / draws.len() as f64;
        assert!(mean.abs() < 0.15);
        assert!((var.sqrt() - 2.0).abs() < 0.15);
    }
}
