//! Sample -> window -> detectors -> correlator.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use armwatch_core::config::MIN_DETECTION_SAMPLES;
use armwatch_core::{ChannelId, JointSample, Metric, PoseSample, RobotId, RunId};

use crate::alarm::{AlarmCorrelator, AlarmOutcome, Detection};
use crate::detect::DetectorRegistry;
use crate::error::ComputeError;
use crate::window::WindowStore;

/// Feeds samples through the sliding windows and every registered detector.
///
/// All channels of a sample are recorded before any detector runs, so each
/// detection sees the complete sample.
pub struct AnomalyPipeline {
    windows: WindowStore,
    detectors: Arc<DetectorRegistry>,
    correlator: Arc<AlarmCorrelator>,
    min_samples: usize,
}

impl AnomalyPipeline {
    pub fn new(
        windows: WindowStore,
        detectors: Arc<DetectorRegistry>,
        correlator: Arc<AlarmCorrelator>,
    ) -> Self {
        Self {
            windows,
            detectors,
            correlator,
            min_samples: MIN_DETECTION_SAMPLES,
        }
    }

    pub fn windows(&self) -> &WindowStore {
        &self.windows
    }

    pub fn correlator(&self) -> &Arc<AlarmCorrelator> {
        &self.correlator
    }

    pub async fn process_joint(&self, sample: &JointSample) -> Result<Vec<AlarmOutcome>, ComputeError> {
        let readings = [
            (Metric::Current, sample.current_a),
            (Metric::Vibration, sample.vibration_rms),
            (Metric::Temperature, sample.temperature_c),
        ];
        for (metric, value) in readings {
            let channel = ChannelId::joint(sample.joint_index, metric);
            self.windows.record(sample.robot_id, channel, value, sample.ts);
        }

        let mut outcomes = Vec::new();
        for (metric, _) in readings {
            let channel = ChannelId::joint(sample.joint_index, metric);
            outcomes.extend(
                self.evaluate(sample.robot_id, channel, sample.ts, sample.run_id)
                    .await?,
            );
        }
        Ok(outcomes)
    }

    /// Screens the pose position magnitude; orientation is not monitored.
    pub async fn process_pose(&self, sample: &PoseSample) -> Result<Vec<AlarmOutcome>, ComputeError> {
        let channel = ChannelId::pose();
        self.windows
            .record(sample.robot_id, channel, sample.position_magnitude(), sample.ts);
        self.evaluate(sample.robot_id, channel, sample.ts, sample.run_id)
            .await
    }

    async fn evaluate(
        &self,
        robot_id: RobotId,
        channel: ChannelId,
        ts: DateTime<Utc>,
        run_id: Option<RunId>,
    ) -> Result<Vec<AlarmOutcome>, ComputeError> {
        let values = self.windows.query(robot_id, channel, ts);
        if values.len() < self.min_samples {
            return Ok(Vec::new());
        }

        let mut outcomes = Vec::new();
        for detector in self.detectors.detectors(channel.metric) {
            let result = detector.detect(&values);
            if !result.is_anomaly {
                continue;
            }
            tracing::debug!(
                robot_id = %robot_id,
                channel = %channel,
                detector = detector.name(),
                score = result.score,
                "anomaly detected"
            );
            let detection = Detection {
                robot_id,
                joint_index: channel.joint,
                metric: channel.metric,
                detector: detector.name().to_string(),
                result,
                ts,
                run_id,
            };
            if let Some(outcome) = self.correlator.observe(&detection).await? {
                outcomes.push(outcome);
            }
        }
        Ok(outcomes)
    }
}
