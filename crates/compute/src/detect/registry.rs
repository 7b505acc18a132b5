use std::collections::BTreeMap;
use std::sync::Arc;

use armwatch_core::config::DetectionConfig;
use armwatch_core::Metric;

use super::{Detector, ThresholdDetector, ZScoreDetector};
use crate::error::ComputeError;

/// Detectors to run per metric, in registration order.
#[derive(Default)]
pub struct DetectorRegistry {
    by_metric: BTreeMap<Metric, Vec<Arc<dyn Detector>>>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A threshold detector per metric with its configured band, plus one
    /// z-score detector shared by every metric.
    pub fn from_config(config: &DetectionConfig) -> Self {
        let mut registry = Self::new();
        let zscore: Arc<dyn Detector> = Arc::new(ZScoreDetector::new(config.zscore_threshold));
        for metric in Metric::ALL {
            registry
                .by_metric
                .entry(metric)
                .or_default()
                .extend([
                    Arc::new(ThresholdDetector::new(config.band(metric))) as Arc<dyn Detector>,
                    zscore.clone(),
                ]);
        }
        registry
    }

    pub fn register(&mut self, metric: Metric, detector: Arc<dyn Detector>) -> Result<(), ComputeError> {
        let detectors = self.by_metric.entry(metric).or_default();
        if detectors.iter().any(|d| d.name() == detector.name()) {
            return Err(ComputeError::DuplicateDetector {
                metric,
                name: detector.name().to_string(),
            });
        }
        detectors.push(detector);
        Ok(())
    }

    pub fn detectors(&self, metric: Metric) -> &[Arc<dyn Detector>] {
        self.by_metric.get(&metric).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn detector_names(&self, metric: Metric) -> Vec<String> {
        self.detectors(metric)
            .iter()
            .map(|d| d.name().to_string())
            .collect()
    }
}
