use serde_json::json;

use armwatch_core::config::MIN_DETECTION_SAMPLES;
use armwatch_core::Severity;

use super::stats::population_stats;
use super::{DetectionResult, Detector};

/// Flags the newest reading when it sits more than `threshold` population
/// standard deviations from the window mean.
#[derive(Debug, Clone)]
pub struct ZScoreDetector {
    threshold: f64,
    min_samples: usize,
}

impl Default for ZScoreDetector {
    fn default() -> Self {
        Self::new(3.0)
    }
}

impl ZScoreDetector {
    pub const NAME: &'static str = "zscore";

    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            min_samples: MIN_DETECTION_SAMPLES,
        }
    }
}

fn severity_for(z: f64) -> Severity {
    if z >= 5.0 {
        Severity::Critical
    } else if z >= 3.0 {
        Severity::Warn
    } else {
        Severity::Info
    }
}

impl Detector for ZScoreDetector {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn detect(&self, values: &[f64]) -> DetectionResult {
        if values.len() < self.min_samples {
            return DetectionResult::normal(json!({
                "reason": "insufficient data",
                "sample_count": values.len(),
                "required": self.min_samples,
            }));
        }

        let (Some((mean, std_dev)), Some(&latest)) = (population_stats(values), values.last())
        else {
            return DetectionResult::normal(json!({ "reason": "no data available" }));
        };

        if std_dev == 0.0 {
            return DetectionResult::normal(json!({
                "reason": "no variance in data",
                "mean": mean,
                "std_dev": 0.0,
                "sample_count": values.len(),
            }));
        }

        let z = (latest - mean).abs() / std_dev;
        let evidence = json!({
            "latest_value": latest,
            "mean": mean,
            "std_dev": std_dev,
            "z_score": z,
            "threshold": self.threshold,
            "sample_count": values.len(),
        });

        if z > self.threshold {
            DetectionResult::anomaly(z, severity_for(z), evidence)
        } else {
            DetectionResult::normal(evidence)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outlier_after_tight_cluster_is_flagged() {
        let mut values: Vec<f64> = (0..19).map(|i| if i % 2 == 0 { 2.0 } else { 3.0 }).collect();
        values.push(10.0);

        let r = ZScoreDetector::default().detect(&values);
        assert!(r.is_anomaly);
        assert!(r.score > 3.0);
        assert!(matches!(r.severity, Severity::Warn | Severity::Critical));
        assert_eq!(r.evidence["sample_count"], 20);
    }

    #[test]
    fn constant_window_reports_zero_spread() {
        let r = ZScoreDetector::default().detect(&[7.5; 10]);
        assert!(!r.is_anomaly);
        assert_eq!(r.evidence["std_dev"], 0.0);
        assert_eq!(r.evidence["reason"], "no variance in data");
    }

    #[test]
    fn short_window_is_insufficient() {
        let r = ZScoreDetector::default().detect(&[1.0, 2.0, 100.0]);
        assert!(!r.is_anomaly);
        assert_eq!(r.evidence["reason"], "insufficient data");
        assert_eq!(r.evidence["sample_count"], 3);
    }

    #[test]
    fn in_range_latest_is_normal() {
        let values: Vec<f64> = (0..20).map(|i| 10.0 + (i % 3) as f64).collect();
        let r = ZScoreDetector::default().detect(&values);
        assert!(!r.is_anomaly);
        assert_eq!(r.severity, Severity::Info);
        assert!(r.evidence["z_score"].as_f64().unwrap() < 3.0);
    }

    #[test]
    fn severity_tiers() {
        assert_eq!(severity_for(2.0), Severity::Info);
        assert_eq!(severity_for(3.0), Severity::Warn);
        assert_eq!(severity_for(4.99), Severity::Warn);
        assert_eq!(severity_for(5.0), Severity::Critical);
    }
}
