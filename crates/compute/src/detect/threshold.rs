use serde_json::json;

use armwatch_core::config::ThresholdBand;
use armwatch_core::Severity;

use super::{DetectionResult, Detector};

/// Flags the newest reading when it leaves a static `[lower, upper]` band.
///
/// The score is the relative overshoot past the violated bound; a bound of
/// zero falls back to the absolute overshoot.
#[derive(Debug, Clone)]
pub struct ThresholdDetector {
    band: ThresholdBand,
}

impl ThresholdDetector {
    pub const NAME: &'static str = "threshold";

    pub fn new(band: ThresholdBand) -> Self {
        Self { band }
    }

    pub fn band(&self) -> ThresholdBand {
        self.band
    }
}

fn relative(overshoot: f64, bound: f64) -> f64 {
    if bound.abs() < f64::EPSILON {
        overshoot
    } else {
        overshoot / bound.abs()
    }
}

fn severity_for(deviation: f64) -> Severity {
    if deviation >= 1.0 {
        Severity::Critical
    } else if deviation >= 0.5 {
        Severity::Warn
    } else {
        Severity::Info
    }
}

impl Detector for ThresholdDetector {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn detect(&self, values: &[f64]) -> DetectionResult {
        let Some(&latest) = values.last() else {
            return DetectionResult::normal(json!({ "reason": "no data available" }));
        };
        let ThresholdBand { lower, upper } = self.band;

        let (deviation, direction, bound) = if latest > upper {
            (relative(latest - upper, upper), "above", upper)
        } else if latest < lower {
            (relative(lower - latest, lower), "below", lower)
        } else {
            return DetectionResult::normal(json!({
                "latest_value": latest,
                "within_threshold": true,
                "lower_threshold": lower,
                "upper_threshold": upper,
            }));
        };

        DetectionResult::anomaly(
            deviation,
            severity_for(deviation),
            json!({
                "latest_value": latest,
                "lower_threshold": lower,
                "upper_threshold": upper,
                "violated_bound": bound,
                "direction": direction,
                "deviation": deviation,
            }),
        )
    }
}
