//! Detector strategies: pure functions from a window of readings to a verdict.

pub mod registry;
pub mod stats;
pub mod threshold;
pub mod zscore;

pub use registry::DetectorRegistry;
pub use threshold::ThresholdDetector;
pub use zscore::ZScoreDetector;

use serde::Serialize;

use armwatch_core::Severity;

/// Outcome of one detector over one window. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub is_anomaly: bool,
    pub score: f64,
    pub severity: Severity,
    pub evidence: serde_json::Value,
}

impl DetectionResult {
    pub fn anomaly(score: f64, severity: Severity, evidence: serde_json::Value) -> Self {
        Self {
            is_anomaly: true,
            score,
            severity,
            evidence,
        }
    }

    /// Non-anomalous verdict; reported at `Info` with a zero score.
    pub fn normal(evidence: serde_json::Value) -> Self {
        Self {
            is_anomaly: false,
            score: 0.0,
            severity: Severity::Info,
            evidence,
        }
    }
}

/// A stateless detection strategy.
///
/// `values` is ordered oldest first; the last element is the reading under
/// test. Implementations must not panic on short or degenerate input.
pub trait Detector: Send + Sync {
    /// Stable name; part of the alarm dedup key.
    fn name(&self) -> &str;

    fn detect(&self, values: &[f64]) -> DetectionResult;
}
