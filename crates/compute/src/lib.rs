pub mod alarm;
pub mod detect;
pub mod error;
pub mod pipeline;
pub mod window;

pub use alarm::{AlarmChange, AlarmCorrelator, AlarmOutcome, Detection, SuppressionPolicy};
pub use detect::{DetectionResult, Detector, DetectorRegistry, ThresholdDetector, ZScoreDetector};
pub use error::ComputeError;
pub use pipeline::AnomalyPipeline;
pub use window::WindowStore;
