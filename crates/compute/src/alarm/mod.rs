//! Alarm correlation: dedup, storm suppression, acknowledge and close.

mod correlator;
mod dedup;
mod suppression;

#[cfg(test)]
mod tests;

pub use correlator::{AlarmChange, AlarmCorrelator, AlarmOutcome, Detection};
pub use dedup::dedup_key;
pub use suppression::SuppressionPolicy;
