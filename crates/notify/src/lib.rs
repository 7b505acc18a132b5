//! Push-notification boundary for telemetry, run and alarm updates.
//!
//! This crate provides:
//! - `TelemetryEvent`, the three pushes the core emits
//! - `Notifier` trait for pluggable delivery channels
//! - Log, webhook and in-memory recording channels
//! - `Dispatcher`, a fire-and-forget fan-out over configured channels

pub mod dispatcher;
pub mod log;
pub mod recording;
pub mod traits;
pub mod webhook;

pub use dispatcher::Dispatcher;
pub use log::LogNotifier;
pub use recording::RecordingNotifier;
pub use traits::{DispatchResult, Notifier, NotifyError, TelemetryEvent};
pub use webhook::WebhookNotifier;
