//! Per-run task scheduling for live generation and replay.
//!
//! Each active run owns one repeating task on the tokio runtime. A run's
//! ticks are serialized inside its task; tasks of different runs proceed in
//! parallel on the runtime's worker pool.

mod cursor;
pub mod metrics;
mod registry;
pub mod runner;
pub mod types;

pub use cursor::{ReplayCursor, ReplayGroup};
pub use metrics::{RunCounters, SchedulerMetrics, TickReport};
pub use registry::RunRegistry;
pub use runner::RunScheduler;
pub use types::{replay_interval, tick_interval, SchedulerConfig, TaskKind};
