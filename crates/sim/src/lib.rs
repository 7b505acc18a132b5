//! Telemetry generation and run scheduling.
//!
//! - `source`: interchangeable data sources (synthetic model, live device)
//! - `scheduler`: per-run live and replay tasks with the run state machine
//! - `report`: post-run summary

pub mod error;
pub mod report;
pub mod scheduler;
pub mod source;

pub use error::SimError;
pub use report::{summarize_run, RunSummary};
pub use scheduler::{RunScheduler, SchedulerConfig, SchedulerMetrics};
pub use source::{
    DataSource, DataSourceCell, DeviceSource, SampleContext, SourceError, SourceKind,
    SyntheticSource,
};
