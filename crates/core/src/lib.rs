pub mod alarm;
pub mod channel;
pub mod config;
pub mod entity;
pub mod error;
pub mod store;

pub use alarm::*;
pub use channel::*;
pub use config::Config;
pub use entity::*;
pub use error::*;
pub use store::{AlarmStore, MemoryStore, TelemetryStore};
