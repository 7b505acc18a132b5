use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of worker threads. 0 = available parallelism.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
}

fn default_worker_threads() -> usize { 0 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
        }
    }
}

impl SchedulerConfig {
    pub fn new(worker_threads: usize) -> Self {
        Self { worker_threads }
    }

    /// Resolve worker thread count (0 means use available parallelism).
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.worker_threads
        }
    }
}

/// What a registered run task is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Live,
    Replay,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Live => write!(f, "live"),
            TaskKind::Replay => write!(f, "replay"),
        }
    }
}

/// Live tick period: `max(1, 1000 / rate_hz)` ms.
pub fn tick_interval(rate_hz: u32) -> Duration {
    Duration::from_millis((1000 / u64::from(rate_hz.max(1))).max(1))
}

/// Replay group period: `max(1, 1000 / (rate_hz * speed))` ms.
pub fn replay_interval(rate_hz: u32, speed: f64) -> Duration {
    let ms = 1000.0 / (f64::from(rate_hz.max(1)) * speed);
    Duration::from_millis((ms.floor() as u64).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_interval_floors_at_one_ms() {
        assert_eq!(tick_interval(1), Duration::from_millis(1000));
        assert_eq!(tick_interval(3), Duration::from_millis(333));
        assert_eq!(tick_interval(5000), Duration::from_millis(1));
    }

    #[test]
    fn replay_interval_scales_with_speed() {
        assert_eq!(replay_interval(10, 1.0), Duration::from_millis(100));
        assert_eq!(replay_interval(10, 4.0), Duration::from_millis(25));
        assert_eq!(replay_interval(10, 0.5), Duration::from_millis(200));
        assert_eq!(replay_interval(10, 1e6), Duration::from_millis(1));
    }

    #[test]
    fn worker_threads_resolve() {
        assert_eq!(SchedulerConfig::new(3).resolved_worker_threads(), 3);
        assert!(SchedulerConfig::default().resolved_worker_threads() >= 1);
        let parsed: SchedulerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.worker_threads, 0);
    }
}
