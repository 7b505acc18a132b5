//! Per (robot, channel) sliding windows of recent readings.
//!
//! Each key owns its own mutex-guarded sequence, so writers on different
//! keys never contend and a record-then-purge on one key is atomic.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use armwatch_core::config::DETECTION_WINDOW_SECS;
use armwatch_core::{ChannelId, RobotId};

use crate::detect::stats::{summarize, WindowStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct WindowKey {
    robot_id: RobotId,
    channel: ChannelId,
}

type Series = VecDeque<(DateTime<Utc>, f64)>;

/// Concurrent window store. Clones share the same windows.
#[derive(Debug, Clone)]
pub struct WindowStore {
    series: Arc<DashMap<WindowKey, Arc<Mutex<Series>>>>,
    window: Duration,
}

impl Default for WindowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowStore {
    pub fn new() -> Self {
        Self::with_window(Duration::seconds(DETECTION_WINDOW_SECS))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            series: Arc::new(DashMap::new()),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Append a reading. Out-of-order timestamps are inserted in place
    /// (after any equal timestamps). Readings older than twice the window,
    /// measured from `ts`, are purged from this key.
    pub fn record(&self, robot_id: RobotId, channel: ChannelId, value: f64, ts: DateTime<Utc>) {
        let series = self
            .series
            .entry(WindowKey { robot_id, channel })
            .or_default()
            .clone();

        let mut s = lock(&series);
        let pos = s.partition_point(|(t, _)| *t <= ts);
        s.insert(pos, (ts, value));

        let cutoff = ts - self.window * 2;
        while matches!(s.front(), Some((t, _)) if *t < cutoff) {
            s.pop_front();
        }
    }

    /// Values with timestamps in `(as_of - window, as_of]`, oldest first.
    pub fn query(&self, robot_id: RobotId, channel: ChannelId, as_of: DateTime<Utc>) -> Vec<f64> {
        let Some(series) = self.get(robot_id, channel) else {
            return Vec::new();
        };
        let from = as_of - self.window;
        let s = lock(&series);
        s.iter()
            .filter(|(t, _)| *t > from && *t <= as_of)
            .map(|(_, v)| *v)
            .collect()
    }

    pub fn stats(&self, robot_id: RobotId, channel: ChannelId, as_of: DateTime<Utc>) -> WindowStats {
        summarize(&self.query(robot_id, channel, as_of))
    }

    /// Readings retained for a key, including ones outside the current window.
    pub fn retained(&self, robot_id: RobotId, channel: ChannelId) -> usize {
        self.get(robot_id, channel)
            .map(|s| lock(&s).len())
            .unwrap_or(0)
    }

    fn get(&self, robot_id: RobotId, channel: ChannelId) -> Option<Arc<Mutex<Series>>> {
        self.series
            .get(&WindowKey { robot_id, channel })
            .map(|s| s.value().clone())
    }
}

fn lock(series: &Mutex<Series>) -> MutexGuard<'_, Series> {
    series.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use armwatch_core::Metric;
    use uuid::Uuid;

    fn temp(joint: u32) -> ChannelId {
        ChannelId::joint(joint, Metric::Temperature)
    }

    #[test]
    fn query_returns_half_open_window_in_order() {
        let store = WindowStore::new();
        let robot = Uuid::new_v4();
        let t0 = Utc::now();

        for i in 0..100 {
            store.record(robot, temp(0), i as f64, t0 + Duration::seconds(i));
        }

        let as_of = t0 + Duration::seconds(90);
        let values = store.query(robot, temp(0), as_of);
        // (30, 90] -> 31..=90
        let expected: Vec<f64> = (31..=90).map(|i| i as f64).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn unknown_key_is_empty() {
        let store = WindowStore::new();
        assert!(store.query(Uuid::new_v4(), temp(3), Utc::now()).is_empty());
        assert_eq!(store.stats(Uuid::new_v4(), temp(3), Utc::now()).count, 0);
    }

    #[test]
    fn late_reading_lands_in_time_order() {
        let store = WindowStore::new();
        let robot = Uuid::new_v4();
        let t0 = Utc::now();

        store.record(robot, temp(0), 1.0, t0);
        store.record(robot, temp(0), 3.0, t0 + Duration::seconds(2));
        store.record(robot, temp(0), 2.0, t0 + Duration::seconds(1));

        assert_eq!(
            store.query(robot, temp(0), t0 + Duration::seconds(2)),
            vec![1.0, 2.0, 3.0]
        );
    }

    #[test]
    fn old_readings_are_purged_on_write() {
        let store = WindowStore::new();
        let robot = Uuid::new_v4();
        let t0 = Utc::now();

        store.record(robot, temp(0), 1.0, t0);
        store.record(robot, temp(0), 2.0, t0 + Duration::seconds(100));
        assert_eq!(store.retained(robot, temp(0)), 2);

        store.record(robot, temp(0), 3.0, t0 + Duration::seconds(121));
        assert_eq!(store.retained(robot, temp(0)), 2);
    }

    #[test]
    fn keys_are_independent() {
        let store = WindowStore::new();
        let robot = Uuid::new_v4();
        let t0 = Utc::now();

        store.record(robot, temp(0), 1.0, t0);
        store.record(robot, temp(1), 2.0, t0);
        store.record(robot, ChannelId::joint(0, Metric::Current), 3.0, t0);

        assert_eq!(store.query(robot, temp(0), t0), vec![1.0]);
        assert_eq!(store.query(robot, temp(1), t0), vec![2.0]);
        assert_eq!(store.query(robot, ChannelId::joint(0, Metric::Current), t0), vec![3.0]);
    }

    #[test]
    fn concurrent_writers_on_one_key_lose_nothing() {
        let store = WindowStore::new();
        let robot = Uuid::new_v4();
        let t0 = Utc::now();

        std::thread::scope(|scope| {
            for w in 0..4 {
                let store = store.clone();
                scope.spawn(move || {
                    for i in 0..25 {
                        let ts = t0 + Duration::milliseconds(w * 25 + i);
                        store.record(robot, temp(0), 1.0, ts);
                    }
                });
            }
        });

        let values = store.query(robot, temp(0), t0 + Duration::seconds(1));
        assert_eq!(values.len(), 100);
    }

    #[test]
    fn stats_summarize_current_window() {
        let store = WindowStore::new();
        let robot = Uuid::new_v4();
        let t0 = Utc::now();
        for (i, v) in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].iter().enumerate() {
            store.record(robot, temp(0), *v, t0 + Duration::seconds(i as i64));
        }
        let stats = store.stats(robot, temp(0), t0 + Duration::seconds(7));
        assert_eq!(stats.count, 8);
        assert!((stats.mean - 5.0).abs() < 1e-12);
        assert!((stats.std_dev - 2.0).abs() < 1e-12);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
    }
}
