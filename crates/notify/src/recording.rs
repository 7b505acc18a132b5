//! In-memory channel that keeps every delivered event.
//!
//! Used by tests across the workspace to observe what the core pushed.

use std::sync::{Arc, Mutex, PoisonError};

use crate::traits::{Notifier, NotifyError, TelemetryEvent};

/// Records events into a shared buffer. Clones share the buffer, so keep one
/// clone for assertions and hand the other to a [`crate::Dispatcher`].
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events published under `topic`.
    pub fn on_topic(&self, topic: &str) -> Vec<TelemetryEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.topic() == topic)
            .collect()
    }

    pub fn alarm_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, TelemetryEvent::Alarm { .. }))
            .count()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, event: &TelemetryEvent) -> Result<(), NotifyError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}
