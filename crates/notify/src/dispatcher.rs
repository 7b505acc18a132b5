//! Fans telemetry events out to every configured channel.
//!
//! Delivery is fire-and-forget from the caller's point of view: `push_*`
//! only enqueues onto a bounded queue drained by one background worker, so
//! a slow channel never stalls a scheduler tick or an alarm transition.
//! Channel failures are logged by the worker and never returned. Individual
//! channel failures don't block other channels.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use armwatch_core::{AlarmEvent, JointSample, PoseSample, RobotId, ScenarioRun};

use crate::traits::{DispatchResult, Notifier, TelemetryEvent};

/// Events buffered ahead of the delivery worker before pushes are dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

enum Envelope {
    Event(TelemetryEvent),
    Flush(oneshot::Sender<()>),
}

/// Dispatches telemetry events to multiple channels.
pub struct Dispatcher {
    channels: Arc<Vec<Box<dyn Notifier>>>,
    queue: Option<mpsc::Sender<Envelope>>,
}

impl Dispatcher {
    /// Create an empty dispatcher (events are dropped).
    pub fn empty() -> Self {
        Self {
            channels: Arc::new(Vec::new()),
            queue: None,
        }
    }

    /// Spawns the delivery worker, so this must be called inside a Tokio
    /// runtime. The worker exits once the dispatcher is dropped.
    pub fn with_channels(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self::with_capacity(channels, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(channels: Vec<Box<dyn Notifier>>, capacity: usize) -> Self {
        let channels = Arc::new(channels);
        if channels.is_empty() {
            return Self {
                channels,
                queue: None,
            };
        }

        let (tx, mut rx) = mpsc::channel::<Envelope>(capacity.max(1));
        let worker_channels = Arc::clone(&channels);
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                match envelope {
                    Envelope::Event(event) => {
                        deliver(&worker_channels, &event).await;
                    }
                    Envelope::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            tracing::debug!("Notification worker stopped");
        });

        Self {
            channels,
            queue: Some(tx),
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Deliver an event to all channels inline, bypassing the queue.
    ///
    /// Returns results for each channel delivery.
    pub async fn dispatch(&self, event: &TelemetryEvent) -> Vec<DispatchResult> {
        deliver(&self.channels, event).await
    }

    /// Queue an event for background delivery. Never waits on a channel; a
    /// full queue drops the event with a warning.
    pub fn enqueue(&self, event: TelemetryEvent) {
        let Some(queue) = &self.queue else {
            tracing::trace!(topic = %event.topic(), "No notification channels configured");
            return;
        };
        match queue.try_send(Envelope::Event(event)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(Envelope::Event(event))) => {
                tracing::warn!(
                    topic = %event.topic(),
                    subject = %event.subject_key(),
                    "Notification queue full, dropping event"
                );
            }
            Err(_) => tracing::warn!("Notification worker gone, dropping event"),
        }
    }

    /// Wait until every event queued before this call has been delivered.
    pub async fn flush(&self) {
        let Some(queue) = &self.queue else {
            return;
        };
        let (done_tx, done_rx) = oneshot::channel();
        if queue.send(Envelope::Flush(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }

    pub fn push_latest_samples(
        &self,
        robot_id: RobotId,
        joints: Vec<JointSample>,
        pose: Option<PoseSample>,
    ) {
        self.enqueue(TelemetryEvent::LatestSamples {
            robot_id,
            joints,
            pose,
        });
    }

    pub fn push_run_status(&self, run: &ScenarioRun) {
        self.enqueue(TelemetryEvent::RunStatus { run: run.clone() });
    }

    pub fn push_alarm(&self, alarm: &AlarmEvent) {
        self.enqueue(TelemetryEvent::Alarm {
            alarm: alarm.clone(),
        });
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::empty()
    }
}

async fn deliver(channels: &[Box<dyn Notifier>], event: &TelemetryEvent) -> Vec<DispatchResult> {
    let topic = event.topic();
    let mut results = Vec::with_capacity(channels.len());

    for channel in channels {
        let start = std::time::Instant::now();
        let result = channel.send(event).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let (success, error) = match result {
            Ok(()) => {
                tracing::debug!(
                    %topic,
                    channel = channel.channel_name(),
                    duration_ms,
                    "Notification delivered"
                );
                (true, None)
            }
            Err(e) => {
                tracing::warn!(
                    %topic,
                    subject = %event.subject_key(),
                    channel = channel.channel_name(),
                    error = %e,
                    duration_ms,
                    "Notification delivery failed"
                );
                (false, Some(e.to_string()))
            }
        };

        results.push(DispatchResult {
            channel: channel.channel_name().to_string(),
            topic: topic.clone(),
            success,
            error,
            duration_ms,
        });
    }

    results
}
