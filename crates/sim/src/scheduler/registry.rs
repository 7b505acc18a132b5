//! Run id → active task handle.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;

use armwatch_core::RunId;

use super::types::TaskKind;

/// Cooperative stop request observed by a run task between ticks.
#[derive(Debug, Default)]
pub struct CancelSignal {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            self.notify.notified().await;
        }
    }
}

#[derive(Debug)]
struct Slot {
    kind: TaskKind,
    generation: u64,
    cancel: Arc<CancelSignal>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Handle returned by a successful reservation.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub generation: u64,
    pub cancel: Arc<CancelSignal>,
}

/// A task removed from the registry. Awaiting it waits for the in-flight
/// tick to finish.
#[derive(Debug)]
pub struct Removed {
    pub kind: TaskKind,
    task: Option<JoinHandle<()>>,
}

impl Removed {
    pub async fn join(self) {
        if let Some(task) = self.task {
            if let Err(e) = task.await {
                if e.is_panic() {
                    tracing::error!(error = %e, "run task panicked");
                }
            }
        }
    }
}

/// One slot per run id; inserting into an occupied slot fails atomically.
#[derive(Debug, Default)]
pub struct RunRegistry {
    tasks: DashMap<RunId, Slot>,
    next_generation: AtomicU64,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `run_id`, or report what already occupies it.
    pub fn try_reserve(&self, run_id: RunId, kind: TaskKind) -> Result<Reservation, TaskKind> {
        match self.tasks.entry(run_id) {
            Entry::Occupied(existing) => Err(existing.get().kind),
            Entry::Vacant(slot) => {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let cancel = Arc::new(CancelSignal::default());
                slot.insert(Slot {
                    kind,
                    generation,
                    cancel: Arc::clone(&cancel),
                    task: Mutex::new(None),
                });
                Ok(Reservation { generation, cancel })
            }
        }
    }

    /// Spawn `task` for a reservation. The task is held at a start gate
    /// until its handle is stored in the slot, so a stop that removes the
    /// slot always finds the handle to join. A stop that lands before the
    /// handle is stored has already cancelled the signal the task checks
    /// first.
    pub fn launch<F>(&self, run_id: RunId, generation: u64, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (ready_tx, ready_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            if ready_rx.await.is_ok() {
                task.await;
            }
        });
        self.attach(run_id, generation, handle);
        let _ = ready_tx.send(());
    }

    /// Store the spawned task in its reservation. If the reservation is
    /// already gone (the task finished first) the handle is detached.
    fn attach(&self, run_id: RunId, generation: u64, task: JoinHandle<()>) {
        if let Some(entry) = self.tasks.get(&run_id) {
            if entry.generation == generation {
                *entry.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
            }
        }
    }

    /// Remove the slot and signal its task to stop.
    pub fn cancel(&self, run_id: RunId) -> Option<Removed> {
        let (_, slot) = self.tasks.remove(&run_id)?;
        Some(Self::stop_slot(slot))
    }

    /// Like [`cancel`](Self::cancel), but only when the slot holds a task of `kind`.
    pub fn cancel_kind(&self, run_id: RunId, kind: TaskKind) -> Option<Removed> {
        let (_, slot) = self.tasks.remove_if(&run_id, |_, slot| slot.kind == kind)?;
        Some(Self::stop_slot(slot))
    }

    fn stop_slot(slot: Slot) -> Removed {
        slot.cancel.cancel();
        let task = slot.task.into_inner().unwrap_or_else(PoisonError::into_inner);
        Removed {
            kind: slot.kind,
            task,
        }
    }

    /// Remove the slot only if it still belongs to `generation`.
    pub fn release(&self, run_id: RunId, generation: u64) -> bool {
        self.tasks
            .remove_if(&run_id, |_, entry| entry.generation == generation)
            .is_some()
    }

    /// Cancel every registered task.
    pub fn cancel_all(&self) -> Vec<(RunId, Removed)> {
        self.run_ids()
            .into_iter()
            .filter_map(|id| self.cancel(id).map(|removed| (id, removed)))
            .collect()
    }

    pub fn kind(&self, run_id: RunId) -> Option<TaskKind> {
        self.tasks.get(&run_id).map(|e| e.kind)
    }

    pub fn contains(&self, run_id: RunId) -> bool {
        self.tasks.contains_key(&run_id)
    }

    pub fn run_ids(&self) -> Vec<RunId> {
        self.tasks.iter().map(|e| *e.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
