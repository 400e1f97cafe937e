//! Named-slot task dispatcher with supersede semantics
//!
//! Each slot runs at most one operation. Submitting to an occupied slot
//! cancels the in-flight operation and bumps the slot's generation; only a
//! result whose generation still matches at arrival is accepted. Workers run
//! on the Tokio pool, never on the decision loop; completions cross back
//! through one ordered mpsc channel.

use crate::error::TaskError;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Receipt for an accepted submission
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TaskTicket {
    pub slot: String,
    pub generation: u64,
    /// True when an in-flight operation was cancelled to make room
    pub superseded: bool,
}

/// How a background operation ended
#[derive(Debug)]
pub enum TaskOutcome<P> {
    Completed(P),
    Failed(TaskError),
}

/// A completion as it arrives on the delivery channel
#[derive(Debug)]
pub struct TaskDelivery<P> {
    pub slot: String,
    pub generation: u64,
    pub outcome: TaskOutcome<P>,
}

struct SlotState {
    generation: u64,
    cancel: CancellationToken,
}

/// Slot-keyed background executor
///
/// Generic over the payload type so the core can be exercised without the
/// remote stack. Owned by the decision loop; the delivery receiver is taken
/// out once and polled in its select loop.
pub struct TaskDispatcher<P> {
    slots: HashMap<String, SlotState>,
    /// Monotonic per slot name, surviving vacated slots. A counter that
    /// restarted after vacate could collide with a late stale delivery.
    generations: HashMap<String, u64>,
    tx: mpsc::UnboundedSender<TaskDelivery<P>>,
    rx: Option<mpsc::UnboundedReceiver<TaskDelivery<P>>>,
}

impl<P: Send + 'static> TaskDispatcher<P> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            slots: HashMap::new(),
            generations: HashMap::new(),
            tx,
            rx: Some(rx),
        }
    }

    /// Take the delivery channel receiver. Yields Some exactly once.
    pub fn take_delivery_rx(&mut self) -> Option<mpsc::UnboundedReceiver<TaskDelivery<P>>> {
        self.rx.take()
    }

    /// Submit an operation to a slot, superseding any in-flight one.
    ///
    /// The operation runs under the given timeout on the Tokio pool. A
    /// superseded or cancelled operation delivers nothing at all.
    pub fn submit<F>(&mut self, slot: &str, timeout: Duration, operation: F) -> TaskTicket
    where
        F: Future<Output = Result<P, TaskError>> + Send + 'static,
    {
        let superseded = match self.slots.remove(slot) {
            Some(old) => {
                old.cancel.cancel();
                debug!("slot {} superseded (was generation {})", slot, old.generation);
                true
            }
            None => false,
        };

        let generation = {
            let counter = self.generations.entry(slot.to_string()).or_insert(0);
            *counter += 1;
            *counter
        };

        let cancel = CancellationToken::new();
        self.slots.insert(
            slot.to_string(),
            SlotState {
                generation,
                cancel: cancel.clone(),
            },
        );

        let tx = self.tx.clone();
        let slot_name = slot.to_string();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("task {}#{} cancelled before completion", slot_name, generation);
                    return;
                }
                result = tokio::time::timeout(timeout, operation) => match result {
                    Ok(Ok(payload)) => TaskOutcome::Completed(payload),
                    Ok(Err(e)) => TaskOutcome::Failed(e),
                    Err(_) => {
                        warn!("task {}#{} timed out", slot_name, generation);
                        TaskOutcome::Failed(TaskError::Timeout)
                    }
                },
            };
            // Receiver gone means the daemon is shutting down
            let _ = tx.send(TaskDelivery {
                slot: slot_name,
                generation,
                outcome,
            });
        });

        TaskTicket {
            slot: slot.to_string(),
            generation,
            superseded,
        }
    }

    /// Cancel a slot's in-flight operation, if any. Results that were
    /// already in the air are dropped at accept time.
    pub fn cancel(&mut self, slot: &str) -> bool {
        match self.slots.remove(slot) {
            Some(state) => {
                state.cancel.cancel();
                debug!("slot {} cancelled (generation {})", slot, state.generation);
                true
            }
            None => false,
        }
    }

    /// Validate an arrived delivery against current slot state.
    ///
    /// Accepting vacates the slot, so each accepted generation is delivered
    /// exactly once. Stale generations and cancelled slots return None.
    pub fn accept(&mut self, delivery: TaskDelivery<P>) -> Option<TaskDelivery<P>> {
        match self.slots.get(&delivery.slot) {
            Some(state) if state.generation == delivery.generation => {
                self.slots.remove(&delivery.slot);
                Some(delivery)
            }
            Some(state) => {
                debug!(
                    "dropping stale result for slot {} (generation {} != current {})",
                    delivery.slot, delivery.generation, state.generation
                );
                None
            }
            None => {
                debug!(
                    "dropping result for vacated slot {} (generation {})",
                    delivery.slot, delivery.generation
                );
                None
            }
        }
    }

    /// Whether a slot has an operation in flight
    pub fn is_busy(&self, slot: &str) -> bool {
        self.slots.contains_key(slot)
    }

    pub fn busy_slots(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.keys().cloned().collect();
        names.sort();
        names
    }
}

impl<P: Send + 'static> Default for TaskDispatcher<P> {
    fn default() -> Self {
        Self::new()
    }
}
