// crates/core/src/registry.rs
//! Per-key snapshot store with stale-write rejection.
//!
//! The registry owns the canonical [`JobSnapshot`] for every (kind, key)
//! slot. Writers identify themselves with the owner token they were issued
//! when they claimed the slot; a write whose token no longer matches is
//! dropped. That single rule is what makes restarting a job race-free: the
//! superseded invocation's late responses bounce off instead of clobbering
//! the new job's state, with no coordination between the two tasks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use tokio::sync::{broadcast, watch};

use showrunner_types::{JobEvent, JobId, JobKey, JobKind, JobSnapshot};

/// Outcome of a guarded snapshot write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Snapshot stored and published.
    Accepted,
    /// The slot is owned by a different invocation (superseded, cancelled,
    /// or never claimed). The write was dropped.
    StaleOwner,
    /// The slot already holds a terminal snapshot for this job. Terminal
    /// state is final; the write was dropped.
    AlreadyTerminal,
}

/// Who currently owns a slot's snapshot stream.
///
/// A slot starts `Local` when a start request claims it optimistically and
/// becomes `Confirmed` once the server issues a job id. Tickets distinguish
/// rapid restarts on the same key before either has a server id.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Owner {
    Local(u64),
    Confirmed(JobId),
}

struct Slot {
    owner: Option<Owner>,
    snapshot: Option<JobSnapshot>,
    // The watch channel outlives any one job so panel subscriptions survive
    // cancel + restart without re-subscribing.
    watch_tx: watch::Sender<Option<JobSnapshot>>,
}

impl Slot {
    fn empty() -> Self {
        let (watch_tx, _) = watch::channel(None);
        Self {
            owner: None,
            snapshot: None,
            watch_tx,
        }
    }

    fn publish(&mut self, snapshot: JobSnapshot) {
        self.snapshot = Some(snapshot.clone());
        // send_replace stores the value even while the slot has no
        // receivers; a late subscriber must still find the current snapshot.
        self.watch_tx.send_replace(Some(snapshot));
    }

    fn is_terminal(&self) -> bool {
        self.snapshot.as_ref().is_some_and(|s| s.is_terminal())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SlotKey {
    kind: JobKind,
    key: JobKey,
}

/// Snapshot store shared by the orchestrator, its polling loops, and every
/// subscribed UI collaborator.
///
/// Thread-safe via `Arc` wrapping.
pub struct JobRegistry {
    slots: RwLock<HashMap<SlotKey, Slot>>,
    next_ticket: AtomicU64,
    events_tx: broadcast::Sender<JobEvent>,
}

impl JobRegistry {
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(256);
        Self {
            slots: RwLock::new(HashMap::new()),
            next_ticket: AtomicU64::new(1),
            events_tx,
        }
    }

    /// Claim a slot and install an optimistic snapshot, superseding whatever
    /// owned it before. Returns the ticket the caller must present to
    /// [`confirm`](Self::confirm) or [`reject`](Self::reject).
    pub fn open(&self, kind: JobKind, key: &JobKey, snapshot: JobSnapshot) -> u64 {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        match self.slots.write() {
            Ok(mut slots) => {
                let slot = slots
                    .entry(SlotKey {
                        kind,
                        key: key.clone(),
                    })
                    .or_insert_with(Slot::empty);
                slot.owner = Some(Owner::Local(ticket));
                slot.publish(snapshot.clone());
                self.emit_updated(kind, key, snapshot);
            }
            Err(e) => tracing::error!("RwLock poisoned writing slot map: {e}"),
        }
        ticket
    }

    /// Promote a local ticket to a confirmed server job id and publish the
    /// first confirmed snapshot.
    ///
    /// Returns false when the ticket no longer owns the slot, which means
    /// the start response arrived after the key was restarted or cancelled.
    /// Nothing is written in that case and the caller must not start polling.
    pub fn confirm(
        &self,
        kind: JobKind,
        key: &JobKey,
        ticket: u64,
        job_id: JobId,
        snapshot: JobSnapshot,
    ) -> bool {
        let accepted = match self.slots.write() {
            Ok(mut slots) => match slots.get_mut(&SlotKey {
                kind,
                key: key.clone(),
            }) {
                Some(slot) if slot.owner == Some(Owner::Local(ticket)) => {
                    slot.owner = Some(Owner::Confirmed(job_id));
                    slot.publish(snapshot.clone());
                    self.emit_updated(kind, key, snapshot);
                    true
                }
                _ => false,
            },
            Err(e) => {
                tracing::error!("RwLock poisoned writing slot map: {e}");
                false
            }
        };
        if !accepted {
            tracing::debug!(kind = %kind, key = %key, "start confirmation arrived stale; dropped");
        }
        accepted
    }

    /// Write a terminal error for a start request that failed before any
    /// server id existed. Guarded by the same ticket as [`confirm`](Self::confirm).
    pub fn reject(&self, kind: JobKind, key: &JobKey, ticket: u64, snapshot: JobSnapshot) -> bool {
        let accepted = match self.slots.write() {
            Ok(mut slots) => match slots.get_mut(&SlotKey {
                kind,
                key: key.clone(),
            }) {
                Some(slot) if slot.owner == Some(Owner::Local(ticket)) => {
                    slot.publish(snapshot.clone());
                    self.emit_updated(kind, key, snapshot);
                    true
                }
                _ => false,
            },
            Err(e) => {
                tracing::error!("RwLock poisoned writing slot map: {e}");
                false
            }
        };
        if !accepted {
            tracing::debug!(kind = %kind, key = %key, "start failure arrived stale; dropped");
        }
        accepted
    }

    /// Write from a polling loop. Accepted only while `job_id` owns the slot
    /// and the stored snapshot is non-terminal.
    pub fn record(
        &self,
        kind: JobKind,
        key: &JobKey,
        job_id: &JobId,
        snapshot: JobSnapshot,
    ) -> WriteOutcome {
        let outcome = match self.slots.write() {
            Ok(mut slots) => match slots.get_mut(&SlotKey {
                kind,
                key: key.clone(),
            }) {
                Some(slot) => match &slot.owner {
                    Some(Owner::Confirmed(current)) if current == job_id => {
                        if slot.is_terminal() {
                            WriteOutcome::AlreadyTerminal
                        } else {
                            slot.publish(snapshot.clone());
                            self.emit_updated(kind, key, snapshot);
                            WriteOutcome::Accepted
                        }
                    }
                    _ => WriteOutcome::StaleOwner,
                },
                None => WriteOutcome::StaleOwner,
            },
            Err(e) => {
                tracing::error!("RwLock poisoned writing slot map: {e}");
                WriteOutcome::StaleOwner
            }
        };
        match outcome {
            WriteOutcome::Accepted => {}
            WriteOutcome::StaleOwner => {
                tracing::debug!(kind = %kind, key = %key, job_id = %job_id, "dropped stale snapshot write");
            }
            WriteOutcome::AlreadyTerminal => {
                tracing::debug!(kind = %kind, key = %key, job_id = %job_id, "dropped write after terminal snapshot");
            }
        }
        outcome
    }

    /// Latest stored snapshot for a key, if any.
    pub fn get(&self, kind: JobKind, key: &JobKey) -> Option<JobSnapshot> {
        match self.slots.read() {
            Ok(slots) => slots
                .get(&SlotKey {
                    kind,
                    key: key.clone(),
                })
                .and_then(|slot| slot.snapshot.clone()),
            Err(e) => {
                tracing::error!("RwLock poisoned reading slot map: {e}");
                None
            }
        }
    }

    /// Clear a slot's owner and snapshot. Subscribers on the key observe
    /// `None`; their channel stays open for a future restart. Returns
    /// whether the key held anything.
    pub fn remove(&self, kind: JobKind, key: &JobKey) -> bool {
        match self.slots.write() {
            Ok(mut slots) => match slots.get_mut(&SlotKey {
                kind,
                key: key.clone(),
            }) {
                Some(slot) => {
                    slot.owner = None;
                    slot.snapshot = None;
                    slot.watch_tx.send_replace(None);
                    let _ = self.events_tx.send(JobEvent::Removed {
                        kind,
                        key: key.clone(),
                    });
                    true
                }
                None => false,
            },
            Err(e) => {
                tracing::error!("RwLock poisoned writing slot map: {e}");
                false
            }
        }
    }

    /// Latest-value subscription for one key. The receiver yields the slot's
    /// current snapshot (or `None` when cleared) and every later change.
    /// Dropping the receiver is the unsubscribe.
    pub fn subscribe(&self, kind: JobKind, key: &JobKey) -> watch::Receiver<Option<JobSnapshot>> {
        match self.slots.write() {
            Ok(mut slots) => slots
                .entry(SlotKey {
                    kind,
                    key: key.clone(),
                })
                .or_insert_with(Slot::empty)
                .watch_tx
                .subscribe(),
            Err(e) => {
                tracing::error!("RwLock poisoned writing slot map: {e}");
                watch::channel(None).1
            }
        }
    }

    /// Whether the key holds a claimed, non-terminal job.
    pub fn is_live(&self, kind: JobKind, key: &JobKey) -> bool {
        match self.slots.read() {
            Ok(slots) => slots
                .get(&SlotKey {
                    kind,
                    key: key.clone(),
                })
                .is_some_and(|slot| {
                    slot.owner.is_some() && slot.snapshot.is_some() && !slot.is_terminal()
                }),
            Err(e) => {
                tracing::error!("RwLock poisoned reading slot map: {e}");
                false
            }
        }
    }

    /// Subscribe to the flattened all-keys event feed.
    ///
    /// Events are published while the slot write is still held, so the feed
    /// observes a key's accepted writes in order.
    pub fn events(&self) -> broadcast::Receiver<JobEvent> {
        self.events_tx.subscribe()
    }

    // Callers hold the slots write guard.
    fn emit_updated(&self, kind: JobKind, key: &JobKey, snapshot: JobSnapshot) {
        let _ = self.events_tx.send(JobEvent::Updated {
            kind,
            key: key.clone(),
            snapshot,
        });
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
