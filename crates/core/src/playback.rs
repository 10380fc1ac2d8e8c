// crates/core/src/playback.rs
//! Playback exclusivity: at most one active media surface.
//!
//! Player components do two things at mount time: subscribe to the active
//! watch channel (pause yourself when someone else becomes active) and
//! register a [`Pausable`] handle (let the arbiter pause you directly).
//! The registered handle is what removes the honor-system assumption; a
//! player that never polls its subscription still gets paused.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::debug;

use showrunner_types::PlayerId;

/// Capability the arbiter uses to force-pause a playback surface.
pub trait Pausable: Send + Sync {
    fn pause(&self);
}

/// Single source of truth for which player is active.
///
/// Thread-safe via `Arc` wrapping.
pub struct PlaybackArbiter {
    active_tx: watch::Sender<Option<PlayerId>>,
    players: Mutex<HashMap<PlayerId, Arc<dyn Pausable>>>,
}

impl PlaybackArbiter {
    pub fn new() -> Self {
        let (active_tx, _) = watch::channel(None);
        Self {
            active_tx,
            players: Mutex::new(HashMap::new()),
        }
    }

    /// Register a force-pause handle for a player, replacing any previous
    /// handle for the same player.
    pub fn register(&self, player: PlayerId, handle: Arc<dyn Pausable>) {
        match self.players.lock() {
            Ok(mut players) => {
                players.insert(player, handle);
            }
            Err(e) => tracing::error!("Mutex poisoned writing player map: {e}"),
        }
    }

    /// Drop a player's force-pause handle (component unmount).
    pub fn unregister(&self, player: PlayerId) {
        match self.players.lock() {
            Ok(mut players) => {
                players.remove(&player);
            }
            Err(e) => tracing::error!("Mutex poisoned writing player map: {e}"),
        }
    }

    /// Make `player` the single active surface.
    ///
    /// Every other registered player is paused before the new value is
    /// published, so no observer sees two surfaces active at once.
    pub fn activate(&self, player: PlayerId) {
        let others: Vec<Arc<dyn Pausable>> = match self.players.lock() {
            Ok(players) => players
                .iter()
                .filter(|(id, _)| **id != player)
                .map(|(_, handle)| Arc::clone(handle))
                .collect(),
            Err(e) => {
                tracing::error!("Mutex poisoned reading player map: {e}");
                Vec::new()
            }
        };
        // Handles run after the guard drops; a pause() that calls back into
        // the arbiter must not deadlock on the player map.
        for handle in others {
            handle.pause();
        }
        self.active_tx.send_replace(Some(player));
        debug!(player = %player, "player activated");
    }

    /// Pause everything and clear the active player (global stop).
    pub fn clear(&self) {
        let handles: Vec<Arc<dyn Pausable>> = match self.players.lock() {
            Ok(players) => players.values().map(Arc::clone).collect(),
            Err(e) => {
                tracing::error!("Mutex poisoned reading player map: {e}");
                Vec::new()
            }
        };
        for handle in handles {
            handle.pause();
        }
        self.active_tx.send_replace(None);
        debug!("playback cleared");
    }

    pub fn active(&self) -> Option<PlayerId> {
        *self.active_tx.borrow()
    }

    /// Latest-value subscription to the active player. Dropping the receiver
    /// is the unsubscribe.
    pub fn subscribe(&self) -> watch::Receiver<Option<PlayerId>> {
        self.active_tx.subscribe()
    }
}

impl Default for PlaybackArbiter {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
