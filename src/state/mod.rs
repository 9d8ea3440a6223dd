// State management module
//
// This module provides the StateManager, the mutation coordinator for the
// persisted document. It serializes read-modify-write cycles against the
// StateStore and emits change events for interested front ends.

use crate::metrics::Metrics;
use crate::models::PersistedState;
use crate::store::{Result, StateStore};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Change events emitted when a mutation alters the document
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// The public access flag was flipped
    PublicAccessChanged { enabled: bool },

    /// The whitelist gained or lost identities
    WhitelistChanged { len: usize },

    /// The blacklist gained or lost identities
    BlacklistChanged { len: usize },

    /// The enabled module list changed
    ModulesChanged { modules: Vec<String> },

    /// At least one usage counter moved
    StatisticsUpdated {
        total_requests: u64,
        render_success: u64,
        render_failed: u64,
    },
}

/// Mutation coordinator with event emission
///
/// This is the only component that writes the document:
/// - [`mutate()`](Self::mutate) runs load → edit → save inside an exclusive
///   section, so concurrent callers (including other handles on the same
///   file) are applied in a total order and no update is lost
/// - [`snapshot()`](Self::snapshot) reads without the lock; it may miss an
///   in-flight mutation but never observes a torn write
/// - [`subscribe()`](Self::subscribe) listens for [`StateChange`] events
///
/// Cloning is cheap and every clone shares the same store, lock and channel.
/// Construct one at startup and hand clones to every service.
///
/// # Related Types
///
/// - [`crate::store::StateStore`]: Atomic file persistence
/// - [`crate::services::UsageAccounting`]: Counter increments
/// - [`crate::services::ControlService`]: List and flag edits
pub struct StateManager {
    store: Arc<StateStore>,

    /// Guards every read-modify-write cycle
    write_lock: Arc<Mutex<()>>,

    /// Broadcast channel for emitting state change events
    state_tx: broadcast::Sender<StateChange>,

    metrics: Arc<Metrics>,
}

impl StateManager {
    /// Wrap an opened store
    ///
    /// The broadcast channel buffers 100 events per subscriber.
    pub fn new(store: StateStore) -> Self {
        Self::with_metrics(store, Arc::new(Metrics::new()))
    }

    pub fn with_metrics(store: StateStore, metrics: Arc<Metrics>) -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            store: Arc::new(store),
            write_lock: Arc::new(Mutex::new(())),
            state_tx,
            metrics,
        }
    }

    /// Read the current document without taking the mutation lock
    pub fn snapshot(&self) -> Result<PersistedState> {
        self.store.load()
    }

    /// Execute a function with a read-only view of the current document
    ///
    /// # Example
    /// ```ignore
    /// let public = state_manager.read(|state| state.config.public_enabled)?;
    /// ```
    pub fn read<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&PersistedState) -> R,
    {
        let state = self.snapshot()?;
        Ok(f(&state))
    }

    /// Apply `update_fn` to the document and persist the result
    ///
    /// The load, the edit and the save all happen while holding both the
    /// coordinator's lock and the store's file lock. Returns the document
    /// as persisted.
    ///
    /// # Example
    /// ```ignore
    /// state_manager.mutate(|state| {
    ///     state.config.public_enabled = false;
    /// })?;
    /// ```
    pub fn mutate<F>(&self, update_fn: F) -> Result<PersistedState>
    where
        F: FnOnce(&mut PersistedState),
    {
        // The guarded value is (), and the document on disk is only ever
        // replaced whole, so a poisoned lock carries no broken state.
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Other handles on the same file, possibly in other processes,
        // only see the file lock.
        let _file_lock = self.store.lock().inspect_err(|_| {
            self.metrics.record_mutation_failure();
        })?;

        let mut state = self.store.load_locked().inspect_err(|_| {
            self.metrics.record_mutation_failure();
        })?;
        let old_state = state.clone();

        update_fn(&mut state);

        self.store.save(&state).inspect_err(|_| {
            self.metrics.record_mutation_failure();
        })?;
        self.metrics.record_mutation();

        // Sent under the lock so subscribers see events in mutation order
        for change in self.detect_changes(&old_state, &state) {
            if self.state_tx.send(change).is_ok() {
                self.metrics.record_state_broadcast();
            } else {
                self.metrics.record_unobserved_broadcast();
            }
        }

        Ok(state)
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Detect what changed between two documents and generate events
    fn detect_changes(&self, old: &PersistedState, new: &PersistedState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if old.config.public_enabled != new.config.public_enabled {
            changes.push(StateChange::PublicAccessChanged {
                enabled: new.config.public_enabled,
            });
        }

        if old.config.whitelist != new.config.whitelist {
            changes.push(StateChange::WhitelistChanged {
                len: new.config.whitelist.len(),
            });
        }

        if old.config.blacklist != new.config.blacklist {
            changes.push(StateChange::BlacklistChanged {
                len: new.config.blacklist.len(),
            });
        }

        if old.config.enabled_modules != new.config.enabled_modules {
            changes.push(StateChange::ModulesChanged {
                modules: new.config.enabled_modules.clone(),
            });
        }

        if old.stats != new.stats {
            changes.push(StateChange::StatisticsUpdated {
                total_requests: new.stats.total_requests,
                render_success: new.stats.render_success,
                render_failed: new.stats.render_failed,
            });
        }

        changes
    }
}

impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            write_lock: Arc::clone(&self.write_lock),
            state_tx: self.state_tx.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}
