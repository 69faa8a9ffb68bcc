// vim: tw=80
//! The process-wide map from mock ids to their state.

use lazy_static::lazy_static;
use std::{
    collections::HashMap,
    mem,
    sync::{Arc, Mutex}
};
use tracing::debug;

use crate::{MockId, lock, state::MockState};

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
}

/// The registry that every mock uses.
pub fn global() -> &'static Registry {
    &REGISTRY
}

/// Owns the [`MockState`] of every mock that has been used and not yet
/// disposed of.
///
/// Lookups, creation and disposal are all atomic with respect to each other.
#[derive(Default)]
pub struct Registry {
    states: Mutex<HashMap<MockId, Arc<MockState>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove the state of one mock.
    ///
    /// Returns `true` if there was any.  The next use of the mock starts over
    /// with an empty state.
    pub fn dispose(&self, id: MockId) -> bool {
        let removed = lock(&self.states).remove(&id);
        debug!(mock = %id, disposed = removed.is_some(), "dispose");
        // The state, along with any callbacks it owns, is dropped here, after
        // the registry lock has been released.
        removed.is_some()
    }

    /// Remove the state of every mock.
    pub fn dispose_all(&self) {
        let states = mem::take(&mut *lock(&self.states));
        debug!(count = states.len(), "dispose_all");
        drop(states);
    }

    /// Look up a mock's state without creating it.
    pub fn get(&self, id: MockId) -> Option<Arc<MockState>> {
        lock(&self.states).get(&id).cloned()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.states).is_empty()
    }

    pub fn len(&self) -> usize {
        lock(&self.states).len()
    }

    /// The state of `id`, created empty on first use.
    pub fn state_for(&self, id: MockId) -> Arc<MockState> {
        lock(&self.states)
            .entry(id)
            .or_insert_with(|| {
                debug!(mock = %id, "new mock state");
                Arc::new(MockState::new(id))
            }).clone()
    }
}
