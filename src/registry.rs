//! ID-addressed state registry.
//!
//! Maps a state ID to a type-erased [`StateHandle`]. The registry does not
//! own the values behind store-backed handles; it reads them on demand.
//! Construct one per build run and share it by reference.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::store::ScopedStateStore;
use crate::value::StateValue;
use crate::StateScope;

/// Read access to the current value behind a registered state.
pub trait StateHandle: Send + Sync {
    fn current_value(&self) -> StateValue;
}

/// A handle to a fixed value.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticHandle(pub StateValue);

impl StateHandle for StaticHandle {
    fn current_value(&self) -> StateValue {
        self.0.clone()
    }
}

/// A handle reading one (scope, key) cell of a [`ScopedStateStore`].
/// Missing cells read as `null`.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    store: ScopedStateStore,
    scope: StateScope,
    key: String,
}

impl StoreHandle {
    pub fn new(store: &ScopedStateStore, scope: StateScope, key: impl Into<String>) -> Self {
        Self {
            store: store.clone(),
            scope,
            key: key.into(),
        }
    }

    pub fn scope(&self) -> StateScope {
        self.scope
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl StateHandle for StoreHandle {
    fn current_value(&self) -> StateValue {
        self.store
            .get_value(&self.key, self.scope)
            .unwrap_or(StateValue::Null)
    }
}

/// Thread-safe directory of state handles keyed by ID.
pub struct GlobalStateRegistry {
    entries: DashMap<String, Arc<dyn StateHandle>>,
    counter: AtomicU64,
}

impl fmt::Debug for GlobalStateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalStateRegistry")
            .field("ids", &self.all_ids())
            .finish()
    }
}

impl GlobalStateRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            counter: AtomicU64::new(0),
        }
    }

    /// Register a handle and return its ID.
    ///
    /// With an explicit `id`, an existing entry under that ID is replaced
    /// (last writer wins). Without one, a fresh `state_<n>` ID is generated
    /// from a counter that never goes backwards, skipping IDs already
    /// claimed explicitly.
    pub fn register(&self, handle: Arc<dyn StateHandle>, id: Option<&str>) -> String {
        if let Some(id) = id {
            if self.entries.insert(id.to_string(), handle).is_some() {
                tracing::debug!(state_id = id, "replaced registered state");
            }
            return id.to_string();
        }

        loop {
            let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
            let candidate = format!("state_{n}");
            match self.entries.entry(candidate) {
                Entry::Vacant(slot) => {
                    let id = slot.key().clone();
                    slot.insert(Arc::clone(&handle));
                    tracing::trace!(state_id = %id, "registered state");
                    return id;
                }
                Entry::Occupied(_) => continue,
            }
        }
    }

    /// Register a fixed value.
    pub fn register_value(&self, value: impl Into<StateValue>, id: Option<&str>) -> String {
        self.register(Arc::new(StaticHandle(value.into())), id)
    }

    /// Remove an entry. Returns `false` if the ID was not registered.
    pub fn unregister(&self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Snapshot of the registered IDs, sorted.
    pub fn all_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Current value behind `id`.
    pub fn value_of(&self, id: &str) -> Option<StateValue> {
        // Release the shard guard before reading through the handle.
        let handle = self.entries.get(id).map(|r| Arc::clone(r.value()))?;
        Some(handle.current_value())
    }

    /// ID under which this exact handle is registered.
    pub fn state_id_for(&self, handle: &Arc<dyn StateHandle>) -> Option<String> {
        let target = Arc::as_ptr(handle) as *const ();
        let mut ids: Vec<String> = self
            .entries
            .iter()
            .filter(|r| Arc::as_ptr(r.value()) as *const () == target)
            .map(|r| r.key().clone())
            .collect();
        ids.sort();
        ids.into_iter().next()
    }

    /// Current values of every entry, sorted by ID.
    pub fn snapshot(&self) -> BTreeMap<String, StateValue> {
        let handles: Vec<(String, Arc<dyn StateHandle>)> = self
            .entries
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect();
        handles
            .into_iter()
            .map(|(id, handle)| (id, handle.current_value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for GlobalStateRegistry {
    fn default() -> Self {
        Self::new()
    }
}
