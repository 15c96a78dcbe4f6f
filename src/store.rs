//! Thread-safe scoped state storage.
//!
//! One table per [`StateScope`], each mapping a key to a state cell plus the
//! subscribers registered for that key. All tables sit behind a single
//! mutex, so every operation is atomic with respect to every other
//! operation on the same store. Callbacks run after the lock is released.
//!
//! Updates also pass through a per-store notification gate held from
//! before the write until the last callback returns, so subscribers see
//! updates in the order they were applied. Updates issued from inside a
//! callback on the same thread bypass the gate and notify inline.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::value::{FromStateValue, StateValue};
use crate::{StateConfiguration, StateError, StateScope};

/// Callback invoked with the new value after an update.
pub type Subscriber = Arc<dyn Fn(&StateValue) + Send + Sync>;

/// Identifies one subscription within its (scope, key) bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

/// One recorded mutation. `old_value` is `None` for the initial registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugHistoryEntry {
    pub key: String,
    pub scope: StateScope,
    pub old_value: Option<StateValue>,
    pub new_value: StateValue,
    pub timestamp: DateTime<Utc>,
}

struct StateCell {
    value: StateValue,
    on_change: Option<Subscriber>,
}

#[derive(Default)]
struct ScopeTable {
    cells: HashMap<String, StateCell>,
    subscribers: HashMap<String, Vec<(SubscriptionToken, Subscriber)>>,
}

#[derive(Default)]
struct StoreInner {
    /// Indexed by `StateScope::index`.
    tables: [ScopeTable; 4],
    history: VecDeque<DebugHistoryEntry>,
    next_token: u64,
    next_component: u64,
}

impl StoreInner {
    fn table(&self, scope: StateScope) -> &ScopeTable {
        &self.tables[scope.index()]
    }

    fn table_mut(&mut self, scope: StateScope) -> &mut ScopeTable {
        &mut self.tables[scope.index()]
    }

    fn record(&mut self, entry: DebugHistoryEntry, cap: usize) {
        if cap == 0 {
            return;
        }
        self.history.push_back(entry);
        while self.history.len() > cap {
            self.history.pop_front();
        }
    }
}

thread_local! {
    /// Gates (by address) whose callbacks are running on this thread.
    static NOTIFYING: RefCell<Vec<usize>> = RefCell::new(Vec::new());
}

/// Held for the duration of one update: write plus notifications.
struct NotifyGuard<'a> {
    gate: usize,
    _lock: Option<MutexGuard<'a, ()>>,
}

impl Drop for NotifyGuard<'_> {
    fn drop(&mut self) {
        NOTIFYING.with(|active| {
            let mut active = active.borrow_mut();
            if let Some(pos) = active.iter().rposition(|g| *g == self.gate) {
                active.remove(pos);
            }
        });
    }
}

/// Concurrency-safe key/value store partitioned by scope.
///
/// Cloning is cheap and yields another handle to the same tables.
#[derive(Clone)]
pub struct ScopedStateStore {
    inner: Arc<Mutex<StoreInner>>,
    notify_gate: Arc<Mutex<()>>,
    config: Arc<StateConfiguration>,
}

impl fmt::Debug for ScopedStateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedStateStore")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish()
    }
}

impl ScopedStateStore {
    /// Create an empty store with the default configuration.
    pub fn new() -> Self {
        Self::with_config(StateConfiguration::default())
    }

    pub fn with_config(config: StateConfiguration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner::default())),
            notify_gate: Arc::new(Mutex::new(())),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &StateConfiguration {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().expect("state store poisoned")
    }

    /// Enter the notification gate, unless this thread is already inside
    /// a callback of this store.
    fn enter_gate(&self) -> NotifyGuard<'_> {
        let gate = Arc::as_ptr(&self.notify_gate) as usize;
        let nested = NOTIFYING.with(|active| active.borrow().contains(&gate));
        let lock = if nested {
            None
        } else {
            Some(self.notify_gate.lock().expect("state notify gate poisoned"))
        };
        NOTIFYING.with(|active| active.borrow_mut().push(gate));
        NotifyGuard { gate, _lock: lock }
    }

    /// Register a key with its initial value.
    ///
    /// First writer wins: if the key already exists in `scope` the call is a
    /// no-op and returns `false`.
    pub fn register(
        &self,
        key: impl Into<String>,
        scope: StateScope,
        initial: impl Into<StateValue>,
    ) -> bool {
        self.insert_cell(key.into(), scope, initial.into(), None)
    }

    /// Like [`register`](Self::register), attaching a per-cell change callback
    /// that runs before subscribers on every update.
    pub fn register_with_on_change<F>(
        &self,
        key: impl Into<String>,
        scope: StateScope,
        initial: impl Into<StateValue>,
        on_change: F,
    ) -> bool
    where
        F: Fn(&StateValue) + Send + Sync + 'static,
    {
        self.insert_cell(key.into(), scope, initial.into(), Some(Arc::new(on_change)))
    }

    fn insert_cell(
        &self,
        key: String,
        scope: StateScope,
        initial: StateValue,
        on_change: Option<Subscriber>,
    ) -> bool {
        let cap = self.config.max_debug_history;
        let mut inner = self.lock();
        if inner.table(scope).cells.contains_key(&key) {
            tracing::trace!(%scope, key = %key, "state already registered, keeping first value");
            return false;
        }
        inner.table_mut(scope).cells.insert(
            key.clone(),
            StateCell {
                value: initial.clone(),
                on_change,
            },
        );
        inner.record(
            DebugHistoryEntry {
                key: key.clone(),
                scope,
                old_value: None,
                new_value: initial,
                timestamp: Utc::now(),
            },
            cap,
        );
        tracing::debug!(%scope, key = %key, "registered state");
        true
    }

    /// Typed read. Missing keys and shape mismatches both return `None`.
    pub fn get<T: FromStateValue>(&self, key: &str, scope: StateScope) -> Option<T> {
        self.get_value(key, scope).and_then(|value| value.get::<T>())
    }

    pub fn get_value(&self, key: &str, scope: StateScope) -> Option<StateValue> {
        let inner = self.lock();
        inner.table(scope).cells.get(key).map(|cell| cell.value.clone())
    }

    pub fn contains(&self, key: &str, scope: StateScope) -> bool {
        self.lock().table(scope).cells.contains_key(key)
    }

    /// Replace a value, creating the cell if needed, then notify the cell's
    /// change callback and every subscriber of (scope, key).
    ///
    /// A panicking callback is logged and skipped; the update itself and the
    /// remaining callbacks are unaffected. Racing updates to the store are
    /// notified in write order; a callback must not block on another thread
    /// that updates the same store.
    pub fn update(&self, key: impl Into<String>, scope: StateScope, value: impl Into<StateValue>) {
        let key = key.into();
        let value = value.into();
        let cap = self.config.max_debug_history;
        let _gate = self.enter_gate();

        let callbacks: Vec<Subscriber> = {
            let mut inner = self.lock();
            let table = inner.table_mut(scope);
            let (old_value, on_change) = match table.cells.get_mut(&key) {
                Some(cell) => {
                    let old = std::mem::replace(&mut cell.value, value.clone());
                    (Some(old), cell.on_change.clone())
                }
                None => {
                    table.cells.insert(
                        key.clone(),
                        StateCell {
                            value: value.clone(),
                            on_change: None,
                        },
                    );
                    (None, None)
                }
            };
            let mut callbacks: Vec<Subscriber> = on_change.into_iter().collect();
            if let Some(subscribers) = table.subscribers.get(&key) {
                callbacks.extend(subscribers.iter().map(|(_, cb)| Arc::clone(cb)));
            }
            inner.record(
                DebugHistoryEntry {
                    key: key.clone(),
                    scope,
                    old_value,
                    new_value: value.clone(),
                    timestamp: Utc::now(),
                },
                cap,
            );
            callbacks
        };

        tracing::debug!(%scope, key = %key, subscribers = callbacks.len(), "updated state");
        notify(&callbacks, &value, &key, scope);
    }

    /// Register a callback for updates to (scope, key).
    pub fn subscribe<F>(&self, key: impl Into<String>, scope: StateScope, callback: F) -> SubscriptionToken
    where
        F: Fn(&StateValue) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        inner.next_token += 1;
        let token = SubscriptionToken(inner.next_token);
        inner
            .table_mut(scope)
            .subscribers
            .entry(key.into())
            .or_default()
            .push((token, Arc::new(callback)));
        token
    }

    /// Remove a subscription. Returns `false` if the token was not found.
    pub fn unsubscribe(&self, key: &str, scope: StateScope, token: SubscriptionToken) -> bool {
        let mut inner = self.lock();
        let subscribers = &mut inner.table_mut(scope).subscribers;
        let Some(bucket) = subscribers.get_mut(key) else {
            return false;
        };
        let before = bucket.len();
        bucket.retain(|(t, _)| *t != token);
        let removed = bucket.len() != before;
        if bucket.is_empty() {
            subscribers.remove(key);
        }
        removed
    }

    /// Empty the value and subscriber tables of one scope.
    pub fn clear_scope(&self, scope: StateScope) {
        let mut inner = self.lock();
        *inner.table_mut(scope) = ScopeTable::default();
        tracing::debug!(%scope, "cleared scope");
    }

    /// Sorted keys of one scope.
    pub fn keys(&self, scope: StateScope) -> Vec<String> {
        let inner = self.lock();
        let mut keys: Vec<String> = inner.table(scope).cells.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Point-in-time copy of one scope's values.
    pub fn snapshot(&self, scope: StateScope) -> BTreeMap<String, StateValue> {
        let inner = self.lock();
        inner
            .table(scope)
            .cells
            .iter()
            .map(|(k, cell)| (k.clone(), cell.value.clone()))
            .collect()
    }

    /// Total number of cells across all scopes.
    pub fn len(&self) -> usize {
        let inner = self.lock();
        inner.tables.iter().map(|t| t.cells.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocate a key for a component-scoped cell. Component state is not
    /// deduplicated, so every instance gets its own `<key>-<n>`.
    pub fn next_component_key(&self, key: &str) -> String {
        let mut inner = self.lock();
        inner.next_component += 1;
        format!("{}-{}", key, inner.next_component)
    }

    // -----------------------------------------------------------------------
    // Export / Import
    // -----------------------------------------------------------------------

    /// Export every scope as `{ "<scope>": { "<key>": <value> } }`.
    pub fn export_json(&self) -> String {
        self.export_scopes_json(&StateScope::ALL)
    }

    /// Export the requested scopes. Keys are sorted, so equal stores
    /// export identical text.
    pub fn export_scopes_json(&self, scopes: &[StateScope]) -> String {
        let document: BTreeMap<&'static str, BTreeMap<String, StateValue>> = {
            let inner = self.lock();
            scopes
                .iter()
                .map(|scope| {
                    let entries = inner
                        .table(*scope)
                        .cells
                        .iter()
                        .map(|(k, cell)| (k.clone(), cell.value.clone()))
                        .collect();
                    (scope.as_str(), entries)
                })
                .collect()
        };
        serde_json::to_string(&document).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "state export failed");
            "{}".to_string()
        })
    }

    /// Replace the tables of every scope present in `json`.
    ///
    /// The whole payload is validated before anything is applied; an error
    /// leaves the store untouched. Existing change callbacks and subscribers
    /// are kept for keys that survive the import.
    pub fn try_import_json(&self, json: &str) -> Result<(), StateError> {
        let document: BTreeMap<StateScope, BTreeMap<String, StateValue>> =
            serde_json::from_str(json).map_err(StateError::Import)?;

        let mut inner = self.lock();
        for (scope, entries) in document {
            let table = inner.table_mut(scope);
            let mut previous = std::mem::take(&mut table.cells);
            table.cells = entries
                .into_iter()
                .map(|(key, value)| {
                    let on_change = previous.remove(&key).and_then(|cell| cell.on_change);
                    (key, StateCell { value, on_change })
                })
                .collect();
            tracing::debug!(%scope, keys = table.cells.len(), "imported scope");
        }
        Ok(())
    }

    /// Lenient import: a malformed payload is logged and ignored.
    pub fn import_json(&self, json: &str) {
        if let Err(err) = self.try_import_json(json) {
            tracing::warn!(error = %err, "ignoring malformed state import");
        }
    }

    // -----------------------------------------------------------------------
    // Debug History
    // -----------------------------------------------------------------------

    /// Recorded mutations, oldest first, capped at `max_debug_history`.
    pub fn debug_history(&self) -> Vec<DebugHistoryEntry> {
        self.lock().history.iter().cloned().collect()
    }

    pub fn clear_debug_history(&self) {
        self.lock().history.clear();
    }
}

impl Default for ScopedStateStore {
    fn default() -> Self {
        Self::new()
    }
}

fn notify(callbacks: &[Subscriber], value: &StateValue, key: &str, scope: StateScope) {
    for callback in callbacks {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(value)));
        if outcome.is_err() {
            tracing::warn!(%scope, key = %key, "state subscriber panicked");
        }
    }
}
