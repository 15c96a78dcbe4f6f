//! Typed state declarations backed by a [`ScopedStateStore`].
//!
//! A [`State<T>`] is built against an explicit store reference and registers
//! itself on construction. Reads and writes go through the store, so two
//! declarations with the same (scope, key) share one cell.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::registry::{GlobalStateRegistry, StateHandle, StoreHandle};
use crate::store::{ScopedStateStore, SubscriptionToken};
use crate::value::{FromStateValue, StateValue};
use crate::StateScope;

pub struct State<T> {
    store: ScopedStateStore,
    scope: StateScope,
    key: String,
    initial: StateValue,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            scope: self.scope,
            key: self.key.clone(),
            initial: self.initial.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("scope", &self.scope)
            .field("key", &self.key)
            .finish()
    }
}

impl<T> State<T>
where
    T: FromStateValue + Into<StateValue>,
{
    /// Declare a state and register it in `store`.
    ///
    /// Component-scoped declarations receive a unique key per instance;
    /// every other scope shares the cell for `key`, and the first
    /// registered initial value wins.
    pub fn new(store: &ScopedStateStore, scope: StateScope, key: &str, initial: T) -> Self {
        let key = match scope {
            StateScope::Component => store.next_component_key(key),
            _ => key.to_string(),
        };
        let initial = initial.into();
        store.register(key.clone(), scope, initial.clone());
        Self {
            store: store.clone(),
            scope,
            key,
            initial,
            _marker: PhantomData,
        }
    }

    pub fn component(store: &ScopedStateStore, key: &str, initial: T) -> Self {
        Self::new(store, StateScope::Component, key, initial)
    }

    pub fn shared(store: &ScopedStateStore, key: &str, initial: T) -> Self {
        Self::new(store, StateScope::Shared, key, initial)
    }

    pub fn global(store: &ScopedStateStore, key: &str, initial: T) -> Self {
        Self::new(store, StateScope::Global, key, initial)
    }

    pub fn session(store: &ScopedStateStore, key: &str, initial: T) -> Self {
        Self::new(store, StateScope::Session, key, initial)
    }

    /// Current value, or `None` if the cell was cleared or holds another
    /// shape.
    pub fn get(&self) -> Option<T> {
        self.store.get(&self.key, self.scope)
    }

    /// Current value, falling back to this declaration's initial value.
    pub fn value(&self) -> Option<T> {
        self.get().or_else(|| self.initial.get())
    }

    pub fn set(&self, value: T) {
        self.store.update(self.key.clone(), self.scope, value);
    }

    /// Subscribe to typed updates. Updates of another shape are skipped.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionToken
    where
        F: Fn(T) + Send + Sync + 'static,
        T: 'static,
    {
        self.store
            .subscribe(self.key.clone(), self.scope, move |value: &StateValue| {
                if let Some(typed) = value.get::<T>() {
                    callback(typed);
                }
            })
    }

    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.store.unsubscribe(&self.key, self.scope, token)
    }
}

impl<T> State<T> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn scope(&self) -> StateScope {
        self.scope
    }

    /// Client-side ID: `<scope>.<key>`.
    pub fn state_id(&self) -> String {
        format!("{}.{}", self.scope, self.key)
    }

    pub fn handle(&self) -> StoreHandle {
        StoreHandle::new(&self.store, self.scope, self.key.clone())
    }

    /// Register this state in `registry` under [`state_id`](Self::state_id).
    pub fn register_in(&self, registry: &GlobalStateRegistry) -> String {
        let id = self.state_id();
        registry.register(Arc::new(self.handle()), Some(&id))
    }
}

impl<T> StateHandle for State<T> {
    fn current_value(&self) -> StateValue {
        self.store
            .get_value(&self.key, self.scope)
            .unwrap_or(StateValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn declarations_share_cells() {
        let store = ScopedStateStore::new();
        let a = State::global(&store, "count", 1i64);
        let b = State::global(&store, "count", 99i64);
        assert_eq!(b.get(), Some(1));
        a.set(5);
        assert_eq!(b.get(), Some(5));
    }

    #[test]
    fn component_states_are_independent() {
        let store = ScopedStateStore::new();
        let a = State::component(&store, "open", false);
        let b = State::component(&store, "open", true);
        assert_ne!(a.key(), b.key());
        a.set(true);
        b.set(false);
        assert_eq!(a.get(), Some(true));
        assert_eq!(b.get(), Some(false));
    }

    #[test]
    fn value_falls_back_to_initial_after_clear() {
        let store = ScopedStateStore::new();
        let title = State::session(&store, "title", "Draft".to_string());
        store.clear_scope(StateScope::Session);
        assert_eq!(title.get(), None);
        assert_eq!(title.value(), Some("Draft".to_string()));
    }

    #[test]
    fn typed_subscription() {
        let store = ScopedStateStore::new();
        let flag = State::shared(&store, "flag", false);
        let seen = Arc::new(AtomicBool::new(false));
        let seen_clone = Arc::clone(&seen);
        flag.subscribe(move |value| seen_clone.store(value, Ordering::SeqCst));
        flag.set(true);
        assert!(seen.load(Ordering::SeqCst));
    }

    #[test]
    fn registry_binding_uses_state_id() {
        let store = ScopedStateStore::new();
        let registry = GlobalStateRegistry::new();
        let count = State::global(&store, "count", 3i64);
        let id = count.register_in(&registry);
        assert_eq!(id, "global.count");
        count.set(4);
        assert_eq!(registry.value_of(&id), Some(StateValue::Int(4)));
    }
}
