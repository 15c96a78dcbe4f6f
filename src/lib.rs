//! # WebUI State
//!
//! Reactive state layer for WebUI static sites. Page definitions declare
//! state values, the values live in a scoped store (or are addressed by ID
//! through the global registry), and the generator compiles a snapshot of
//! that state into a self-contained client-side script.
//!
//! ```text
//! State<T> / StateProperty → ScopedStateStore / GlobalStateRegistry → codegen → scripts/state-*.js
//! ```
//!
//! The markup layer is not part of this crate. It consumes the binding
//! attributes produced by [`binding`] and references the emitted scripts.

pub mod binding;
pub mod codegen;
pub mod emit;
pub mod property;
pub mod registry;
pub mod state;
pub mod store;
pub mod utils;
pub mod value;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use binding::{ActionDescriptor, BindableElement, BindingProperty, StateAction, StateBinding};
pub use codegen::{
    generate_property_script, generate_registry_js, generate_runtime_js, generate_scope_js,
    generate_store_js,
};
pub use property::{ArrayState, BooleanState, NumberState, ObjectState, StateProperty, StringState};
pub use registry::{GlobalStateRegistry, StateHandle, StaticHandle, StoreHandle};
pub use state::State;
pub use store::{DebugHistoryEntry, ScopedStateStore, SubscriptionToken};
pub use value::{FromStateValue, StateValue};

// ---------------------------------------------------------------------------
// State Scope
// ---------------------------------------------------------------------------

/// Lifecycle and visibility partition for a state value.
///
/// `Component` state is private to one element instance. The other scopes
/// are keyed by name and deduplicated: the same key in the same scope always
/// refers to the same cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateScope {
    Component,
    Shared,
    Global,
    Session,
}

impl StateScope {
    /// Every scope, in export order.
    pub const ALL: [StateScope; 4] = [
        StateScope::Component,
        StateScope::Shared,
        StateScope::Global,
        StateScope::Session,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StateScope::Component => "component",
            StateScope::Shared => "shared",
            StateScope::Global => "global",
            StateScope::Session => "session",
        }
    }

    /// Dense index used for per-scope table arrays.
    pub(crate) fn index(&self) -> usize {
        match self {
            StateScope::Component => 0,
            StateScope::Shared => 1,
            StateScope::Global => 2,
            StateScope::Session => 3,
        }
    }
}

impl fmt::Display for StateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateScope {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StateScope::ALL
            .iter()
            .copied()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| StateError::UnknownScope(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Client-side storage backend used when persistence is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageType {
    #[default]
    Memory,
    LocalStorage,
    SessionStorage,
}

impl StorageType {
    /// The `window` property backing this storage, if any.
    pub fn js_object(&self) -> Option<&'static str> {
        match self {
            StorageType::Memory => None,
            StorageType::LocalStorage => Some("localStorage"),
            StorageType::SessionStorage => Some("sessionStorage"),
        }
    }
}

/// Development server synchronization settings.
///
/// The generated script only opens the socket when the page is served
/// from a loopback host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct DevSyncConfig {
    pub port: u16,
    pub path: String,
    /// Delay before reconnecting after the socket closes.
    pub reconnect_delay_ms: u64,
}

impl Default for DevSyncConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            path: "/__webui/state".to_string(),
            reconnect_delay_ms: 3000,
        }
    }
}

/// Controls script generation and debug history retention.
/// Immutable once handed to a store or a generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct StateConfiguration {
    pub enable_persistence: bool,
    pub storage_type: StorageType,
    pub enable_debugging: bool,
    pub max_debug_history: usize,
    /// Prefix for persisted storage keys.
    pub storage_key_prefix: String,
    pub dev_sync: Option<DevSyncConfig>,
}

impl Default for StateConfiguration {
    fn default() -> Self {
        Self {
            enable_persistence: false,
            storage_type: StorageType::Memory,
            enable_debugging: false,
            max_debug_history: 100,
            storage_key_prefix: "webui-state:".to_string(),
            dev_sync: None,
        }
    }
}

impl StateConfiguration {
    pub fn from_json_str(json: &str) -> Result<Self, StateError> {
        serde_json::from_str(json).map_err(|e| StateError::Config(e.to_string()))
    }

    /// Load a configuration file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, StateError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Whether the generated script writes through to browser storage.
    pub fn persists(&self) -> bool {
        self.enable_persistence && self.storage_type.js_object().is_some()
    }
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// A structured diagnostic emitted while checking markup bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    pub context: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

// ---------------------------------------------------------------------------
// StateError
// ---------------------------------------------------------------------------

/// Errors surfaced by the fallible (`try_*`, file emission) operations.
/// Lookups, updates and generation never fail.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Malformed state payload: {0}")]
    Import(#[source] serde_json::Error),

    #[error("Unknown state scope '{0}'")]
    UnknownScope(String),

    #[error("Invalid action descriptor '{0}'")]
    InvalidAction(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_round_trips_through_str() {
        for scope in StateScope::ALL {
            assert_eq!(scope.as_str().parse::<StateScope>().unwrap(), scope);
        }
        assert!(matches!(
            "page".parse::<StateScope>(),
            Err(StateError::UnknownScope(name)) if name == "page"
        ));
    }

    #[test]
    fn scope_indices_are_dense() {
        let mut seen: Vec<usize> = StateScope::ALL.iter().map(|s| s.index()).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn configuration_defaults_fill_missing_fields() {
        let config = StateConfiguration::from_json_str(
            r#"{ "enablePersistence": true, "storageType": "localStorage" }"#,
        )
        .unwrap();
        assert!(config.enable_persistence);
        assert_eq!(config.storage_type, StorageType::LocalStorage);
        assert_eq!(config.max_debug_history, 100);
        assert!(config.dev_sync.is_none());
        assert!(config.persists());
    }

    #[test]
    fn configuration_rejects_unknown_fields() {
        let err = StateConfiguration::from_json_str(r#"{ "persist": true }"#).unwrap_err();
        assert!(matches!(err, StateError::Config(_)));
    }

    #[test]
    fn memory_storage_never_persists() {
        let config = StateConfiguration {
            enable_persistence: true,
            ..Default::default()
        };
        assert!(!config.persists());
    }

    #[test]
    fn dev_sync_defaults() {
        let config =
            StateConfiguration::from_json_str(r#"{ "devSync": { "port": 4000 } }"#).unwrap();
        let sync = config.dev_sync.unwrap();
        assert_eq!(sync.port, 4000);
        assert_eq!(sync.reconnect_delay_ms, 3000);
    }
}
