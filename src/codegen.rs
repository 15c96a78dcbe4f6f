//! JavaScript generation.
//!
//! Turns state snapshots into client-side script text. Generation is pure
//! string construction: it never touches the store beyond taking a
//! snapshot, and it never fails. Values that cannot be represented degrade
//! to `null` literals.
//!
//! Two output shapes exist:
//! - [`generate_runtime_js`]: a reactive store keyed by state ID with DOM
//!   binding, event wiring, optional persistence and optional dev sync.
//! - [`generate_property_script`]: plain `let` declarations plus mutation
//!   helpers for [`StateProperty`] values.

use std::collections::BTreeMap;

use crate::property::StateProperty;
use crate::registry::GlobalStateRegistry;
use crate::store::ScopedStateStore;
use crate::utils::{js_string_literal, serialize_to_script_literal};
use crate::value::StateValue;
use crate::{DevSyncConfig, StateConfiguration, StateScope};

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

/// Generate the client runtime seeded with `states` (state ID → value).
///
/// When a runtime is already installed on the page (`window.WebUIState`),
/// the script only seeds its IDs into the existing store; IDs the page
/// already defines keep their current value.
pub fn generate_runtime_js(
    states: &BTreeMap<String, StateValue>,
    config: &StateConfiguration,
) -> String {
    let mut body = String::new();
    body.push_str("'use strict';\n");
    body.push_str(&config_js(config));
    body.push_str(&initial_values_js(states));
    body.push_str(ATTACH_EXISTING_JS);
    body.push_str(STORE_JS);
    if config.persists() {
        body.push_str(PERSISTENCE_JS);
    }
    body.push_str(&define_js(config));
    body.push_str(&set_js(config));
    body.push_str(DOM_JS);
    body.push_str(&render_js("get"));
    body.push_str(EVENTS_JS);
    if let Some(sync) = &config.dev_sync {
        body.push_str(&dev_sync_js(sync));
    }
    body.push_str(&init_js(config));

    let mut js = String::from("(function () {\n");
    js.push_str(&indent_block(&body, "  "));
    js.push_str("})();\n");
    js
}

/// Runtime seeded with one scope of `store`. IDs are `<scope>.<key>`.
pub fn generate_scope_js(
    store: &ScopedStateStore,
    scope: StateScope,
    config: &StateConfiguration,
) -> String {
    let mut js = format!("/* webui-state: {} scope */\n", scope);
    js.push_str(&generate_runtime_js(&scoped_ids(store, &[scope]), config));
    js
}

/// Runtime seeded with every scope of `store`.
pub fn generate_store_js(store: &ScopedStateStore, config: &StateConfiguration) -> String {
    let mut js = String::from("/* webui-state: all scopes */\n");
    js.push_str(&generate_runtime_js(
        &scoped_ids(store, &StateScope::ALL),
        config,
    ));
    js
}

/// Runtime seeded with every entry of `registry`, keyed by registry ID.
pub fn generate_registry_js(registry: &GlobalStateRegistry, config: &StateConfiguration) -> String {
    let mut js = String::from("/* webui-state: registry */\n");
    js.push_str(&generate_runtime_js(&registry.snapshot(), config));
    js
}

fn scoped_ids(store: &ScopedStateStore, scopes: &[StateScope]) -> BTreeMap<String, StateValue> {
    scopes
        .iter()
        .flat_map(|scope| {
            store
                .snapshot(*scope)
                .into_iter()
                .map(move |(key, value)| (format!("{}.{}", scope, key), value))
        })
        .collect()
}

fn config_js(config: &StateConfiguration) -> String {
    let storage = config.storage_type.js_object().unwrap_or("memory");
    format!(
        "const __webui_config = Object.freeze({{ debug: {}, persistence: {}, storage: {}, storagePrefix: {} }});\n",
        config.enable_debugging,
        config.persists(),
        js_string_literal(storage),
        js_string_literal(&config.storage_key_prefix)
    )
}

fn initial_values_js(states: &BTreeMap<String, StateValue>) -> String {
    let mut out = String::from("const __webui_initial = Object.create(null);\n");
    for (id, value) in states {
        out.push_str(&format!(
            "__webui_initial[{}] = {};\n",
            js_string_literal(id),
            serialize_to_script_literal(value)
        ));
    }
    out
}

const ATTACH_EXISTING_JS: &str = r#"
if (typeof window !== 'undefined' && window.WebUIState && typeof window.WebUIState.define === 'function') {
  const ids = Object.keys(__webui_initial);
  for (let i = 0; i < ids.length; i++) {
    window.WebUIState.define(ids[i], __webui_initial[ids[i]]);
  }
  return;
}
"#;

const STORE_JS: &str = r#"
const __webui_values = Object.assign(Object.create(null), __webui_initial);
const __webui_subscribers = Object.create(null);
const __webui_change_listeners = [];

function get(id) {
  return __webui_values[id];
}

function subscribe(id, callback) {
  if (typeof callback !== 'function') return function () {};
  const list = __webui_subscribers[id] || (__webui_subscribers[id] = []);
  list.push(callback);
  return function unsubscribe() {
    const index = list.indexOf(callback);
    if (index !== -1) list.splice(index, 1);
  };
}

function __webuiNotify(id, value, previous) {
  const list = __webui_subscribers[id];
  if (!list) return;
  const snapshot = list.slice();
  for (let i = 0; i < snapshot.length; i++) {
    try {
      snapshot[i](value, previous);
    } catch (err) {
      console.error('[webui-state] subscriber for "' + id + '" failed', err);
    }
  }
}
"#;

const PERSISTENCE_JS: &str = r#"
const __webui_storage = (function () {
  try {
    return window[__webui_config.storage] || null;
  } catch (err) {
    return null;
  }
})();

function __webuiStorageKey(id) {
  return __webui_config.storagePrefix + id;
}

function __webuiPersist(id, value) {
  if (!__webui_storage) return;
  try {
    __webui_storage.setItem(__webuiStorageKey(id), JSON.stringify(value));
  } catch (err) {
    console.warn('[webui-state] failed to persist "' + id + '"', err);
  }
}

function __webuiRestore(id) {
  if (!__webui_storage) return;
  try {
    const raw = __webui_storage.getItem(__webuiStorageKey(id));
    if (raw !== null) __webui_values[id] = JSON.parse(raw);
  } catch (err) {
    console.warn('[webui-state] ignoring stored value for "' + id + '"', err);
  }
}

Object.keys(__webui_values).forEach(__webuiRestore);
"#;

fn define_js(config: &StateConfiguration) -> String {
    let mut out = String::from(
        "\nfunction define(id, value) {\n  if (Object.prototype.hasOwnProperty.call(__webui_values, id)) return false;\n  __webui_values[id] = value;\n",
    );
    if config.persists() {
        out.push_str("  __webuiRestore(id);\n");
    }
    out.push_str("  __webuiApplyBindings(id, __webui_values[id]);\n  render();\n  return true;\n}\n");
    out
}

fn set_js(config: &StateConfiguration) -> String {
    let mut out = String::from(
        "\nfunction set(id, value) {\n  const previous = __webui_values[id];\n  __webui_values[id] = value;\n",
    );
    if config.enable_debugging {
        out.push_str("  console.debug('[webui-state]', id, previous, '->', value);\n");
    }
    out.push_str("  __webuiApplyBindings(id, value);\n");
    out.push_str("  __webuiNotify(id, value, previous);\n");
    if config.persists() {
        out.push_str("  __webuiPersist(id, value);\n");
    }
    out.push_str(
        r#"  for (let i = 0; i < __webui_change_listeners.length; i++) {
    try {
      __webui_change_listeners[i](id, value);
    } catch (err) {
      console.error('[webui-state] change listener failed', err);
    }
  }
  render();
}
"#,
    );
    out
}

const DOM_JS: &str = r#"
function __webuiStateId(el) {
  return el.getAttribute('data-webui-state') || el.getAttribute('data-state');
}

function __webuiFormat(value) {
  if (value === null || value === undefined) return '';
  if (typeof value === 'object') return JSON.stringify(value);
  return String(value);
}

function __webuiDefaultProperty(el) {
  if (el.tagName === 'INPUT' && el.type === 'checkbox') return 'checked';
  if (el.tagName === 'INPUT' || el.tagName === 'TEXTAREA' || el.tagName === 'SELECT') return 'value';
  return 'textContent';
}

function __webuiApplyProperty(el, property, value) {
  switch (property) {
    case 'textContent':
      el.textContent = __webuiFormat(value);
      break;
    case 'value': {
      const next = __webuiFormat(value);
      if (el.value !== next) el.value = next;
      break;
    }
    case 'checked':
      el.checked = !!value;
      break;
    case 'disabled':
      el.disabled = !!value;
      break;
    default:
      if (value === null || value === undefined || value === false) {
        el.removeAttribute(property);
      } else {
        el.setAttribute(property, value === true ? '' : __webuiFormat(value));
      }
  }
}

function __webuiApplyBindings(id, value) {
  if (typeof document === 'undefined') return;
  const nodes = document.querySelectorAll('[data-webui-state], [data-state]');
  for (let i = 0; i < nodes.length; i++) {
    const el = nodes[i];
    if (__webuiStateId(el) !== id) continue;
    __webuiApplyProperty(el, el.getAttribute('data-webui-property') || __webuiDefaultProperty(el), value);
  }
}

function __webuiReadInput(el) {
  if (el.type === 'checkbox') return el.checked;
  if (el.type === 'number' || el.type === 'range') {
    const parsed = parseFloat(el.value);
    return isNaN(parsed) ? 0 : parsed;
  }
  return el.value;
}

function __webuiBindInputs(root) {
  const nodes = root.querySelectorAll('input, textarea, select');
  for (let i = 0; i < nodes.length; i++) {
    const el = nodes[i];
    const id = __webuiStateId(el);
    if (!id || el.__webuiBound) continue;
    el.__webuiBound = true;
    const eventName = el.tagName === 'SELECT' || el.type === 'checkbox' || el.type === 'radio' ? 'change' : 'input';
    el.addEventListener(eventName, function () {
      set(id, __webuiReadInput(el));
    });
  }
}
"#;

/// The `render()` refresh routine. `lookup` names the function used to
/// resolve a binding name to its current value.
fn render_js(lookup: &str) -> String {
    format!(
        r#"
function render() {{
  if (typeof document === 'undefined') return;
  const texts = document.querySelectorAll('[data-state-text]');
  for (let i = 0; i < texts.length; i++) {{
    texts[i].textContent = __webuiFormat({lookup}(texts[i].getAttribute('data-state-text')));
  }}
  const shows = document.querySelectorAll('[data-state-show]');
  for (let i = 0; i < shows.length; i++) {{
    shows[i].style.display = {lookup}(shows[i].getAttribute('data-state-show')) ? '' : 'none';
  }}
  const values = document.querySelectorAll('[data-state-value]');
  for (let i = 0; i < values.length; i++) {{
    const next = __webuiFormat({lookup}(values[i].getAttribute('data-state-value')));
    if (values[i].value !== next) values[i].value = next;
  }}
}}
"#
    )
}

const EVENTS_JS: &str = r#"
function __webuiStep(el) {
  const raw = el.getAttribute('data-step');
  const step = raw === null ? 1 : parseFloat(raw);
  return isNaN(step) ? 1 : step;
}

function __webuiDispatch(id, operation, el) {
  switch (operation) {
    case 'toggle':
      set(id, !get(id));
      break;
    case 'increment':
      set(id, (Number(get(id)) || 0) + __webuiStep(el));
      break;
    case 'decrement':
      set(id, (Number(get(id)) || 0) - __webuiStep(el));
      break;
    case 'set': {
      const raw = el.getAttribute('data-value');
      let next = raw;
      try {
        next = JSON.parse(raw);
      } catch (err) {
        next = raw;
      }
      set(id, next);
      break;
    }
    default:
      console.warn('[webui-state] unknown operation "' + operation + '" for "' + id + '"');
  }
}

function __webuiWireEvents(root) {
  const nodes = root.querySelectorAll('*');
  for (let i = 0; i < nodes.length; i++) {
    const el = nodes[i];
    if (el.__webuiWired) continue;
    const attrs = el.attributes;
    for (let j = 0; j < attrs.length; j++) {
      const name = attrs[j].name;
      if (name.indexOf('data-on') !== 0 || name.length <= 7) continue;
      const descriptor = attrs[j].value;
      const split = descriptor.lastIndexOf('.');
      if (split <= 0) continue;
      const id = descriptor.slice(0, split);
      const operation = descriptor.slice(split + 1);
      el.addEventListener(name.slice(7), function () {
        __webuiDispatch(id, operation, el);
      });
      el.__webuiWired = true;
    }
  }
}
"#;

fn dev_sync_js(sync: &DevSyncConfig) -> String {
    format!(
        r#"
const __webui_loopback_hosts = ['localhost', '127.0.0.1', '[::1]', '::1'];
let __webui_socket = null;
let __webui_remote_update = false;

function __webuiApplyRemote(id, value) {{
  __webui_remote_update = true;
  try {{
    set(id, value);
  }} finally {{
    __webui_remote_update = false;
  }}
}}

function __webuiConnectDevSync() {{
  if (typeof window === 'undefined' || typeof WebSocket === 'undefined') return;
  if (__webui_loopback_hosts.indexOf(window.location.hostname) === -1) return;
  let socket;
  try {{
    socket = new WebSocket('ws://' + window.location.hostname + ':{port}' + {path});
  }} catch (err) {{
    return;
  }}
  __webui_socket = socket;
  socket.onmessage = function (event) {{
    let message;
    try {{
      message = JSON.parse(event.data);
    }} catch (err) {{
      return;
    }}
    if (!message || typeof message !== 'object') return;
    if (message.type === 'reload') {{
      window.location.reload();
      return;
    }}
    if (message.type === 'stateUpdate' && typeof message.stateId === 'string') {{
      __webuiApplyRemote(message.stateId, message.value);
    }} else if (message.type === 'state-update' && typeof message.scope === 'string' && typeof message.key === 'string') {{
      __webuiApplyRemote(message.scope + '.' + message.key, message.value);
    }}
  }};
  socket.onerror = function () {{}};
  socket.onclose = function () {{
    __webui_socket = null;
    setTimeout(__webuiConnectDevSync, {delay});
  }};
}}

__webui_change_listeners.push(function (id, value) {{
  if (__webui_remote_update || !__webui_socket || __webui_socket.readyState !== 1) return;
  try {{
    __webui_socket.send(JSON.stringify({{ type: 'stateUpdate', stateId: id, value: value }}));
  }} catch (err) {{}}
}});
"#,
        port = sync.port,
        path = js_string_literal(&sync.path),
        delay = sync.reconnect_delay_ms
    )
}

fn init_js(config: &StateConfiguration) -> String {
    let mut out = String::from(
        r#"
function __webuiInit() {
  __webuiBindInputs(document);
  __webuiWireEvents(document);
  const ids = Object.keys(__webui_values);
  for (let i = 0; i < ids.length; i++) {
    __webuiApplyBindings(ids[i], __webui_values[ids[i]]);
  }
  render();
"#,
    );
    if config.dev_sync.is_some() {
        out.push_str("  __webuiConnectDevSync();\n");
    }
    out.push_str(
        r#"}

if (typeof window !== 'undefined') {
  window.WebUIState = Object.freeze({
    get: get,
    set: set,
    define: define,
    subscribe: subscribe,
    render: render,
    keys: function () {
      return Object.keys(__webui_values);
    }
  });
}

if (typeof document !== 'undefined') {
  if (document.readyState === 'loading') {
    document.addEventListener('DOMContentLoaded', __webuiInit);
  } else {
    __webuiInit();
  }
}
"#,
    );
    out
}

// ---------------------------------------------------------------------------
// Property Scripts
// ---------------------------------------------------------------------------

/// Generate declarations, helpers and a shared `render()` for properties.
///
/// The result is a classic (non-module) script: helpers are global so
/// inline handlers such as `onclick="toggleIsVisible()"` can reach them.
pub fn generate_property_script(props: &[&dyn StateProperty]) -> String {
    let mut js = String::new();
    for prop in props {
        js.push_str(&prop.declaration());
        js.push('\n');
    }
    js.push('\n');
    for prop in props {
        js.push_str(&prop.helpers());
        js.push('\n');
    }

    js.push_str("\nvar __webui_props = __webui_props || {};\n");
    for prop in props {
        js.push_str(&format!(
            "Object.defineProperty(__webui_props, {}, {{ get: function () {{ return {}; }}, enumerable: true, configurable: true }});\n",
            js_string_literal(prop.name()),
            prop.name()
        ));
    }
    js.push_str(PROPERTY_SUPPORT_JS);
    js.push_str(&render_js("__webuiLookup"));
    js.push_str(
        r#"
if (typeof document !== 'undefined') {
  if (document.readyState === 'loading') {
    document.addEventListener('DOMContentLoaded', render);
  } else {
    render();
  }
}
"#,
    );
    js
}

const PROPERTY_SUPPORT_JS: &str = r#"
function __webuiLookup(name) {
  return Object.prototype.hasOwnProperty.call(__webui_props, name) ? __webui_props[name] : undefined;
}

function __webuiFormat(value) {
  if (value === null || value === undefined) return '';
  if (typeof value === 'object') return JSON.stringify(value);
  return String(value);
}
"#;

fn indent_block(text: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for line in text.lines() {
        if !line.is_empty() {
            out.push_str(prefix);
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}
