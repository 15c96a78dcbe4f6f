//! Markup/state binding boundary.
//!
//! The markup layer owns HTML structure. This module only hands it
//! attribute name/value pairs, action descriptors for `data-on<event>`
//! attributes, and inline `<script>` bodies.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::registry::GlobalStateRegistry;
use crate::utils::{escape_script_close, js_string_literal, serialize_to_script_literal};
use crate::value::StateValue;
use crate::{Diagnostic, DiagnosticLevel, StateError, StateScope};

pub const STATE_ATTR: &str = "data-webui-state";
pub const PROPERTY_ATTR: &str = "data-webui-property";
pub const TEXT_ATTR: &str = "data-state-text";
pub const SHOW_ATTR: &str = "data-state-show";
pub const VALUE_ATTR: &str = "data-state-value";

// ---------------------------------------------------------------------------
// Property bindings
// ---------------------------------------------------------------------------

/// Element property kept in sync with a state ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingProperty {
    Text,
    Value,
    Checked,
    Disabled,
    Attribute(String),
}

impl BindingProperty {
    pub fn as_str(&self) -> &str {
        match self {
            BindingProperty::Text => "textContent",
            BindingProperty::Value => "value",
            BindingProperty::Checked => "checked",
            BindingProperty::Disabled => "disabled",
            BindingProperty::Attribute(name) => name,
        }
    }
}

/// Association between an element property and a state ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateBinding {
    pub state_id: String,
    pub property: BindingProperty,
}

impl StateBinding {
    pub fn new(state_id: impl Into<String>, property: BindingProperty) -> Self {
        Self {
            state_id: state_id.into(),
            property,
        }
    }

    pub fn text(state_id: impl Into<String>) -> Self {
        Self::new(state_id, BindingProperty::Text)
    }

    pub fn value(state_id: impl Into<String>) -> Self {
        Self::new(state_id, BindingProperty::Value)
    }

    pub fn checked(state_id: impl Into<String>) -> Self {
        Self::new(state_id, BindingProperty::Checked)
    }

    pub fn attributes(&self) -> Vec<(String, String)> {
        vec![
            (STATE_ATTR.to_string(), self.state_id.clone()),
            (PROPERTY_ATTR.to_string(), self.property.as_str().to_string()),
        ]
    }
}

/// `data-state-text` binding re-evaluated by `render()`.
pub fn text_binding(name: &str) -> (String, String) {
    (TEXT_ATTR.to_string(), name.to_string())
}

/// `data-state-show` binding: the element is hidden while the value is falsy.
pub fn show_binding(name: &str) -> (String, String) {
    (SHOW_ATTR.to_string(), name.to_string())
}

pub fn value_binding(name: &str) -> (String, String) {
    (VALUE_ATTR.to_string(), name.to_string())
}

// ---------------------------------------------------------------------------
// Elements
// ---------------------------------------------------------------------------

/// A markup element that accepts extra attributes.
pub trait BindableElement: Sized {
    fn with_attribute(self, name: &str, value: &str) -> Self;
}

/// Decorate `element` with the attributes of `binding`.
pub fn bind_to_state<E: BindableElement>(element: E, binding: &StateBinding) -> E {
    binding
        .attributes()
        .iter()
        .fold(element, |el, (name, value)| el.with_attribute(name, value))
}

/// Decorate `element` with a `data-on<event>` action.
pub fn bind_action<E: BindableElement>(element: E, event: &str, action: &ActionDescriptor) -> E {
    action
        .attributes(event)
        .iter()
        .fold(element, |el, (name, value)| el.with_attribute(name, value))
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Mutation triggered by a DOM event.
#[derive(Debug, Clone, PartialEq)]
pub enum StateAction {
    Toggle,
    Increment,
    Decrement,
    Set(StateValue),
}

impl StateAction {
    pub fn operation(&self) -> &'static str {
        match self {
            StateAction::Toggle => "toggle",
            StateAction::Increment => "increment",
            StateAction::Decrement => "decrement",
            StateAction::Set(_) => "set",
        }
    }
}

/// `scope.key.operation` triple carried by `data-on<event>` attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDescriptor {
    pub scope: StateScope,
    pub key: String,
    pub action: StateAction,
}

impl ActionDescriptor {
    pub fn new(scope: StateScope, key: impl Into<String>, action: StateAction) -> Self {
        Self {
            scope,
            key: key.into(),
            action,
        }
    }

    /// The state ID the runtime resolves this action against.
    pub fn state_id(&self) -> String {
        format!("{}.{}", self.scope, self.key)
    }

    /// Parse `scope.key.operation`. The key may itself contain dots.
    /// `set` parses without a value; its value travels in `data-value`.
    pub fn parse(descriptor: &str) -> Result<Self, StateError> {
        let invalid = || StateError::InvalidAction(descriptor.to_string());
        let (scope, rest) = descriptor.split_once('.').ok_or_else(invalid)?;
        let (key, operation) = rest.rsplit_once('.').ok_or_else(invalid)?;
        if key.is_empty() {
            return Err(invalid());
        }
        let scope = StateScope::from_str(scope)?;
        let action = match operation {
            "toggle" => StateAction::Toggle,
            "increment" => StateAction::Increment,
            "decrement" => StateAction::Decrement,
            "set" => StateAction::Set(StateValue::Null),
            _ => return Err(invalid()),
        };
        Ok(Self::new(scope, key, action))
    }

    /// Attributes for `event` (e.g. `click` → `data-onclick`).
    pub fn attributes(&self, event: &str) -> Vec<(String, String)> {
        let mut attrs = vec![(format!("data-on{}", event), self.to_string())];
        if let StateAction::Set(value) = &self.action {
            attrs.push(("data-value".to_string(), value.to_json().to_string()));
        }
        attrs
    }
}

impl fmt::Display for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.scope, self.key, self.action.operation())
    }
}

impl FromStr for ActionDescriptor {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Inline scripts
// ---------------------------------------------------------------------------

/// Wrap a script body in `<script>` tags, neutralising embedded closers.
pub fn inline_script(body: &str) -> String {
    format!("<script>{}</script>", escape_script_close(body))
}

/// Inline click wiring for one element, for pages that ship without the
/// full runtime's event scan. Requires `window.WebUIState`.
pub fn click_handler_script(element_id: &str, action: &ActionDescriptor) -> String {
    let id = js_string_literal(&action.state_id());
    let mutation = match &action.action {
        StateAction::Toggle => format!("s.set({id}, !s.get({id}));"),
        StateAction::Increment => format!("s.set({id}, (Number(s.get({id})) || 0) + 1);"),
        StateAction::Decrement => format!("s.set({id}, (Number(s.get({id})) || 0) - 1);"),
        StateAction::Set(value) => {
            format!("s.set({id}, {});", serialize_to_script_literal(value))
        }
    };
    let body = format!(
        "(function () {{ var el = document.getElementById({}); if (!el) return; el.addEventListener('click', function () {{ var s = window.WebUIState; if (!s) return; {} }}); }})();",
        js_string_literal(element_id),
        mutation
    );
    inline_script(&body)
}

// ---------------------------------------------------------------------------
// Snapshot access for server-side rendering
// ---------------------------------------------------------------------------

/// Current value for the initial server-rendered markup.
pub fn current_snapshot(registry: &GlobalStateRegistry, state_id: &str) -> Option<StateValue> {
    registry.value_of(state_id)
}

/// Plain-text rendering of the current value, matching what the runtime
/// writes into `textContent`.
pub fn snapshot_text(registry: &GlobalStateRegistry, state_id: &str) -> String {
    match current_snapshot(registry, state_id) {
        None | Some(StateValue::Null) => String::new(),
        Some(StateValue::String(s)) => s,
        Some(StateValue::Float(f)) => crate::utils::js_number(f),
        Some(other) => other.to_json().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Markup validation
// ---------------------------------------------------------------------------

fn state_attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"data-(?:webui-state|state)=(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#)
            .expect("state attribute pattern is valid")
    })
}

/// State IDs referenced by `data-webui-state` / `data-state` attributes.
pub fn referenced_state_ids(html: &str) -> BTreeSet<String> {
    state_attr_regex()
        .captures_iter(html)
        .filter_map(|cap| cap.get(1).or(cap.get(2)).or(cap.get(3)))
        .map(|m| m.as_str().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

fn action_attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"data-on([a-z]+)=(?:"([^"]*)"|'([^']*)')"#)
            .expect("action attribute pattern is valid")
    })
}

/// Check the state references in `html` against `registry`.
///
/// Unregistered `data-webui-state` IDs and malformed `data-on<event>`
/// descriptors are errors. A well-formed action targeting an unregistered
/// ID is a warning: the runtime creates the ID on first write.
pub fn validate_bindings(html: &str, registry: &GlobalStateRegistry) -> Result<(), Vec<Diagnostic>> {
    let mut diagnostics: Vec<Diagnostic> = referenced_state_ids(html)
        .into_iter()
        .filter(|id| !registry.contains(id))
        .map(|id| Diagnostic {
            level: DiagnosticLevel::Error,
            message: format!("Unregistered state ID '{}'", id),
            context: Some(format!("Referenced by a {} attribute", STATE_ATTR)),
        })
        .collect();

    for cap in action_attr_regex().captures_iter(html) {
        let event = &cap[1];
        let Some(raw) = cap.get(2).or(cap.get(3)).map(|m| m.as_str()) else {
            continue;
        };
        match ActionDescriptor::parse(raw) {
            Ok(action) if !registry.contains(&action.state_id()) => diagnostics.push(Diagnostic {
                level: DiagnosticLevel::Warning,
                message: format!("Action targets unregistered state ID '{}'", action.state_id()),
                context: Some(format!("data-on{}=\"{}\"", event, raw)),
            }),
            Ok(_) => {}
            Err(err) => diagnostics.push(Diagnostic {
                level: DiagnosticLevel::Error,
                message: err.to_string(),
                context: Some(format!("data-on{}", event)),
            }),
        }
    }

    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Element {
        attrs: Vec<(String, String)>,
    }

    impl BindableElement for Element {
        fn with_attribute(mut self, name: &str, value: &str) -> Self {
            self.attrs.push((name.to_string(), value.to_string()));
            self
        }
    }

    #[test]
    fn bind_to_state_adds_attributes() {
        let el = bind_to_state(Element::default(), &StateBinding::checked("global.agree"));
        assert_eq!(
            el.attrs,
            vec![
                ("data-webui-state".to_string(), "global.agree".to_string()),
                ("data-webui-property".to_string(), "checked".to_string()),
            ]
        );
    }

    #[test]
    fn custom_attribute_binding() {
        let binding = StateBinding::new("global.href", BindingProperty::Attribute("href".into()));
        assert_eq!(binding.attributes()[1].1, "href");
    }

    #[test]
    fn descriptor_round_trip() {
        let action = ActionDescriptor::new(StateScope::Global, "counter", StateAction::Increment);
        assert_eq!(action.to_string(), "global.counter.increment");
        assert_eq!(ActionDescriptor::parse("global.counter.increment").unwrap(), action);
    }

    #[test]
    fn descriptor_key_may_contain_dots() {
        let action = ActionDescriptor::parse("shared.menu.open.toggle").unwrap();
        assert_eq!(action.key, "menu.open");
        assert_eq!(action.state_id(), "shared.menu.open");
    }

    #[test]
    fn descriptor_rejects_bad_input() {
        assert!(ActionDescriptor::parse("global.counter").is_err());
        assert!(ActionDescriptor::parse("global.counter.explode").is_err());
        assert!(matches!(
            ActionDescriptor::parse("page.counter.toggle"),
            Err(StateError::UnknownScope(_))
        ));
    }

    #[test]
    fn set_action_carries_value() {
        let action = ActionDescriptor::new(
            StateScope::Session,
            "tab",
            StateAction::Set(StateValue::from("settings")),
        );
        let el = bind_action(Element::default(), "click", &action);
        assert_eq!(
            el.attrs,
            vec![
                ("data-onclick".to_string(), "session.tab.set".to_string()),
                ("data-value".to_string(), "\"settings\"".to_string()),
            ]
        );
    }

    #[test]
    fn inline_script_escapes_closer() {
        assert_eq!(
            inline_script("var s = '</script>';"),
            "<script>var s = '<\\/script>';</script>"
        );
    }

    #[test]
    fn click_handler_uses_state_id() {
        let action = ActionDescriptor::new(StateScope::Global, "isOpen", StateAction::Toggle);
        let script = click_handler_script("menu-button", &action);
        assert!(script.starts_with("<script>"));
        assert!(script.contains("document.getElementById(\"menu-button\")"));
        assert!(script.contains("s.set(\"global.isOpen\", !s.get(\"global.isOpen\"));"));
    }

    #[test]
    fn snapshot_text_formats_values() {
        let registry = GlobalStateRegistry::new();
        registry.register_value("hi", Some("a"));
        registry.register_value(2.0, Some("b"));
        registry.register_value(true, Some("c"));
        assert_eq!(snapshot_text(&registry, "a"), "hi");
        assert_eq!(snapshot_text(&registry, "b"), "2");
        assert_eq!(snapshot_text(&registry, "c"), "true");
        assert_eq!(snapshot_text(&registry, "missing"), "");
    }

    #[test]
    fn referenced_ids_from_markup() {
        let html = r#"<span data-webui-state="global.count"></span><input data-state='session.name'><p data-state=x>"#;
        let ids: Vec<String> = referenced_state_ids(html).into_iter().collect();
        assert_eq!(ids, vec!["global.count", "session.name", "x"]);
    }

    #[test]
    fn validate_reports_unregistered_ids() {
        let registry = GlobalStateRegistry::new();
        registry.register_value(0, Some("global.count"));
        let html = r#"<span data-webui-state="global.count"></span><b data-webui-state="global.missing"></b>"#;
        let diagnostics = validate_bindings(html, &registry).unwrap_err();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("global.missing"));
    }

    #[test]
    fn validate_checks_action_descriptors() {
        let registry = GlobalStateRegistry::new();
        registry.register_value(0, Some("global.count"));
        let html = r#"<button data-onclick="global.count.increment"></button><button data-onclick="global.other.toggle"></button><a data-onmouseover='global.count.explode'></a>"#;
        let diagnostics = validate_bindings(html, &registry).unwrap_err();
        let levels: Vec<DiagnosticLevel> = diagnostics.iter().map(|d| d.level).collect();
        assert_eq!(levels, vec![DiagnosticLevel::Warning, DiagnosticLevel::Error]);
        assert!(diagnostics[0].message.contains("global.other"));
    }

    #[test]
    fn declarative_binding_attributes() {
        assert_eq!(text_binding("counter"), ("data-state-text".to_string(), "counter".to_string()));
        assert_eq!(show_binding("isOpen"), ("data-state-show".to_string(), "isOpen".to_string()));
        assert_eq!(value_binding("name"), ("data-state-value".to_string(), "name".to_string()));
    }

    #[test]
    fn validate_ignores_text_bindings() {
        let registry = GlobalStateRegistry::new();
        assert!(validate_bindings(r#"<p data-state-text="counter"></p>"#, &registry).is_ok());
    }
}
