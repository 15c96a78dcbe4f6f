//! Declarative state properties.
//!
//! A property knows its own client-side variable declaration and the
//! helper functions that mutate it. Every helper ends with `render();` so
//! bound elements refresh right after the mutation.

use std::collections::BTreeMap;

use crate::utils::{capitalize_first, js_number, serialize_to_script_literal};
use crate::value::StateValue;

/// A self-describing state unit compiled into a `let` binding plus helpers.
pub trait StateProperty {
    /// Client-side variable name, used verbatim.
    fn name(&self) -> &str;

    /// The seed value.
    fn initial_value(&self) -> StateValue;

    /// JS literal for the seed value.
    fn literal(&self) -> String {
        serialize_to_script_literal(&self.initial_value())
    }

    /// `let <name> = <literal>;`
    fn declaration(&self) -> String {
        format!("let {} = {};", self.name(), self.literal())
    }

    /// Helper function definitions, one per line.
    fn helpers(&self) -> String;
}

fn setter(name: &str) -> String {
    format!(
        "const set{} = (value) => {{ {} = value; render(); }};",
        capitalize_first(name),
        name
    )
}

/// Primitive elements render as-is; nested collections are not supported
/// inside array/object properties and render as `null`.
fn primitive_literal(value: &StateValue) -> String {
    match value {
        StateValue::Json(json) if !json.is_array() && !json.is_object() => {
            serialize_to_script_literal(value)
        }
        v if v.is_primitive() => serialize_to_script_literal(v),
        other => {
            tracing::warn!(kind = other.type_name(), "nested property value rendered as null");
            "null".to_string()
        }
    }
}

// ---------------------------------------------------------------------------
// Boolean
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct BooleanState {
    pub name: String,
    pub initial_value: bool,
}

impl BooleanState {
    pub fn new(name: impl Into<String>, initial_value: bool) -> Self {
        Self {
            name: name.into(),
            initial_value,
        }
    }
}

impl StateProperty for BooleanState {
    fn name(&self) -> &str {
        &self.name
    }

    fn initial_value(&self) -> StateValue {
        StateValue::Bool(self.initial_value)
    }

    fn helpers(&self) -> String {
        format!(
            "const toggle{cap} = () => {{ {name} = !{name}; render(); }};",
            cap = capitalize_first(&self.name),
            name = self.name
        )
    }
}

// ---------------------------------------------------------------------------
// String
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct StringState {
    pub name: String,
    pub initial_value: String,
}

impl StringState {
    pub fn new(name: impl Into<String>, initial_value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initial_value: initial_value.into(),
        }
    }
}

impl StateProperty for StringState {
    fn name(&self) -> &str {
        &self.name
    }

    fn initial_value(&self) -> StateValue {
        StateValue::String(self.initial_value.clone())
    }

    fn helpers(&self) -> String {
        setter(&self.name)
    }
}

// ---------------------------------------------------------------------------
// Number
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct NumberState {
    pub name: String,
    pub initial_value: f64,
}

impl NumberState {
    pub fn new(name: impl Into<String>, initial_value: impl Into<f64>) -> Self {
        Self {
            name: name.into(),
            initial_value: initial_value.into(),
        }
    }
}

impl StateProperty for NumberState {
    fn name(&self) -> &str {
        &self.name
    }

    fn initial_value(&self) -> StateValue {
        StateValue::Float(self.initial_value)
    }

    fn literal(&self) -> String {
        js_number(self.initial_value)
    }

    fn helpers(&self) -> String {
        let cap = capitalize_first(&self.name);
        let name = &self.name;
        [
            setter(name),
            format!("const increment{cap} = (by = 1) => {{ {name} += by; render(); }};"),
            format!("const decrement{cap} = (by = 1) => {{ {name} -= by; render(); }};"),
        ]
        .join("\n")
    }
}

// ---------------------------------------------------------------------------
// Array
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayState {
    pub name: String,
    pub initial_value: Vec<StateValue>,
}

impl ArrayState {
    pub fn new<I, T>(name: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<StateValue>,
    {
        Self {
            name: name.into(),
            initial_value: items.into_iter().map(Into::into).collect(),
        }
    }
}

impl StateProperty for ArrayState {
    fn name(&self) -> &str {
        &self.name
    }

    fn initial_value(&self) -> StateValue {
        StateValue::Array(self.initial_value.clone())
    }

    fn literal(&self) -> String {
        let items: Vec<String> = self.initial_value.iter().map(primitive_literal).collect();
        format!("[{}]", items.join(", "))
    }

    fn helpers(&self) -> String {
        let cap = capitalize_first(&self.name);
        let name = &self.name;
        [
            setter(name),
            format!("const add{cap} = (item) => {{ {name} = [...{name}, item]; render(); }};"),
            format!(
                "const remove{cap} = (index) => {{ {name} = {name}.filter((_, i) => i !== index); render(); }};"
            ),
            format!("const clear{cap} = () => {{ {name} = []; render(); }};"),
        ]
        .join("\n")
    }
}

// ---------------------------------------------------------------------------
// Object
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectState {
    pub name: String,
    pub initial_value: BTreeMap<String, StateValue>,
}

impl ObjectState {
    pub fn new<I, K, V>(name: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<StateValue>,
    {
        Self {
            name: name.into(),
            initial_value: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl StateProperty for ObjectState {
    fn name(&self) -> &str {
        &self.name
    }

    fn initial_value(&self) -> StateValue {
        StateValue::Object(self.initial_value.clone())
    }

    fn literal(&self) -> String {
        let entries: Vec<String> = self
            .initial_value
            .iter()
            .map(|(k, v)| {
                format!(
                    "{}: {}",
                    crate::utils::js_object_key(k),
                    primitive_literal(v)
                )
            })
            .collect();
        format!("{{{}}}", entries.join(", "))
    }

    fn helpers(&self) -> String {
        let cap = capitalize_first(&self.name);
        let name = &self.name;
        [
            setter(name),
            format!(
                "const update{cap} = (key, value) => {{ {name} = {{ ...{name}, [key]: value }}; render(); }};"
            ),
            format!(
                "const delete{cap} = (key) => {{ const next = {{ ...{name} }}; delete next[key]; {name} = next; render(); }};"
            ),
        ]
        .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn boolean_declaration_and_toggle() {
        let state = BooleanState::new("isVisible", true);
        assert_eq!(state.declaration(), "let isVisible = true;");
        assert_eq!(
            state.helpers(),
            "const toggleIsVisible = () => { isVisible = !isVisible; render(); };"
        );
    }

    #[test]
    fn string_declaration_is_escaped() {
        let state = StringState::new("text", "Hello \"World\"\nNew Line");
        assert_eq!(state.declaration(), r#"let text = "Hello \"World\"\nNew Line";"#);
        assert_eq!(
            state.helpers(),
            "const setText = (value) => { text = value; render(); };"
        );
    }

    #[test]
    fn number_helpers() {
        let state = NumberState::new("counter", 0);
        assert_eq!(state.declaration(), "let counter = 0;");
        let helpers = state.helpers();
        assert!(helpers.contains("const incrementCounter = (by = 1) => { counter += by; render(); };"));
        assert!(helpers.contains("const decrementCounter = (by = 1) => { counter -= by; render(); };"));
        assert!(helpers.contains("const setCounter = (value) =>"));
    }

    #[test]
    fn fractional_number_literal() {
        assert_eq!(NumberState::new("ratio", 0.75).declaration(), "let ratio = 0.75;");
    }

    #[test]
    fn array_helpers_and_literal() {
        let state = ArrayState::new("items", vec!["a", "b"]);
        assert_eq!(state.declaration(), r#"let items = ["a", "b"];"#);
        let helpers = state.helpers();
        assert!(helpers.contains("const addItems = (item) =>"));
        assert!(helpers.contains("const removeItems = (index) =>"));
        assert!(helpers.contains("const clearItems = () => { items = []; render(); };"));
        assert!(helpers.contains("const setItems = (value) =>"));
    }

    #[test]
    fn array_unsupported_elements_render_null() {
        let state = ArrayState::new(
            "rows",
            vec![StateValue::from(1), StateValue::from(vec![2, 3])],
        );
        assert_eq!(state.declaration(), "let rows = [1, null];");
    }

    #[test]
    fn object_helpers_and_literal() {
        let state = ObjectState::new(
            "user",
            vec![("name", StateValue::from("Ada")), ("age", StateValue::from(36))],
        );
        assert_eq!(state.declaration(), r#"let user = {"age": 36, "name": "Ada"};"#);
        let helpers = state.helpers();
        assert!(helpers.contains("const updateUser = (key, value) =>"));
        assert!(helpers.contains("const deleteUser = (key) =>"));
        assert!(helpers.contains("const setUser = (value) =>"));
    }

    #[test]
    fn object_unsupported_values_render_null() {
        let state = ObjectState::new(
            "settings",
            vec![(
                "nested",
                StateValue::from(serde_json::json!({ "deep": true })),
            )],
        );
        assert_eq!(state.declaration(), r#"let settings = {"nested": null};"#);
    }

    #[test]
    fn every_helper_calls_render() {
        let props: Vec<Box<dyn StateProperty>> = vec![
            Box::new(BooleanState::new("a", false)),
            Box::new(StringState::new("b", "")),
            Box::new(NumberState::new("c", 1)),
            Box::new(ArrayState::new("d", Vec::<i32>::new())),
            Box::new(ObjectState::new("e", Vec::<(String, i32)>::new())),
        ];
        for prop in &props {
            for line in prop.helpers().lines() {
                assert!(line.ends_with("render(); };"), "{line}");
            }
        }
    }
}
