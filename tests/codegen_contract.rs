//! Generated-text contracts: declarations, helpers, escaping and the
//! degraded literals for values that have no script representation.

use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use webui_state::utils::{escape_js_string, serialize_any, serialize_to_script_literal};
use webui_state::{
    generate_property_script, generate_registry_js, generate_runtime_js, ArrayState, BooleanState,
    GlobalStateRegistry, NumberState, ObjectState, StateConfiguration, StateProperty, StateValue,
    StringState,
};

// ---------------------------------------------------------------------------
// Property declarations and helpers
// ---------------------------------------------------------------------------

#[test]
fn boolean_declaration_and_toggle() {
    let prop = BooleanState::new("isVisible", true);
    assert_eq!(prop.declaration(), "let isVisible = true;");
    assert!(prop
        .helpers()
        .contains("const toggleIsVisible = () => { isVisible = !isVisible; render(); };"));
}

#[test]
fn string_declaration_is_escaped() {
    let prop = StringState::new("text", "Hello \"World\"\nNew Line");
    assert_eq!(prop.declaration(), r#"let text = "Hello \"World\"\nNew Line";"#);
    assert!(prop
        .helpers()
        .contains("const setText = (value) => { text = value; render(); };"));
}

#[test]
fn number_helpers() {
    let prop = NumberState::new("counter", 0);
    assert_eq!(prop.declaration(), "let counter = 0;");
    let helpers = prop.helpers();
    assert!(helpers.contains("const incrementCounter = (by = 1) => { counter += by; render(); };"));
    assert!(helpers.contains("const decrementCounter = (by = 1) => { counter -= by; render(); };"));
}

#[test]
fn array_and_object_helpers_end_with_render() {
    let list = ArrayState::new("items", vec!["a", "b"]);
    let map = ObjectState::new("prefs", [("theme", "dark")]);
    assert_eq!(list.declaration(), r#"let items = ["a", "b"];"#);
    assert_eq!(map.declaration(), r#"let prefs = {"theme": "dark"};"#);

    for helpers in [list.helpers(), map.helpers()] {
        for line in helpers.lines() {
            assert!(line.ends_with("render(); };"), "helper without render: {line}");
        }
    }
    assert!(list.helpers().contains("const addItems = (item) =>"));
    assert!(list.helpers().contains("const removeItems = (index) =>"));
    assert!(list.helpers().contains("const clearItems = () =>"));
    assert!(map.helpers().contains("const updatePrefs = (key, value) =>"));
    assert!(map.helpers().contains("const deletePrefs = (key) =>"));
}

// ---------------------------------------------------------------------------
// Degraded literals
// ---------------------------------------------------------------------------

#[test]
fn unsupported_object_fields_render_as_null() {
    let prop = ObjectState::new(
        "settings",
        [
            ("count", StateValue::Int(1)),
            ("nested", StateValue::from(vec![1, 2])),
            ("ratio", StateValue::Float(f64::NAN)),
        ],
    );
    assert_eq!(
        prop.declaration(),
        r#"let settings = {"count": 1, "nested": null, "ratio": null};"#
    );
}

#[test]
fn unserializable_host_value_degrades() {
    let mut bad = BTreeMap::new();
    bad.insert((1, 2), "tuple keys are not JSON");
    assert_eq!(StateValue::from_serialize(&bad), StateValue::Null);
    assert_eq!(serialize_to_script_literal(&StateValue::Float(f64::INFINITY)), "null");
}

#[test]
fn serialize_any_priority() {
    assert_eq!(serialize_any("a\"b"), r#""a\"b""#);
    assert_eq!(serialize_any(&true), "true");
    assert_eq!(serialize_any(&42i64), "42");
    assert_eq!(serialize_any(&1.5f64), "1.5");
    assert_eq!(serialize_any(&vec![1, 2]), "[1, 2]");
}

#[test]
fn escaping_order() {
    assert_eq!(escape_js_string("\\\"\n\r\t"), r#"\\\"\n\r\t"#);
}

// ---------------------------------------------------------------------------
// Script layout
// ---------------------------------------------------------------------------

#[test]
fn property_script_orders_declarations_before_helpers() {
    let visible = BooleanState::new("isVisible", true);
    let counter = NumberState::new("counter", 0);
    let js = generate_property_script(&[&visible, &counter]);

    let decl = js.find("let counter = 0;").unwrap();
    let helper = js.find("const toggleIsVisible").unwrap();
    let render = js.find("function render()").unwrap();
    assert!(decl < helper && helper < render);
}

#[test]
fn registry_script_seeds_every_id() {
    let registry = GlobalStateRegistry::new();
    registry.register_value("Hello \"World\"", Some("greeting"));
    registry.register_value(vec![1, 2], Some("list"));
    let js = generate_registry_js(&registry, &StateConfiguration::default());

    assert!(js.starts_with("/* webui-state: registry */\n"));
    assert!(js.contains(r#"__webui_initial["greeting"] = "Hello \"World\"";"#));
    assert!(js.contains(r#"__webui_initial["list"] = [1, 2];"#));
}

#[test]
fn runtime_exposes_public_api() {
    let js = generate_runtime_js(&BTreeMap::new(), &StateConfiguration::default());
    assert!(js.contains("window.WebUIState = Object.freeze({"));
    for name in ["get", "set", "define", "subscribe", "render", "keys"] {
        assert!(js.contains(&format!("{name}: ")), "missing {name}");
    }
}

#[test]
fn proto_key_stays_an_own_property() {
    let value = StateValue::Object(BTreeMap::from([
        ("__proto__".to_string(), StateValue::Int(5)),
        ("a".to_string(), StateValue::Int(1)),
    ]));
    let states = BTreeMap::from([("global.obj".to_string(), value)]);
    let js = generate_runtime_js(&states, &StateConfiguration::default());
    assert!(js.contains(r#"__webui_initial["global.obj"] = {["__proto__"]: 5, "a": 1};"#));

    let prop = ObjectState::new("obj", [("__proto__", 5), ("a", 1)]);
    assert_eq!(prop.declaration(), r#"let obj = {["__proto__"]: 5, "a": 1};"#);
}
