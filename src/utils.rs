//! Utility functions for script generation.
//!
//! - JS string escaping (injection-safe)
//! - Script literal serialization for state values and arbitrary host values
//! - Identifier and file-name helpers

use std::fmt::Debug;

use serde::Serialize;

use crate::value::StateValue;

// ---------------------------------------------------------------------------
// JS String Escaping
// ---------------------------------------------------------------------------

/// Escape a string for safe embedding inside a JS double-quoted string literal.
///
/// Escapes backslash, double quote, newline, carriage return and tab.
pub fn escape_js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

/// Quote and escape a string as a JS string literal.
pub fn js_string_literal(s: &str) -> String {
    format!("\"{}\"", escape_js_string(s))
}

/// Key for a JS object literal. `__proto__` is emitted as a computed key so
/// it becomes an own property instead of setting the prototype.
pub fn js_object_key(key: &str) -> String {
    if key == "__proto__" {
        format!("[{}]", js_string_literal(key))
    } else {
        js_string_literal(key)
    }
}

/// Neutralise closing script tags so a script body can be inlined in HTML.
pub fn escape_script_close(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;
    while let Some(pos) = find_ascii_case_insensitive(rest, "</script") {
        out.push_str(&rest[..pos]);
        out.push_str("<\\/");
        // Keep the original casing of "script".
        out.push_str(&rest[pos + 2..pos + 8]);
        rest = &rest[pos + 8..];
    }
    out.push_str(rest);
    out
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.as_bytes();
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

// ---------------------------------------------------------------------------
// Script Literal Serialization
// ---------------------------------------------------------------------------

/// Render a float as a JS numeric literal.
/// Integral values drop the fractional part; non-finite values become `null`.
pub fn js_number(value: f64) -> String {
    if !value.is_finite() {
        return "null".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    format!("{}", value)
}

/// Serialize a state value as a JS/JSON literal.
///
/// Resolution order: string, boolean, integer, float, structured values
/// (recursively), then `null`.
pub fn serialize_to_script_literal(value: &StateValue) -> String {
    match value {
        StateValue::String(s) => js_string_literal(s),
        StateValue::Bool(b) => b.to_string(),
        StateValue::Int(i) => i.to_string(),
        StateValue::Float(f) => js_number(*f),
        StateValue::Array(items) => {
            let rendered: Vec<String> = items.iter().map(serialize_to_script_literal).collect();
            format!("[{}]", rendered.join(", "))
        }
        StateValue::Object(map) => {
            let rendered: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", js_object_key(k), serialize_to_script_literal(v)))
                .collect();
            format!("{{{}}}", rendered.join(", "))
        }
        StateValue::Json(json) => serialize_json_literal(json),
        StateValue::Null => "null".to_string(),
    }
}

/// Serialize pre-serialized JSON, routing every string through
/// [`escape_js_string`].
fn serialize_json_literal(json: &serde_json::Value) -> String {
    use serde_json::Value;

    match json {
        Value::String(s) => js_string_literal(s),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                n.as_f64().map(js_number).unwrap_or_else(|| "null".to_string())
            }
        }
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(serialize_json_literal).collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::Object(map) => {
            let rendered: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", js_object_key(k), serialize_json_literal(v)))
                .collect();
            format!("{{{}}}", rendered.join(", "))
        }
        Value::Null => "null".to_string(),
    }
}

/// Serialize an arbitrary host value as a JS literal.
///
/// Values serde can represent are rendered structurally. Anything else
/// falls back to its quoted `Debug` rendering so generation never fails.
pub fn serialize_any<T: Serialize + Debug + ?Sized>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(json) => serialize_json_literal(&json),
        Err(err) => {
            tracing::warn!(error = %err, "falling back to debug rendering for script literal");
            js_string_literal(&format!("{:?}", value))
        }
    }
}

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

/// Uppercase the first character, used to derive helper names
/// (`counter` → `incrementCounter`).
pub fn capitalize_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Replace anything outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_file_token(input: &str) -> String {
    input
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' { ch } else { '_' })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_escape_js_string() {
        assert_eq!(escape_js_string(r#"he said "hi""#), r#"he said \"hi\""#);
        assert_eq!(escape_js_string("line1\nline2"), "line1\\nline2");
        assert_eq!(escape_js_string("a\\b"), "a\\\\b");
        assert_eq!(escape_js_string("a\r\tb"), "a\\r\\tb");
    }

    #[test]
    fn test_escape_backslash_before_quote() {
        // A pre-escaped quote must not collapse back into a bare quote.
        assert_eq!(escape_js_string("\\\""), "\\\\\\\"");
    }

    #[test]
    fn test_escape_script_close() {
        assert_eq!(
            escape_script_close("a</script><script>b"),
            "a<\\/script><script>b"
        );
        assert_eq!(escape_script_close("x</SCRIPT>"), "x<\\/SCRIPT>");
        assert_eq!(escape_script_close("plain"), "plain");
    }

    #[test]
    fn test_js_number() {
        assert_eq!(js_number(0.0), "0");
        assert_eq!(js_number(-3.0), "-3");
        assert_eq!(js_number(1.5), "1.5");
        assert_eq!(js_number(f64::INFINITY), "null");
        assert_eq!(js_number(f64::NAN), "null");
    }

    #[test]
    fn test_serialize_primitives() {
        assert_eq!(serialize_to_script_literal(&StateValue::from("a\"b")), "\"a\\\"b\"");
        assert_eq!(serialize_to_script_literal(&StateValue::from(true)), "true");
        assert_eq!(serialize_to_script_literal(&StateValue::from(7)), "7");
        assert_eq!(serialize_to_script_literal(&StateValue::from(2.25)), "2.25");
        assert_eq!(serialize_to_script_literal(&StateValue::Null), "null");
    }

    #[test]
    fn test_serialize_collections() {
        let value = StateValue::Object(BTreeMap::from([
            ("b".to_string(), StateValue::from(vec![1, 2])),
            ("a".to_string(), StateValue::from("x")),
        ]));
        assert_eq!(serialize_to_script_literal(&value), r#"{"a": "x", "b": [1, 2]}"#);
    }

    #[test]
    fn test_serialize_json_escapes_strings() {
        let value = StateValue::from(serde_json::json!({ "msg": "line\nbreak" }));
        assert_eq!(serialize_to_script_literal(&value), r#"{"msg": "line\nbreak"}"#);
    }

    #[test]
    fn test_serialize_any_prefers_structure() {
        assert_eq!(serialize_any("text"), "\"text\"");
        assert_eq!(serialize_any(&false), "false");
        assert_eq!(serialize_any(&12u8), "12");
        assert_eq!(serialize_any(&0.5f64), "0.5");
        assert_eq!(serialize_any(&vec!["a"]), "[\"a\"]");
    }

    #[test]
    fn test_serialize_any_falls_back_to_debug() {
        // Maps with non-string keys are not representable in JSON.
        let map: BTreeMap<(u8, u8), u8> = BTreeMap::from([((1, 2), 3)]);
        assert_eq!(serialize_any(&map), "\"{(1, 2): 3}\"");
    }

    #[test]
    fn test_capitalize_first() {
        assert_eq!(capitalize_first("isVisible"), "IsVisible");
        assert_eq!(capitalize_first("counter"), "Counter");
        assert_eq!(capitalize_first(""), "");
    }

    #[test]
    fn test_sanitize_file_token() {
        assert_eq!(sanitize_file_token("blog/post.html"), "blog_post_html");
        assert_eq!(sanitize_file_token("nav-menu_1"), "nav-menu_1");
    }

    #[test]
    fn test_proto_key_is_computed() {
        let value = StateValue::Object(BTreeMap::from([
            ("__proto__".to_string(), StateValue::Int(5)),
            ("a".to_string(), StateValue::Int(1)),
        ]));
        assert_eq!(serialize_to_script_literal(&value), r#"{["__proto__"]: 5, "a": 1}"#);

        let json = StateValue::Json(serde_json::json!({ "__proto__": 5, "a": 1 }));
        assert_eq!(serialize_to_script_literal(&json), r#"{["__proto__"]: 5, "a": 1}"#);
    }
}
