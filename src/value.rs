//! Wire-compatible state values.
//!
//! Every value the store, the registry and the generator handle is a
//! [`StateValue`]. The set of shapes is closed so serialization to a script
//! literal is exhaustive; structured host values that do not fit the
//! primitive shapes are carried as pre-serialized JSON.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A state value in one of the supported wire shapes.
#[derive(Debug, Clone, Default)]
pub enum StateValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<StateValue>),
    Object(BTreeMap<String, StateValue>),
    /// Structured value serialized through serde ahead of time.
    Json(serde_json::Value),
}

impl StateValue {
    /// Short type label used in log lines and diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            StateValue::Null => "null",
            StateValue::Bool(_) => "boolean",
            StateValue::Int(_) => "integer",
            StateValue::Float(_) => "number",
            StateValue::String(_) => "string",
            StateValue::Array(_) => "array",
            StateValue::Object(_) => "object",
            StateValue::Json(_) => "json",
        }
    }

    /// True for values that render as a single scalar literal.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            StateValue::Null
                | StateValue::Bool(_)
                | StateValue::Int(_)
                | StateValue::Float(_)
                | StateValue::String(_)
        )
    }

    /// Convert any serializable host value. Serialization failures degrade
    /// to [`StateValue::Null`].
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(json) => StateValue::Json(json),
            Err(err) => {
                tracing::warn!(error = %err, "state value is not serializable, storing null");
                StateValue::Null
            }
        }
    }

    /// Typed view of this value. Returns `None` on a shape mismatch.
    pub fn get<T: FromStateValue>(&self) -> Option<T> {
        match self {
            StateValue::Json(json) => T::from_state_value(&StateValue::from_json(json.clone())),
            other => T::from_state_value(other),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            StateValue::Null => Value::Null,
            StateValue::Bool(b) => Value::Bool(*b),
            StateValue::Int(i) => Value::from(*i),
            StateValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            StateValue::String(s) => Value::String(s.clone()),
            StateValue::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            StateValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            StateValue::Json(json) => json.clone(),
        }
    }

    pub fn from_json(json: serde_json::Value) -> Self {
        use serde_json::Value;

        match json {
            Value::Null => StateValue::Null,
            Value::Bool(b) => StateValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    StateValue::Int(i)
                } else {
                    n.as_f64().map(StateValue::Float).unwrap_or(StateValue::Null)
                }
            }
            Value::String(s) => StateValue::String(s),
            Value::Array(items) => {
                StateValue::Array(items.into_iter().map(Self::from_json).collect())
            }
            Value::Object(map) => StateValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }
}

// Pre-serialized JSON compares by its JSON form so an exported value equals
// the same value read back from an import.
impl PartialEq for StateValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (StateValue::Json(_), _) | (_, StateValue::Json(_)) => self.to_json() == other.to_json(),
            (StateValue::Null, StateValue::Null) => true,
            (StateValue::Bool(a), StateValue::Bool(b)) => a == b,
            (StateValue::Int(a), StateValue::Int(b)) => a == b,
            (StateValue::Float(a), StateValue::Float(b)) => a == b,
            (StateValue::String(a), StateValue::String(b)) => a == b,
            (StateValue::Array(a), StateValue::Array(b)) => a == b,
            (StateValue::Object(a), StateValue::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Serialize for StateValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StateValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(StateValue::from_json)
    }
}

// ---------------------------------------------------------------------------
// Host → StateValue
// ---------------------------------------------------------------------------

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        StateValue::Bool(value)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for StateValue {
                fn from(value: $ty) -> Self {
                    StateValue::Int(i64::from(value))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for StateValue {
    fn from(value: u64) -> Self {
        i64::try_from(value)
            .map(StateValue::Int)
            .unwrap_or(StateValue::Float(value as f64))
    }
}

impl From<usize> for StateValue {
    fn from(value: usize) -> Self {
        StateValue::from(value as u64)
    }
}

impl From<f32> for StateValue {
    fn from(value: f32) -> Self {
        StateValue::Float(f64::from(value))
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        StateValue::Float(value)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        StateValue::String(value.to_string())
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        StateValue::String(value)
    }
}

impl<T: Into<StateValue>> From<Vec<T>> for StateValue {
    fn from(items: Vec<T>) -> Self {
        StateValue::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<StateValue>> From<BTreeMap<String, T>> for StateValue {
    fn from(map: BTreeMap<String, T>) -> Self {
        StateValue::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<StateValue>> From<HashMap<String, T>> for StateValue {
    fn from(map: HashMap<String, T>) -> Self {
        StateValue::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<StateValue>> From<Option<T>> for StateValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(StateValue::Null)
    }
}

impl From<serde_json::Value> for StateValue {
    fn from(value: serde_json::Value) -> Self {
        StateValue::Json(value)
    }
}

// ---------------------------------------------------------------------------
// StateValue → Host
// ---------------------------------------------------------------------------

/// Typed extraction from a [`StateValue`]. Implementations return `None`
/// when the stored shape does not match; they never panic.
pub trait FromStateValue: Sized {
    fn from_state_value(value: &StateValue) -> Option<Self>;
}

impl FromStateValue for StateValue {
    fn from_state_value(value: &StateValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromStateValue for bool {
    fn from_state_value(value: &StateValue) -> Option<Self> {
        match value {
            StateValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromStateValue for String {
    fn from_state_value(value: &StateValue) -> Option<Self> {
        match value {
            StateValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromStateValue for i64 {
    fn from_state_value(value: &StateValue) -> Option<Self> {
        match value {
            StateValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl FromStateValue for i32 {
    fn from_state_value(value: &StateValue) -> Option<Self> {
        match value {
            StateValue::Int(i) => i32::try_from(*i).ok(),
            _ => None,
        }
    }
}

impl FromStateValue for u32 {
    fn from_state_value(value: &StateValue) -> Option<Self> {
        match value {
            StateValue::Int(i) => u32::try_from(*i).ok(),
            _ => None,
        }
    }
}

impl FromStateValue for f64 {
    fn from_state_value(value: &StateValue) -> Option<Self> {
        match value {
            StateValue::Float(f) => Some(*f),
            StateValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl<T: FromStateValue> FromStateValue for Vec<T> {
    fn from_state_value(value: &StateValue) -> Option<Self> {
        match value {
            StateValue::Array(items) => items.iter().map(|item| item.get::<T>()).collect(),
            _ => None,
        }
    }
}

impl<T: FromStateValue> FromStateValue for BTreeMap<String, T> {
    fn from_state_value(value: &StateValue) -> Option<Self> {
        match value {
            StateValue::Object(map) => map
                .iter()
                .map(|(k, v)| v.get::<T>().map(|v| (k.clone(), v)))
                .collect(),
            _ => None,
        }
    }
}

impl FromStateValue for serde_json::Value {
    fn from_state_value(value: &StateValue) -> Option<Self> {
        Some(value.to_json())
    }
}
