//! Shared-structure data values.
//!
//! `DataValue` mirrors the JSON data model, but containers and strings sit
//! behind `Arc` so an edit can copy the nodes along one path and hand every
//! other subtree to the new value by reference. [`DataValue::same_ref`] is
//! the identity check hosts use for change detection.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};

/// Insertion-ordered object body.
pub type ObjectMap = IndexMap<String, DataValue>;

/// Arbitrary nested value edited by the form engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DataValue {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(Arc<str>),
    Array(Arc<Vec<DataValue>>),
    Object(Arc<ObjectMap>),
}

impl DataValue {
    pub fn string(s: impl Into<String>) -> Self {
        DataValue::String(Arc::from(s.into()))
    }

    pub fn array(items: Vec<DataValue>) -> Self {
        DataValue::Array(Arc::new(items))
    }

    pub fn object(map: ObjectMap) -> Self {
        DataValue::Object(Arc::new(map))
    }

    pub fn empty_array() -> Self {
        Self::array(Vec::new())
    }

    pub fn empty_object() -> Self {
        Self::object(ObjectMap::new())
    }

    pub fn integer(n: i64) -> Self {
        DataValue::Number(Number::from(n))
    }

    /// Float values that are not finite collapse to `0`.
    pub fn float(f: f64) -> Self {
        DataValue::Number(Number::from_f64(f).unwrap_or_else(|| Number::from(0)))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DataValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            DataValue::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[DataValue]> {
        match self {
            DataValue::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectMap> {
        match self {
            DataValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Field lookup; `None` for non-objects and missing keys.
    pub fn get(&self, key: &str) -> Option<&DataValue> {
        self.as_object().and_then(|m| m.get(key))
    }

    /// Element lookup; `None` for non-arrays and out-of-range indices.
    pub fn get_index(&self, index: usize) -> Option<&DataValue> {
        self.as_array().and_then(|items| items.get(index))
    }

    /// True for `{}` and for absent values treated as objects (`null`).
    pub fn is_empty_object(&self) -> bool {
        match self {
            DataValue::Null => true,
            DataValue::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    /// Identity comparison.
    ///
    /// Shared nodes compare by pointer; scalars have no identity and compare
    /// by value.
    pub fn same_ref(&self, other: &DataValue) -> bool {
        match (self, other) {
            (DataValue::Array(a), DataValue::Array(b)) => Arc::ptr_eq(a, b),
            (DataValue::Object(a), DataValue::Object(b)) => Arc::ptr_eq(a, b),
            (DataValue::String(a), DataValue::String(b)) => Arc::ptr_eq(a, b),
            (DataValue::Null, DataValue::Null) => true,
            (DataValue::Bool(a), DataValue::Bool(b)) => a == b,
            (DataValue::Number(a), DataValue::Number(b)) => a == b,
            _ => false,
        }
    }

    /// Text used when interpolating a value into a display template.
    ///
    /// Absent and null values render empty, whole floats render without a
    /// fractional part and arrays are joined with commas.
    pub fn display_string(&self) -> String {
        match self {
            DataValue::Null => String::new(),
            DataValue::Bool(b) => b.to_string(),
            DataValue::Number(n) => format_number(n),
            DataValue::String(s) => s.to_string(),
            DataValue::Array(items) => items
                .iter()
                .map(DataValue::display_string)
                .collect::<Vec<_>>()
                .join(","),
            DataValue::Object(_) => self.to_json().to_string(),
        }
    }

    /// Deep conversion into a `serde_json::Value`.
    pub fn to_json(&self) -> Value {
        match self {
            DataValue::Null => Value::Null,
            DataValue::Bool(b) => Value::Bool(*b),
            DataValue::Number(n) => Value::Number(n.clone()),
            DataValue::String(s) => Value::String(s.to_string()),
            DataValue::Array(items) => Value::Array(items.iter().map(DataValue::to_json).collect()),
            DataValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

fn format_number(n: &Number) -> String {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                return format!("{}", f as i64);
            }
        }
    }
    n.to_string()
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<&Value> for DataValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => DataValue::Null,
            Value::Bool(b) => DataValue::Bool(*b),
            Value::Number(n) => DataValue::Number(n.clone()),
            Value::String(s) => DataValue::string(s.as_str()),
            Value::Array(items) => DataValue::array(items.iter().map(DataValue::from).collect()),
            Value::Object(map) => DataValue::object(
                map.iter()
                    .map(|(k, v)| (k.clone(), DataValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for DataValue {
    fn from(value: Value) -> Self {
        DataValue::from(&value)
    }
}

impl From<&str> for DataValue {
    fn from(s: &str) -> Self {
        DataValue::string(s)
    }
}

impl From<String> for DataValue {
    fn from(s: String) -> Self {
        DataValue::string(s)
    }
}

impl From<bool> for DataValue {
    fn from(b: bool) -> Self {
        DataValue::Bool(b)
    }
}

impl From<i64> for DataValue {
    fn from(n: i64) -> Self {
        DataValue::integer(n)
    }
}

impl Serialize for DataValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DataValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(DataValue::from(value))
    }
}
