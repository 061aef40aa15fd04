//! Path-copy edits over `DataValue`.
//!
//! An edit rebuilds only the containers on the root-to-leaf chain of the
//! addressed path. Everything off that chain is carried over by `Arc`
//! clone, so it stays reference-equal to the input. The input is never
//! mutated.

use serde_json::Number;

use crate::path::FieldPath;
use crate::schema::{NodeKind, SchemaNode};
use crate::value::{DataValue, ObjectMap};

/// Most nulls an edit will insert to reach an index past the end of an array.
pub const MAX_ARRAY_PADDING: usize = 1024;

/// Return a new value with the leaf at `path` replaced by `new_value`.
///
/// Missing intermediate containers are created as objects. Writing past the
/// end of an array pads it with nulls so arrays stay dense. A path whose
/// index lies more than [`MAX_ARRAY_PADDING`] slots beyond the end returns
/// `data` itself, unchanged.
pub fn edit(data: &DataValue, path: &FieldPath, new_value: DataValue) -> DataValue {
    set_at(data, path.segments(), new_value).unwrap_or_else(|| data.clone())
}

fn set_at(node: &DataValue, segments: &[String], new_value: DataValue) -> Option<DataValue> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(new_value);
    };

    match node {
        DataValue::Array(items) => {
            if let Ok(index) = head.parse::<usize>() {
                if index.saturating_sub(items.len()) > MAX_ARRAY_PADDING {
                    return None;
                }
                let mut copy: Vec<DataValue> = items.as_ref().clone();
                if index >= copy.len() {
                    copy.resize(index + 1, DataValue::Null);
                }
                copy[index] = set_at(&copy[index], rest, new_value)?;
                return Some(DataValue::array(copy));
            }
            fresh_object(head, rest, new_value)
        }
        DataValue::Object(map) => {
            let child = set_at(map.get(head).unwrap_or(&DataValue::Null), rest, new_value)?;
            let mut copy = map.as_ref().clone();
            copy.insert(head.clone(), child);
            Some(DataValue::object(copy))
        }
        _ => fresh_object(head, rest, new_value),
    }
}

fn fresh_object(head: &str, rest: &[String], new_value: DataValue) -> Option<DataValue> {
    let mut map = ObjectMap::new();
    map.insert(head.to_string(), set_at(&DataValue::Null, rest, new_value)?);
    Some(DataValue::object(map))
}

/// Append a schema-driven default element to the array at `array_path`.
///
/// A missing or non-array value is treated as an empty array.
pub fn append_item(data: &DataValue, array_path: &FieldPath, item_schema: &SchemaNode) -> DataValue {
    let mut items = array_path
        .lookup(data)
        .and_then(DataValue::as_array)
        .map(<[DataValue]>::to_vec)
        .unwrap_or_default();
    items.push(default_value(item_schema));
    edit(data, array_path, DataValue::array(items))
}

/// Remove the element at `index`, shifting later elements down.
///
/// Out-of-range indices and non-array targets leave the value unchanged.
pub fn remove_item(data: &DataValue, array_path: &FieldPath, index: usize) -> DataValue {
    let Some(items) = array_path.lookup(data).and_then(DataValue::as_array) else {
        return data.clone();
    };
    if index >= items.len() {
        return data.clone();
    }
    let mut remaining = items.to_vec();
    remaining.remove(index);
    edit(data, array_path, DataValue::array(remaining))
}

/// Value used for a freshly appended element.
///
/// The schema's own `default` wins; otherwise each kind has a fixed empty
/// value. Nodes of unknown kind start as an empty object.
pub fn default_value(schema: &SchemaNode) -> DataValue {
    if let Some(default) = &schema.default {
        return default.clone();
    }
    match &schema.kind {
        NodeKind::String { .. } => DataValue::string(""),
        NodeKind::Number | NodeKind::Integer => DataValue::integer(0),
        NodeKind::Boolean => DataValue::Bool(false),
        NodeKind::Array { .. } => DataValue::empty_array(),
        NodeKind::Object { .. } | NodeKind::Unknown => DataValue::empty_object(),
    }
}

/// Parse numeric user input; anything unparseable becomes `0`.
///
/// Integer fields truncate fractional input.
pub fn coerce_numeric(raw: &str, integer: bool) -> DataValue {
    let trimmed = raw.trim();
    if integer {
        if let Ok(n) = trimmed.parse::<i64>() {
            return DataValue::integer(n);
        }
        return match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() => DataValue::integer(f.trunc() as i64),
            _ => DataValue::integer(0),
        };
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return DataValue::integer(n);
    }
    match trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
        Some(n) => DataValue::Number(n),
        None => DataValue::integer(0),
    }
}

/// Boolean view of a possibly absent value; anything but `true` is `false`.
pub fn coerce_boolean(value: Option<&DataValue>) -> bool {
    value.and_then(DataValue::as_bool).unwrap_or(false)
}
