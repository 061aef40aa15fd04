//! Schema document parsing.
//!
//! A schema document is normalised once into a closed `SchemaNode` tree so
//! the renderer can match on a finite set of kinds instead of inspecting raw
//! JSON at every level. Only the subset the editor interprets is read:
//! `type`, `properties`, `required`, `items`, `enum`, `format`,
//! `description`, `default` and `display_mapping`.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::SchemaError;
use crate::path::FieldPath;
use crate::value::DataValue;

/// Primitive kinds a node can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl SchemaKind {
    /// Map a JSON Schema `type` name onto a kind.
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(SchemaKind::String),
            "number" => Some(SchemaKind::Number),
            "integer" => Some(SchemaKind::Integer),
            "boolean" => Some(SchemaKind::Boolean),
            "object" => Some(SchemaKind::Object),
            "array" => Some(SchemaKind::Array),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaKind::String => "string",
            SchemaKind::Number => "number",
            SchemaKind::Integer => "integer",
            SchemaKind::Boolean => "boolean",
            SchemaKind::Object => "object",
            SchemaKind::Array => "array",
        }
    }
}

/// Kind-specific body of a schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    String {
        enum_values: Option<Vec<String>>,
    },
    Number,
    Integer,
    Boolean,
    Object {
        properties: IndexMap<String, SchemaNode>,
        required: BTreeSet<String>,
    },
    Array {
        items: Box<SchemaNode>,
    },
    /// Type missing or not understood; edited as a raw value.
    Unknown,
}

/// Display metadata for object and array-of-object nodes.
///
/// Each template is either a bare field name or a string containing
/// `{field}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisplayMapping {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub type_template: Option<String>,
    /// Kept verbatim; unknown names resolve to the compact style.
    pub style: Option<String>,
}

impl DisplayMapping {
    fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let text = |key: &str| {
            map.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Some(DisplayMapping {
            title: text("title"),
            description: text("description"),
            type_template: text("type"),
            style: text("style"),
        })
    }
}

/// A node in a parsed schema tree. Immutable once parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub kind: NodeKind,
    pub description: String,
    pub format: Option<String>,
    pub default: Option<DataValue>,
    pub display: Option<DisplayMapping>,
}

impl Default for SchemaNode {
    fn default() -> Self {
        SchemaNode::empty()
    }
}

impl SchemaNode {
    /// Object schema with no properties; the fallback for unusable documents.
    pub fn empty() -> Self {
        SchemaNode::with_kind(NodeKind::Object {
            properties: IndexMap::new(),
            required: BTreeSet::new(),
        })
    }

    /// Node whose kind could not be determined.
    pub fn unknown() -> Self {
        SchemaNode::with_kind(NodeKind::Unknown)
    }

    pub fn with_kind(kind: NodeKind) -> Self {
        SchemaNode {
            kind,
            description: String::new(),
            format: None,
            default: None,
            display: None,
        }
    }

    /// Parse schema text, falling back to [`SchemaNode::empty`] on failure.
    pub fn from_document_str(text: &str) -> Self {
        match parse_schema_document(text) {
            Ok(node) => node,
            Err(err) => {
                warn!(error = %err, "schema document unusable, rendering empty schema");
                SchemaNode::empty()
            }
        }
    }

    /// Parse an already-structured document, falling back to
    /// [`SchemaNode::empty`] when it is not an object.
    pub fn from_document_value(value: &Value) -> Self {
        match SchemaNode::try_from(value) {
            Ok(node) => node,
            Err(err) => {
                warn!(error = %err, "schema document unusable, rendering empty schema");
                SchemaNode::empty()
            }
        }
    }

    pub fn kind(&self) -> Option<SchemaKind> {
        match &self.kind {
            NodeKind::String { .. } => Some(SchemaKind::String),
            NodeKind::Number => Some(SchemaKind::Number),
            NodeKind::Integer => Some(SchemaKind::Integer),
            NodeKind::Boolean => Some(SchemaKind::Boolean),
            NodeKind::Object { .. } => Some(SchemaKind::Object),
            NodeKind::Array { .. } => Some(SchemaKind::Array),
            NodeKind::Unknown => None,
        }
    }

    /// Declared properties in document order (empty for non-objects).
    pub fn properties(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        let props = match &self.kind {
            NodeKind::Object { properties, .. } => Some(properties),
            _ => None,
        };
        props
            .into_iter()
            .flat_map(|p| p.iter().map(|(k, v)| (k.as_str(), v)))
    }

    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        match &self.kind {
            NodeKind::Object { properties, .. } => properties.get(name),
            _ => None,
        }
    }

    pub fn has_properties(&self) -> bool {
        self.properties().next().is_some()
    }

    pub fn is_required(&self, name: &str) -> bool {
        match &self.kind {
            NodeKind::Object { required, .. } => required.contains(name),
            _ => false,
        }
    }

    pub fn items(&self) -> Option<&SchemaNode> {
        match &self.kind {
            NodeKind::Array { items } => Some(items),
            _ => None,
        }
    }

    pub fn enum_values(&self) -> Option<&[String]> {
        match &self.kind {
            NodeKind::String {
                enum_values: Some(values),
            } => Some(values),
            _ => None,
        }
    }

    /// Node describing the value at `path`. Numeric segments step into array
    /// items; anything else names an object property.
    pub fn at_path(&self, path: &FieldPath) -> Option<&SchemaNode> {
        path.segments().iter().try_fold(self, |node, segment| match &node.kind {
            NodeKind::Array { items } if segment.parse::<usize>().is_ok() => Some(items.as_ref()),
            _ => node.property(segment),
        })
    }

    /// Lenient node parse used below the document root.
    fn from_value(value: &Value) -> SchemaNode {
        let Some(map) = value.as_object() else {
            return SchemaNode::unknown();
        };

        let kind = match declared_kind(map) {
            Some(SchemaKind::String) => NodeKind::String {
                enum_values: map.get("enum").and_then(parse_enum),
            },
            Some(SchemaKind::Number) => NodeKind::Number,
            Some(SchemaKind::Integer) => NodeKind::Integer,
            Some(SchemaKind::Boolean) => NodeKind::Boolean,
            Some(SchemaKind::Object) => NodeKind::Object {
                properties: map
                    .get("properties")
                    .and_then(Value::as_object)
                    .map(|props| {
                        props
                            .iter()
                            .map(|(name, sub)| (name.clone(), SchemaNode::from_value(sub)))
                            .collect()
                    })
                    .unwrap_or_default(),
                required: map
                    .get("required")
                    .and_then(Value::as_array)
                    .map(|names| {
                        names
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            Some(SchemaKind::Array) => NodeKind::Array {
                items: Box::new(
                    map.get("items")
                        .map(SchemaNode::from_value)
                        .unwrap_or_else(SchemaNode::unknown),
                ),
            },
            None => NodeKind::Unknown,
        };

        let mut node = SchemaNode::with_kind(kind);
        node.description = map
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        node.format = map
            .get("format")
            .and_then(Value::as_str)
            .map(str::to_string);
        node.display = map.get("display_mapping").and_then(DisplayMapping::from_value);
        let declared = node.kind();
        node.default = map.get("default").and_then(|d| {
            let value = DataValue::from(d);
            if default_fits(declared, &value) {
                Some(value)
            } else {
                debug!(default = %d, "ignoring default that does not match the declared type");
                None
            }
        });
        node
    }
}

impl TryFrom<&Value> for SchemaNode {
    type Error = SchemaError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        if !value.is_object() {
            return Err(SchemaError::NotAnObject(json_type_name(value).to_string()));
        }
        Ok(SchemaNode::from_value(value))
    }
}

/// Parse schema text strictly, reporting why it cannot be used.
pub fn parse_schema_document(text: &str) -> Result<SchemaNode, SchemaError> {
    let value: Value = serde_json::from_str(text)?;
    SchemaNode::try_from(&value)
}

/// Resolve the node kind, inferring it from structure when `type` is absent.
fn declared_kind(map: &serde_json::Map<String, Value>) -> Option<SchemaKind> {
    match map.get("type") {
        Some(Value::String(name)) => SchemaKind::from_type_name(name),
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(Value::as_str)
            .filter(|n| *n != "null")
            .find_map(SchemaKind::from_type_name),
        Some(_) => None,
        None => {
            if map.contains_key("properties") {
                Some(SchemaKind::Object)
            } else if map.contains_key("items") {
                Some(SchemaKind::Array)
            } else if map.contains_key("enum") {
                Some(SchemaKind::String)
            } else {
                None
            }
        }
    }
}

fn parse_enum(value: &Value) -> Option<Vec<String>> {
    let values = value.as_array()?;
    Some(
        values
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
    )
}

fn default_fits(kind: Option<SchemaKind>, value: &DataValue) -> bool {
    match kind {
        Some(SchemaKind::String) => value.as_str().is_some(),
        Some(SchemaKind::Number) => value.as_number().is_some(),
        Some(SchemaKind::Integer) => value
            .as_number()
            .map(|n| n.is_i64() || n.is_u64())
            .unwrap_or(false),
        Some(SchemaKind::Boolean) => value.as_bool().is_some(),
        Some(SchemaKind::Object) => value.as_object().is_some(),
        Some(SchemaKind::Array) => value.as_array().is_some(),
        None => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_properties_in_declared_order() {
        let node = SchemaNode::from_document_value(&json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer"},
                "active": {"type": "boolean"}
            },
            "required": ["name"]
        }));
        let names: Vec<&str> = node.properties().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["name", "age", "active"]);
        assert!(node.is_required("name"));
        assert!(!node.is_required("age"));
    }

    #[test]
    fn infers_kind_from_structure() {
        let node = SchemaNode::from_document_value(&json!({
            "properties": {
                "tags": {"items": {"type": "string"}},
                "method": {"enum": ["GET", "POST"]},
                "blob": {}
            }
        }));
        assert_eq!(node.kind(), Some(SchemaKind::Object));
        assert_eq!(node.property("tags").unwrap().kind(), Some(SchemaKind::Array));
        assert_eq!(
            node.property("method").unwrap().enum_values(),
            Some(&["GET".to_string(), "POST".to_string()][..])
        );
        assert_eq!(node.property("blob").unwrap().kind(), None);
    }

    #[test]
    fn nullable_type_union_takes_first_concrete_type() {
        let node = SchemaNode::from_document_value(&json!({
            "properties": {"n": {"type": ["null", "number"]}}
        }));
        assert_eq!(node.property("n").unwrap().kind(), Some(SchemaKind::Number));
    }

    #[test]
    fn invalid_text_falls_back_to_empty_schema() {
        let node = SchemaNode::from_document_str("{not json");
        assert_eq!(node, SchemaNode::empty());
        assert!(!node.has_properties());
        assert!(parse_schema_document("{not json").is_err());
    }

    #[test]
    fn non_object_document_is_rejected_strictly() {
        let err = parse_schema_document("[1, 2]").unwrap_err();
        assert!(matches!(err, SchemaError::NotAnObject(ref t) if t == "array"));
        assert_eq!(SchemaNode::from_document_str("[1, 2]"), SchemaNode::empty());
    }

    #[test]
    fn mismatched_default_is_dropped() {
        let node = SchemaNode::from_document_value(&json!({
            "properties": {
                "count": {"type": "integer", "default": "ten"},
                "label": {"type": "string", "default": "hi"}
            }
        }));
        assert!(node.property("count").unwrap().default.is_none());
        assert_eq!(
            node.property("label").unwrap().default,
            Some(DataValue::string("hi"))
        );
    }

    #[test]
    fn display_mapping_is_read_from_array_and_items() {
        let node = SchemaNode::from_document_value(&json!({
            "properties": {
                "apis": {
                    "type": "array",
                    "display_mapping": {"style": "badge"},
                    "items": {
                        "type": "object",
                        "display_mapping": {"title": "{method}:{path}", "type": "method"}
                    }
                }
            }
        }));
        let apis = node.property("apis").unwrap();
        assert_eq!(apis.display.as_ref().unwrap().style.as_deref(), Some("badge"));
        let items = apis.items().unwrap();
        let mapping = items.display.as_ref().unwrap();
        assert_eq!(mapping.title.as_deref(), Some("{method}:{path}"));
        assert_eq!(mapping.type_template.as_deref(), Some("method"));
        assert!(mapping.style.is_none());
    }

    #[test]
    fn at_path_walks_properties_and_items() {
        let node = SchemaNode::from_document_value(&json!({
            "properties": {
                "apis": {
                    "type": "array",
                    "items": {
                        "properties": {
                            "parameters": {"type": "array", "items": {"type": "string"}}
                        }
                    }
                }
            }
        }));
        let path = FieldPath::parse("apis.0.parameters").unwrap();
        assert_eq!(node.at_path(&path).unwrap().kind(), Some(SchemaKind::Array));
        assert_eq!(node.at_path(&FieldPath::root()), Some(&node));
        assert!(node.at_path(&FieldPath::parse("apis.x").unwrap()).is_none());
    }
}
