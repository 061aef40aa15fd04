//! Schema-driven field rendering.
//!
//! Turns a `(SchemaNode, DataValue, Mode)` triple into a tree of
//! [`FieldDescriptor`]s that a host draws as widgets. Rendering is pure and
//! synchronous; edits go back through [`crate::edit`].

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Number;

use crate::display::{item_mapping, resolve, resolve_style, DisplayStyle, DisplaySummary};
use crate::edit::{coerce_boolean, coerce_numeric};
use crate::path::FieldPath;
use crate::schema::{NodeKind, SchemaKind, SchemaNode};
use crate::value::DataValue;

/// Descriptions longer than this hint at a multi-line editor.
pub const MULTILINE_DESCRIPTION_THRESHOLD: usize = 100;

/// Nesting depth past which nodes render as raw editors.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Whether the host shows values or editors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    View,
    Edit,
}

/// One rendered field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub path: FieldPath,
    pub description: String,
    /// Display annotation only; never enforced.
    pub required: bool,
    pub depth: usize,
    pub read_only: bool,
    pub widget: Widget,
}

/// One element of an array-of-objects field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListElement {
    pub index: usize,
    pub path: FieldPath,
    pub summary: DisplaySummary,
    pub fields: Vec<FieldDescriptor>,
}

/// Widget chosen for a field by its schema kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "widget", rename_all = "snake_case")]
pub enum Widget {
    /// Nested form for an object with declared properties.
    Object { fields: Vec<FieldDescriptor> },
    /// View-mode placeholder for an empty object.
    NotSet,
    /// Array of objects; elements can be appended and removed.
    ObjectList {
        style: DisplayStyle,
        elements: Vec<ListElement>,
    },
    /// Array of scalars, edited as a single unit.
    OpaqueList { value: DataValue },
    /// Closed choice over the enum values; `selected` is `None` when the
    /// current value is empty or not one of the options.
    Choice {
        options: Vec<String>,
        selected: Option<String>,
    },
    Text {
        value: String,
        multiline: bool,
        format: Option<String>,
    },
    Numeric { value: Number, integer: bool },
    Toggle { value: bool },
    /// Structured raw-value editor for nodes of unknown kind.
    Raw { value: DataValue },
}

/// Outcome of rendering a whole form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "fields", rename_all = "snake_case")]
pub enum FormView {
    NoProperties,
    Fields(Vec<FieldDescriptor>),
}

impl FormView {
    pub fn fields(&self) -> &[FieldDescriptor] {
        match self {
            FormView::NoProperties => &[],
            FormView::Fields(fields) => fields,
        }
    }
}

/// Render settings shared across one pass.
#[derive(Debug, Clone)]
pub struct Renderer {
    pub mode: Mode,
    pub excluded_fields: BTreeSet<String>,
    pub max_depth: usize,
}

impl Default for Renderer {
    fn default() -> Self {
        Renderer {
            mode: Mode::View,
            excluded_fields: BTreeSet::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Renderer {
    pub fn new(mode: Mode) -> Self {
        Renderer {
            mode,
            ..Default::default()
        }
    }

    /// Skip `fields` at every nesting level.
    pub fn excluding<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Render the top-level form, reporting schemas that declare nothing.
    pub fn render_form(&self, schema: &SchemaNode, data: &DataValue) -> FormView {
        if !schema.has_properties() {
            return FormView::NoProperties;
        }
        FormView::Fields(self.render(schema, data, &FieldPath::root()))
    }

    /// One descriptor per non-excluded property, in declared order.
    pub fn render(
        &self,
        schema: &SchemaNode,
        data: &DataValue,
        path_prefix: &FieldPath,
    ) -> Vec<FieldDescriptor> {
        self.render_fields(schema, data, path_prefix, 0)
    }

    fn render_fields(
        &self,
        schema: &SchemaNode,
        data: &DataValue,
        prefix: &FieldPath,
        depth: usize,
    ) -> Vec<FieldDescriptor> {
        schema
            .properties()
            .filter(|(name, _)| !self.excluded_fields.contains(*name))
            .map(|(name, node)| {
                let path = prefix.child(name);
                let widget = self.widget_for(node, data.get(name), &path, depth);
                FieldDescriptor {
                    name: name.to_string(),
                    path,
                    description: node.description.clone(),
                    required: schema.is_required(name),
                    depth,
                    read_only: self.mode == Mode::View,
                    widget,
                }
            })
            .collect()
    }

    fn widget_for(
        &self,
        node: &SchemaNode,
        value: Option<&DataValue>,
        path: &FieldPath,
        depth: usize,
    ) -> Widget {
        if depth >= self.max_depth {
            return raw_widget(value);
        }

        match &node.kind {
            NodeKind::Object { .. } if node.has_properties() => {
                let current = value.cloned().unwrap_or_default();
                if self.mode == Mode::View && current.is_empty_object() {
                    Widget::NotSet
                } else {
                    Widget::Object {
                        fields: self.render_fields(node, &current, path, depth + 1),
                    }
                }
            }
            NodeKind::Array { items } if items.kind() == Some(SchemaKind::Object) => {
                let mapping = item_mapping(node);
                let style = resolve_style(None, items.display.as_ref(), node.display.as_ref());
                let elements = value
                    .and_then(DataValue::as_array)
                    .unwrap_or_default()
                    .iter()
                    .enumerate()
                    .map(|(index, element)| {
                        let element_path = path.index(index);
                        ListElement {
                            index,
                            summary: resolve(element, mapping.as_ref()),
                            fields: self.render_fields(items, element, &element_path, depth + 1),
                            path: element_path,
                        }
                    })
                    .collect();
                Widget::ObjectList { style, elements }
            }
            NodeKind::Array { .. } => Widget::OpaqueList {
                value: value.cloned().unwrap_or_else(DataValue::empty_array),
            },
            NodeKind::String {
                enum_values: Some(options),
            } => Widget::Choice {
                selected: value
                    .and_then(DataValue::as_str)
                    .filter(|v| options.iter().any(|o| o == v))
                    .map(str::to_string),
                options: options.clone(),
            },
            NodeKind::String { enum_values: None } => Widget::Text {
                value: value.map(DataValue::display_string).unwrap_or_default(),
                multiline: node.format.as_deref() == Some("uri")
                    || node.description.chars().count() > MULTILINE_DESCRIPTION_THRESHOLD,
                format: node.format.clone(),
            },
            NodeKind::Number | NodeKind::Integer => {
                let integer = matches!(node.kind, NodeKind::Integer);
                Widget::Numeric {
                    value: numeric_value(value, integer),
                    integer,
                }
            }
            NodeKind::Boolean => Widget::Toggle {
                value: coerce_boolean(value),
            },
            NodeKind::Object { .. } | NodeKind::Unknown => raw_widget(value),
        }
    }
}

fn raw_widget(value: Option<&DataValue>) -> Widget {
    Widget::Raw {
        value: value.cloned().unwrap_or_else(DataValue::empty_object),
    }
}

fn numeric_value(value: Option<&DataValue>, integer: bool) -> Number {
    let coerced = match value {
        Some(DataValue::Number(n)) if !integer || !n.is_f64() => return n.clone(),
        Some(other) if !other.is_null() => coerce_numeric(&other.display_string(), integer),
        _ => DataValue::integer(0),
    };
    coerced.as_number().cloned().unwrap_or_else(|| Number::from(0))
}

/// Render `schema` against `data`, skipping `excluded_fields` at every level
/// and prefixing paths with `path_prefix`.
pub fn render(
    schema: &SchemaNode,
    data: &DataValue,
    mode: Mode,
    excluded_fields: &[&str],
    path_prefix: &FieldPath,
) -> Vec<FieldDescriptor> {
    Renderer::new(mode)
        .excluding(excluded_fields.iter().copied())
        .render(schema, data, path_prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> SchemaNode {
        SchemaNode::from_document_value(&json!({
            "type": "object",
            "required": ["name"],
            "properties": {
                "id": {"type": "string"},
                "name": {"type": "string", "description": "Display name"},
                "homepage": {"type": "string", "format": "uri"},
                "method": {"type": "string", "enum": ["GET", "POST"]},
                "port": {"type": "integer"},
                "weight": {"type": "number"},
                "enabled": {"type": "boolean"},
                "tags": {"type": "array", "items": {"type": "string"}},
                "owner": {
                    "type": "object",
                    "properties": {"email": {"type": "string"}}
                },
                "extra": {}
            }
        }))
    }

    fn widget<'a>(fields: &'a [FieldDescriptor], name: &str) -> &'a Widget {
        &fields.iter().find(|f| f.name == name).unwrap().widget
    }

    #[test]
    fn fields_follow_declared_order_without_excluded() {
        let fields = render(&schema(), &DataValue::empty_object(), Mode::Edit, &["id"], &FieldPath::root());
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["name", "homepage", "method", "port", "weight", "enabled", "tags", "owner", "extra"]
        );
    }

    #[test]
    fn required_is_annotation_only() {
        let fields = render(&schema(), &DataValue::empty_object(), Mode::Edit, &[], &FieldPath::root());
        let name = fields.iter().find(|f| f.name == "name").unwrap();
        assert!(name.required);
        assert_eq!(name.description, "Display name");
        assert!(!fields.iter().find(|f| f.name == "port").unwrap().required);
    }

    #[test]
    fn kind_dispatch() {
        let data = DataValue::from(json!({
            "method": "PUT",
            "port": 8080,
            "tags": ["a", "b"],
            "extra": {"free": true}
        }));
        let fields = render(&schema(), &data, Mode::Edit, &[], &FieldPath::root());

        assert!(matches!(
            widget(&fields, "homepage"),
            Widget::Text { multiline: true, .. }
        ));
        assert!(matches!(
            widget(&fields, "name"),
            Widget::Text { multiline: false, .. }
        ));
        assert!(matches!(
            widget(&fields, "method"),
            Widget::Choice { selected: None, .. }
        ));
        assert_eq!(
            widget(&fields, "port"),
            &Widget::Numeric { value: Number::from(8080), integer: true }
        );
        assert_eq!(
            widget(&fields, "weight"),
            &Widget::Numeric { value: Number::from(0), integer: false }
        );
        assert_eq!(widget(&fields, "enabled"), &Widget::Toggle { value: false });
        assert_eq!(
            widget(&fields, "tags"),
            &Widget::OpaqueList { value: DataValue::from(json!(["a", "b"])) }
        );
        assert_eq!(
            widget(&fields, "extra"),
            &Widget::Raw { value: DataValue::from(json!({"free": true})) }
        );
    }

    #[test]
    fn enum_value_selected_when_valid() {
        let data = DataValue::from(json!({"method": "POST"}));
        let fields = render(&schema(), &data, Mode::Edit, &[], &FieldPath::root());
        assert!(matches!(
            widget(&fields, "method"),
            Widget::Choice { selected: Some(s), .. } if s == "POST"
        ));
    }

    #[test]
    fn long_description_hints_multiline() {
        let schema = SchemaNode::from_document_value(&json!({
            "properties": {"notes": {"type": "string", "description": "x".repeat(101)}}
        }));
        let fields = render(&schema, &DataValue::Null, Mode::Edit, &[], &FieldPath::root());
        assert!(matches!(fields[0].widget, Widget::Text { multiline: true, .. }));
    }

    #[test]
    fn empty_object_in_view_mode_is_not_set() {
        let view = render(&schema(), &DataValue::empty_object(), Mode::View, &[], &FieldPath::root());
        assert_eq!(widget(&view, "owner"), &Widget::NotSet);
        assert!(view.iter().all(|f| f.read_only));

        let edit = render(&schema(), &DataValue::empty_object(), Mode::Edit, &[], &FieldPath::root());
        match widget(&edit, "owner") {
            Widget::Object { fields } => {
                assert_eq!(fields[0].path.to_string(), "owner.email");
                assert_eq!(fields[0].depth, 1);
            }
            other => panic!("expected nested object, got {other:?}"),
        }
    }

    #[test]
    fn path_prefix_is_applied() {
        let prefix = FieldPath::parse("config.api").unwrap();
        let fields = render(&schema(), &DataValue::Null, Mode::Edit, &[], &prefix);
        assert_eq!(fields[0].path.to_string(), "config.api.id");
    }

    #[test]
    fn numeric_strings_are_coerced_for_display() {
        let data = DataValue::from(json!({"port": "12", "weight": "heavy"}));
        let fields = render(&schema(), &data, Mode::Edit, &[], &FieldPath::root());
        assert_eq!(
            widget(&fields, "port"),
            &Widget::Numeric { value: Number::from(12), integer: true }
        );
        assert_eq!(
            widget(&fields, "weight"),
            &Widget::Numeric { value: Number::from(0), integer: false }
        );
    }

    #[test]
    fn max_depth_turns_nodes_raw() {
        let renderer = Renderer::new(Mode::Edit).with_max_depth(1);
        let data = DataValue::from(json!({"owner": {"email": "a@b"}}));
        let fields = renderer.render(&schema(), &data, &FieldPath::root());
        match widget(&fields, "owner") {
            Widget::Object { fields } => assert_eq!(
                fields[0].widget,
                Widget::Raw { value: DataValue::string("a@b") }
            ),
            other => panic!("expected nested object, got {other:?}"),
        }
    }

    #[test]
    fn form_without_properties() {
        let renderer = Renderer::default();
        let view = renderer.render_form(&SchemaNode::from_document_str("oops"), &DataValue::Null);
        assert_eq!(view, FormView::NoProperties);
        assert!(view.fields().is_empty());
    }

    #[test]
    fn descriptors_serialize_with_widget_tag() {
        let fields = render(
            &schema(),
            &DataValue::from(json!({"enabled": true})),
            Mode::Edit,
            &[],
            &FieldPath::root(),
        );
        let enabled = fields.iter().find(|f| f.name == "enabled").unwrap();
        let json = serde_json::to_value(enabled).unwrap();
        assert_eq!(json["path"], "enabled");
        assert_eq!(json["widget"]["widget"], "toggle");
        assert_eq!(json["widget"]["value"], true);
    }
}
