//! Protodesk-Schema: schema-driven data editing
//!
//! This crate interprets a JSON-Schema-like document at runtime to describe
//! an editable form over arbitrary nested data, and to summarise collection
//! items for list views.
//!
//! ## Key Components
//!
//! - `SchemaNode`: closed, parsed form of a schema document
//! - `Renderer` / `render`: schema + data + mode → `FieldDescriptor` tree
//! - `edit` / `append_item` / `remove_item`: path-copy updates on `DataValue`
//! - `display::resolve`: `{title, description, type}` projection and style

pub mod display;
pub mod edit;
mod error;
pub mod path;
pub mod render;
pub mod schema;
pub mod value;

pub use display::{
    item_mapping, resolve, resolve_list, resolve_style, resolve_template, DisplayStyle,
    DisplaySummary,
};
pub use edit::{
    append_item, coerce_boolean, coerce_numeric, default_value, edit, remove_item,
    MAX_ARRAY_PADDING,
};
pub use error::{PathError, SchemaError};
pub use path::FieldPath;
pub use render::{render, FieldDescriptor, FormView, ListElement, Mode, Renderer, Widget};
pub use schema::{parse_schema_document, DisplayMapping, NodeKind, SchemaKind, SchemaNode};
pub use value::{DataValue, ObjectMap};
