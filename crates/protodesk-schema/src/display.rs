//! List display resolution.
//!
//! Derives the `{title, description, type}` projection shown for an item in
//! a collection, plus the visual style, from a schema's `display_mapping`.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::Serialize;

use crate::schema::{DisplayMapping, SchemaNode};
use crate::value::DataValue;

/// Visual style for list items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayStyle {
    #[default]
    Compact,
    Badge,
    BadgeImage,
}

impl DisplayStyle {
    /// Parse a style name; unknown names become [`DisplayStyle::Compact`].
    pub fn parse_or_default(name: &str) -> Self {
        match name {
            "compact" => DisplayStyle::Compact,
            "badge" => DisplayStyle::Badge,
            "badge-image" => DisplayStyle::BadgeImage,
            _ => DisplayStyle::Compact,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayStyle::Compact => "compact",
            DisplayStyle::Badge => "badge",
            DisplayStyle::BadgeImage => "badge-image",
        }
    }
}

/// Compact projection of one collection item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisplaySummary {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub type_label: String,
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([^{}]+)\}").expect("valid regex"))
}

fn field_text(item: &DataValue, field: &str) -> String {
    item.get(field).map(DataValue::display_string).unwrap_or_default()
}

/// Resolve one template against an item.
///
/// A template with `{field}` placeholders is interpolated, leaving the other
/// text intact. A template without placeholders names a single field.
pub fn resolve_template(template: &str, item: &DataValue) -> String {
    let pattern = placeholder_pattern();
    if pattern.is_match(template) {
        pattern
            .replace_all(template, |caps: &Captures<'_>| field_text(item, &caps[1]))
            .into_owned()
    } else {
        field_text(item, template)
    }
}

/// Compute the display projection of `item`.
///
/// `title` falls back to the item's `id`; the other outputs fall back to an
/// empty string.
pub fn resolve(item: &DataValue, mapping: Option<&DisplayMapping>) -> DisplaySummary {
    let apply = |template: Option<&String>| {
        template
            .map(|t| resolve_template(t, item))
            .unwrap_or_default()
    };

    let mut title = apply(mapping.and_then(|m| m.title.as_ref()));
    if title.is_empty() {
        title = field_text(item, "id");
    }

    DisplaySummary {
        title,
        description: apply(mapping.and_then(|m| m.description.as_ref())),
        type_label: apply(mapping.and_then(|m| m.type_template.as_ref())),
    }
}

/// Pick the style from the nearest scope that declares one.
///
/// Order: caller override, array-item mapping, object-level mapping, then
/// [`DisplayStyle::Compact`]. The nearest declared name wins even when it is
/// unknown, in which case it coerces to compact.
pub fn resolve_style(
    override_style: Option<&str>,
    item_mapping: Option<&DisplayMapping>,
    object_mapping: Option<&DisplayMapping>,
) -> DisplayStyle {
    override_style
        .or_else(|| item_mapping.and_then(|m| m.style.as_deref()))
        .or_else(|| object_mapping.and_then(|m| m.style.as_deref()))
        .map(DisplayStyle::parse_or_default)
        .unwrap_or_default()
}

/// Display mapping for items of an array node.
///
/// The items' own mapping wins; the array-level mapping supplies templates
/// it does not set.
pub fn item_mapping(array_schema: &SchemaNode) -> Option<DisplayMapping> {
    let item = array_schema.items().and_then(|i| i.display.as_ref());
    let outer = array_schema.display.as_ref();
    match (item, outer) {
        (None, None) => None,
        (Some(m), None) | (None, Some(m)) => Some(m.clone()),
        (Some(inner), Some(outer)) => Some(DisplayMapping {
            title: inner.title.clone().or_else(|| outer.title.clone()),
            description: inner
                .description
                .clone()
                .or_else(|| outer.description.clone()),
            type_template: inner
                .type_template
                .clone()
                .or_else(|| outer.type_template.clone()),
            style: inner.style.clone().or_else(|| outer.style.clone()),
        }),
    }
}

/// Summaries for every element of a collection described by `array_schema`.
pub fn resolve_list(
    items: &[DataValue],
    array_schema: &SchemaNode,
    override_style: Option<&str>,
) -> (DisplayStyle, Vec<DisplaySummary>) {
    let style = resolve_style(
        override_style,
        array_schema.items().and_then(|i| i.display.as_ref()),
        array_schema.display.as_ref(),
    );
    let mapping = item_mapping(array_schema);
    let summaries = items
        .iter()
        .map(|item| resolve(item, mapping.as_ref()))
        .collect();
    (style, summaries)
}
