//! Error types for protodesk-schema

use thiserror::Error;

/// Errors raised while reading a schema document.
///
/// The render entry points never surface these; they fall back to the empty
/// object schema instead.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Document text is not valid JSON
    #[error("Schema document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Document parsed but is not a JSON object
    #[error("Schema document must be an object, got {0}")]
    NotAnObject(String),
}

/// Errors raised while parsing a field path string.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PathError {
    #[error("field path is empty")]
    Empty,

    #[error("field path {0:?} contains an empty segment")]
    EmptySegment(String),
}
