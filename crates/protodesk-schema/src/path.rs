//! Dot-and-index field paths (`parameters.2.name`).

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::PathError;
use crate::value::DataValue;

/// Location of a field inside a `DataValue`.
///
/// Segments are stored unparsed; a numeric segment addresses an array
/// element when the value at that level is an array and an object key
/// otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// The empty path, addressing the whole value.
    pub fn root() -> Self {
        FieldPath(Vec::new())
    }

    /// Parse a dotted path. An empty string parses to the root path.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if path.is_empty() {
            return Ok(FieldPath::root());
        }
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(PathError::EmptySegment(path.to_string()));
        }
        Ok(FieldPath(segments))
    }

    /// Parse a path that must address something below the root.
    pub fn parse_non_root(path: &str) -> Result<Self, PathError> {
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        Self::parse(path)
    }

    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        FieldPath(segments)
    }

    pub fn index(&self, index: usize) -> Self {
        self.child(&index.to_string())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve the path against `data`.
    pub fn lookup<'a>(&self, data: &'a DataValue) -> Option<&'a DataValue> {
        self.0.iter().try_fold(data, |node, segment| match node {
            DataValue::Array(_) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| node.get_index(i)),
            _ => node.get(segment),
        })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl std::str::FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldPath::parse(s)
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
