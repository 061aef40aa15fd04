//! Protodesk Core Library
//!
//! Re-exports the schema engine and remote components, and adds the pieces
//! binaries share: layered configuration and tracing setup.

pub mod config;
pub mod telemetry;

pub use config::{AppConfig, ConfigError, LogConfig};
pub use telemetry::init_tracing;

pub use protodesk_schema::{
    append_item, coerce_boolean, coerce_numeric, default_value, edit, parse_schema_document,
    remove_item, render, resolve, resolve_list, resolve_style, DataValue, DisplayMapping,
    DisplayStyle, DisplaySummary, FieldDescriptor, FieldPath, FormView, Mode, NodeKind, PathError,
    Renderer, SchemaError, SchemaNode, Widget,
};

pub use protodesk_remote::{
    AtomicCommitter, CommitError, CommitOutcome, CommitPlan, CommitStage, FileChange,
    GitHubClient, GitHubConfig, RemoteError, RemoteErrorKind, RemoteObjectStore, RepoCoordinates,
    ScanLimits, ScanResult, TreeScanner,
};

/// Crate version, shared by every workspace member
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
