//! Protodesk remote repository access
//!
//! - `RemoteObjectStore`: the git object operations the rest of the crate uses
//! - `GitHubClient`: REST implementation of the store
//! - `TreeScanner`: batched fetch of a branch's text files
//! - `AtomicCommitter`: single-commit multi-file writes guarded by a
//!   non-forced ref update
//! - `fakes::MemoryObjectStore`: in-memory store for tests

pub mod committer;
pub mod config;
pub mod fakes;
pub mod github;
pub mod obs;
pub mod repo;
pub mod scanner;
pub mod store;

mod error;

pub use committer::{
    AtomicCommitter, CommitError, CommitOutcome, CommitPlan, CommitResult, CommitStage,
};
pub use config::{GitHubConfig, ScanLimits, DEFAULT_API_URL};
pub use error::{RemoteError, RemoteErrorKind};
pub use github::GitHubClient;
pub use repo::RepoCoordinates;
pub use scanner::{decode_blob, ScanResult, TreeScanner};
pub use store::{
    BlobContent, CommitObject, EntryKind, FileChange, RemoteFileEntry, RemoteObjectStore,
    RemoteResult, TreeListing,
};
