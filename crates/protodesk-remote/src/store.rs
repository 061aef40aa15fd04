//! Remote object-store abstraction
//!
//! The scanner and committer only talk to a repository host through
//! `RemoteObjectStore`: ref lookup, commit lookup, tree/commit creation, ref
//! update, recursive tree listing and blob fetch. `GitHubClient` implements
//! it over the REST API; `fakes::MemoryObjectStore` implements it in memory.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;
use crate::repo::RepoCoordinates;

/// Result type for remote operations
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Kind of an entry in a tree listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    /// Submodule pointer
    Commit,
}

/// One entry of a recursive tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileEntry {
    pub path: String,
    /// Size in bytes; zero for directories.
    pub size: u64,
    pub kind: EntryKind,
    /// Handle passed back to `get_blob`.
    pub content_ref: String,
}

impl RemoteFileEntry {
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Tree
    }
}

/// Full recursive listing of a branch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeListing {
    pub entries: Vec<RemoteFileEntry>,
    /// Set when the host itself cut the listing short.
    pub truncated: bool,
}

/// Commit object as returned by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitObject {
    pub sha: String,
    pub tree_sha: String,
    pub parents: Vec<String>,
    pub message: String,
}

/// Encoded blob body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobContent {
    pub content: String,
    pub encoding: String,
}

/// A file to add or overwrite in a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub content: String,
}

impl FileChange {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        FileChange {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Remote git object graph.
///
/// Every call is a single request/response exchange; implementations add no
/// retries of their own.
#[async_trait]
pub trait RemoteObjectStore: Send + Sync {
    /// Name of the repository's default branch.
    async fn default_branch(&self, repo: &RepoCoordinates) -> RemoteResult<String>;

    /// Commit sha the branch currently points at.
    async fn get_ref(&self, repo: &RepoCoordinates, branch: &str) -> RemoteResult<String>;

    async fn get_commit(&self, repo: &RepoCoordinates, sha: &str) -> RemoteResult<CommitObject>;

    /// Create a tree on top of `base_tree_sha` that adds or overwrites
    /// `entries` as regular-file blobs with inline content.
    async fn create_tree(
        &self,
        repo: &RepoCoordinates,
        base_tree_sha: &str,
        entries: &[FileChange],
    ) -> RemoteResult<String>;

    async fn create_commit(
        &self,
        repo: &RepoCoordinates,
        tree_sha: &str,
        parents: &[String],
        message: &str,
    ) -> RemoteResult<String>;

    /// Move the branch to `sha`. With `force == false` the host must reject
    /// anything that is not a fast-forward with `RemoteError::Conflict`.
    async fn update_ref(
        &self,
        repo: &RepoCoordinates,
        branch: &str,
        sha: &str,
        force: bool,
    ) -> RemoteResult<()>;

    async fn get_tree_recursive(
        &self,
        repo: &RepoCoordinates,
        branch: &str,
    ) -> RemoteResult<TreeListing>;

    async fn get_blob(&self, repo: &RepoCoordinates, content_ref: &str) -> RemoteResult<BlobContent>;
}
