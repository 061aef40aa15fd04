//! In-memory fakes for the remote object store (testing only)
//!
//! `MemoryObjectStore` keeps a single repository's refs, commits, trees and
//! blobs in memory. Object ids are sha256 hex digests of the object body, and
//! non-forced ref updates are checked for fast-forward ancestry the way a real
//! host does. Repository coordinates passed to the trait methods are ignored.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::error::RemoteError;
use crate::repo::RepoCoordinates;
use crate::store::{
    BlobContent, CommitObject, EntryKind, FileChange, RemoteFileEntry, RemoteObjectStore,
    RemoteResult, TreeListing,
};

/// GitHub wraps base64 blob bodies at this width.
const BASE64_LINE_WIDTH: usize = 60;

/// path -> blob sha
type Tree = BTreeMap<String, String>;

#[derive(Debug, Default)]
struct RepoState {
    default_branch: String,
    refs: HashMap<String, String>,
    commits: HashMap<String, CommitObject>,
    trees: HashMap<String, Tree>,
    blobs: HashMap<String, String>,
    failing_blobs: HashSet<String>,
    raw_blobs: HashSet<String>,
}

/// In-memory repository implementing `RemoteObjectStore`.
#[derive(Debug)]
pub struct MemoryObjectStore {
    state: Mutex<RepoState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    blob_requests: AtomicUsize,
    ref_updates: AtomicUsize,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new("main")
    }
}

impl MemoryObjectStore {
    /// Repository whose default branch holds one empty root commit.
    pub fn new(default_branch: &str) -> Self {
        let store = MemoryObjectStore {
            state: Mutex::new(RepoState {
                default_branch: default_branch.to_string(),
                ..RepoState::default()
            }),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            blob_requests: AtomicUsize::new(0),
            ref_updates: AtomicUsize::new(0),
        };
        {
            let mut state = store.lock();
            let tree_sha = state.insert_tree(Tree::new());
            let root = state.insert_commit(&tree_sha, Vec::new(), "Initial commit");
            state.refs.insert(default_branch.to_string(), root);
        }
        store
    }

    /// Repository seeded with `files` on its default branch.
    pub fn with_files(default_branch: &str, files: &[(&str, &str)]) -> Self {
        let store = Self::new(default_branch);
        let changes: Vec<FileChange> = files
            .iter()
            .map(|(path, content)| FileChange::new(*path, *content))
            .collect();
        store.push_commit(default_branch, &changes, "Seed files");
        store
    }

    fn lock(&self) -> MutexGuard<'_, RepoState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Commit `files` on top of `branch` and move it there, as another writer
    /// would. Creates the branch from the default branch if it is missing.
    pub fn push_commit(&self, branch: &str, files: &[FileChange], message: &str) -> String {
        let mut state = self.lock();
        let parent = match state.refs.get(branch) {
            Some(sha) => sha.clone(),
            None => state.refs[&state.default_branch].clone(),
        };
        let mut tree = state.tree_of_commit(&parent).cloned().unwrap_or_default();
        for file in files {
            let blob = state.insert_blob(&file.content);
            tree.insert(file.path.clone(), blob);
        }
        let tree_sha = state.insert_tree(tree);
        let sha = state.insert_commit(&tree_sha, vec![parent], message);
        state.refs.insert(branch.to_string(), sha.clone());
        sha
    }

    /// Current head of `branch`.
    pub fn ref_sha(&self, branch: &str) -> Option<String> {
        self.lock().refs.get(branch).cloned()
    }

    pub fn commit(&self, sha: &str) -> Option<CommitObject> {
        self.lock().commits.get(sha).cloned()
    }

    /// Decoded content of `path` at the head of `branch`.
    pub fn file_content(&self, branch: &str, path: &str) -> Option<String> {
        let state = self.lock();
        let head = state.refs.get(branch)?;
        let blob = state.tree_of_commit(head)?.get(path)?;
        state.blobs.get(blob).cloned()
    }

    /// Blob sha of `path` at the head of `branch`.
    pub fn blob_ref(&self, branch: &str, path: &str) -> Option<String> {
        let state = self.lock();
        let head = state.refs.get(branch)?;
        state.tree_of_commit(head)?.get(path).cloned()
    }

    /// Make every `get_blob` for `content_ref` fail.
    pub fn fail_blob(&self, content_ref: &str) {
        self.lock().failing_blobs.insert(content_ref.to_string());
    }

    /// Serve `content_ref` as plain text with `encoding: "utf-8"`.
    pub fn serve_raw(&self, content_ref: &str) {
        self.lock().raw_blobs.insert(content_ref.to_string());
    }

    /// Highest number of concurrently outstanding `get_blob` calls seen.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn blob_requests(&self) -> usize {
        self.blob_requests.load(Ordering::SeqCst)
    }

    /// Number of `update_ref` calls, successful or not.
    pub fn ref_updates(&self) -> usize {
        self.ref_updates.load(Ordering::SeqCst)
    }
}

fn digest(kind: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update([0u8]);
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

fn encode_wrapped(content: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(content);
    encoded
        .as_bytes()
        .chunks(BASE64_LINE_WIDTH)
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}

impl RepoState {
    fn insert_blob(&mut self, content: &str) -> String {
        let sha = digest("blob", content);
        self.blobs.insert(sha.clone(), content.to_string());
        sha
    }

    fn insert_tree(&mut self, tree: Tree) -> String {
        let body: String = tree
            .iter()
            .map(|(path, blob)| format!("{path}\t{blob}\n"))
            .collect();
        let sha = digest("tree", &body);
        self.trees.insert(sha.clone(), tree);
        sha
    }

    fn insert_commit(&mut self, tree_sha: &str, parents: Vec<String>, message: &str) -> String {
        let body = format!("{tree_sha}\n{}\n{message}", parents.join(","));
        let sha = digest("commit", &body);
        self.commits.insert(
            sha.clone(),
            CommitObject {
                sha: sha.clone(),
                tree_sha: tree_sha.to_string(),
                parents,
                message: message.to_string(),
            },
        );
        sha
    }

    fn tree_of_commit(&self, sha: &str) -> Option<&Tree> {
        let commit = self.commits.get(sha)?;
        self.trees.get(&commit.tree_sha)
    }

    /// Whether `ancestor` is reachable from `descendant` through parents.
    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> bool {
        let mut queue = VecDeque::from([descendant.to_string()]);
        let mut seen = HashSet::new();
        while let Some(sha) = queue.pop_front() {
            if sha == ancestor {
                return true;
            }
            if !seen.insert(sha.clone()) {
                continue;
            }
            if let Some(commit) = self.commits.get(&sha) {
                queue.extend(commit.parents.iter().cloned());
            }
        }
        false
    }

    /// Resolve a branch name or tree sha to a tree.
    fn resolve_tree(&self, reference: &str) -> Option<&Tree> {
        match self.refs.get(reference) {
            Some(head) => self.tree_of_commit(head),
            None => self.trees.get(reference),
        }
    }
}

/// Blob entries plus one synthesized entry per intermediate directory.
fn listing_entries(tree: &Tree, blobs: &HashMap<String, String>) -> Vec<RemoteFileEntry> {
    let mut directories = BTreeSet::new();
    for path in tree.keys() {
        let mut prefix = path.as_str();
        while let Some((parent, _)) = prefix.rsplit_once('/') {
            directories.insert(parent.to_string());
            prefix = parent;
        }
    }

    let mut entries: Vec<RemoteFileEntry> = directories
        .into_iter()
        .map(|dir| RemoteFileEntry {
            content_ref: digest("tree", &dir),
            path: dir,
            size: 0,
            kind: EntryKind::Tree,
        })
        .collect();
    entries.extend(tree.iter().map(|(path, blob)| RemoteFileEntry {
        path: path.clone(),
        size: blobs.get(blob).map(|c| c.len() as u64).unwrap_or(0),
        kind: EntryKind::Blob,
        content_ref: blob.clone(),
    }));
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    entries
}

#[async_trait]
impl RemoteObjectStore for MemoryObjectStore {
    async fn default_branch(&self, _repo: &RepoCoordinates) -> RemoteResult<String> {
        Ok(self.lock().default_branch.clone())
    }

    async fn get_ref(&self, _repo: &RepoCoordinates, branch: &str) -> RemoteResult<String> {
        self.lock()
            .refs
            .get(branch)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("ref heads/{branch}")))
    }

    async fn get_commit(&self, _repo: &RepoCoordinates, sha: &str) -> RemoteResult<CommitObject> {
        self.lock()
            .commits
            .get(sha)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("commit {sha}")))
    }

    async fn create_tree(
        &self,
        _repo: &RepoCoordinates,
        base_tree_sha: &str,
        entries: &[FileChange],
    ) -> RemoteResult<String> {
        let mut state = self.lock();
        let mut tree = state
            .trees
            .get(base_tree_sha)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("tree {base_tree_sha}")))?;
        for entry in entries {
            let blob = state.insert_blob(&entry.content);
            tree.insert(entry.path.clone(), blob);
        }
        Ok(state.insert_tree(tree))
    }

    async fn create_commit(
        &self,
        _repo: &RepoCoordinates,
        tree_sha: &str,
        parents: &[String],
        message: &str,
    ) -> RemoteResult<String> {
        let mut state = self.lock();
        if !state.trees.contains_key(tree_sha) {
            return Err(RemoteError::NotFound(format!("tree {tree_sha}")));
        }
        if let Some(missing) = parents.iter().find(|p| !state.commits.contains_key(*p)) {
            return Err(RemoteError::NotFound(format!("commit {missing}")));
        }
        Ok(state.insert_commit(tree_sha, parents.to_vec(), message))
    }

    async fn update_ref(
        &self,
        _repo: &RepoCoordinates,
        branch: &str,
        sha: &str,
        force: bool,
    ) -> RemoteResult<()> {
        self.ref_updates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        let current = state
            .refs
            .get(branch)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("ref heads/{branch}")))?;
        if !state.commits.contains_key(sha) {
            return Err(RemoteError::NotFound(format!("commit {sha}")));
        }
        if !force && !state.is_ancestor(&current, sha) {
            return Err(RemoteError::Conflict {
                branch: branch.to_string(),
                message: "Update is not a fast forward".to_string(),
            });
        }
        state.refs.insert(branch.to_string(), sha.to_string());
        Ok(())
    }

    async fn get_tree_recursive(
        &self,
        _repo: &RepoCoordinates,
        branch: &str,
    ) -> RemoteResult<TreeListing> {
        let state = self.lock();
        let tree = state
            .resolve_tree(branch)
            .ok_or_else(|| RemoteError::NotFound(format!("tree {branch}")))?;
        Ok(TreeListing {
            entries: listing_entries(tree, &state.blobs),
            truncated: false,
        })
    }

    async fn get_blob(&self, _repo: &RepoCoordinates, content_ref: &str) -> RemoteResult<BlobContent> {
        self.blob_requests.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        // Let sibling requests start before this one completes.
        tokio::task::yield_now().await;

        let result = {
            let state = self.lock();
            if state.failing_blobs.contains(content_ref) {
                Err(RemoteError::Status {
                    status: 500,
                    message: format!("blob {content_ref} unavailable"),
                })
            } else {
                match state.blobs.get(content_ref) {
                    Some(content) if state.raw_blobs.contains(content_ref) => Ok(BlobContent {
                        content: content.clone(),
                        encoding: "utf-8".to_string(),
                    }),
                    Some(content) => Ok(BlobContent {
                        content: encode_wrapped(content),
                        encoding: "base64".to_string(),
                    }),
                    None => Err(RemoteError::NotFound(format!("blob {content_ref}"))),
                }
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
