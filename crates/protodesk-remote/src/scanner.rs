//! Remote tree scanner
//!
//! Lists a branch once, keeps eligible blobs, and fetches their contents in
//! sequential batches of concurrent requests. Per-file fetch failures and
//! non-base64 blobs are dropped from the result and logged; they never abort
//! the scan.

use std::sync::Arc;

use base64::Engine;
use futures::future::join_all;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, Instrument};

use crate::config::ScanLimits;
use crate::error::RemoteError;
use crate::obs;
use crate::repo::RepoCoordinates;
use crate::store::{BlobContent, EntryKind, RemoteFileEntry, RemoteObjectStore, RemoteResult};

/// Outcome of a scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    /// Branch that was scanned
    pub branch: String,
    /// path -> decoded text, in listing order
    pub files: IndexMap<String, String>,
    /// More eligible files existed than `max_files`
    pub truncated: bool,
    /// Number of entries in the tree listing, directories included
    pub total_entries: usize,
    /// The host itself cut the listing short
    pub listing_truncated: bool,
}

/// Scans remote branches for text files
#[derive(Clone)]
pub struct TreeScanner {
    store: Arc<dyn RemoteObjectStore>,
    limits: ScanLimits,
}

impl TreeScanner {
    pub fn new(store: Arc<dyn RemoteObjectStore>) -> Self {
        Self::with_limits(store, ScanLimits::default())
    }

    pub fn with_limits(store: Arc<dyn RemoteObjectStore>, limits: ScanLimits) -> Self {
        TreeScanner { store, limits }
    }

    pub fn limits(&self) -> ScanLimits {
        self.limits
    }

    /// Scan `branch`, or the repository's default branch when `None`.
    ///
    /// Only the branch lookup and the listing can fail the scan.
    pub async fn scan(&self, repo: &RepoCoordinates, branch: Option<&str>) -> RemoteResult<ScanResult> {
        self.scan_inner(repo, branch)
            .instrument(obs::operation_span("scan", repo))
            .await
    }

    async fn scan_inner(&self, repo: &RepoCoordinates, branch: Option<&str>) -> RemoteResult<ScanResult> {
        let branch = match branch {
            Some(b) => b.to_string(),
            None => self.store.default_branch(repo).await?,
        };
        obs::emit_scan_started(repo, &branch);

        let listing = self.store.get_tree_recursive(repo, &branch).await?;
        let total_entries = listing.entries.len();

        let (candidates, truncated) = select_candidates(&listing.entries, &self.limits);
        let batch_size = self.limits.batch_size.max(1);

        let mut files = IndexMap::with_capacity(candidates.len());
        for (index, batch) in candidates.chunks(batch_size).enumerate() {
            debug!(batch = index, size = batch.len(), "fetching blob batch");
            let fetched = join_all(
                batch
                    .iter()
                    .map(|entry| self.store.get_blob(repo, &entry.content_ref)),
            )
            .await;

            for (entry, result) in batch.iter().zip(fetched) {
                match result.and_then(|blob| decode_blob(&blob)) {
                    Ok(text) => {
                        files.insert(entry.path.clone(), text);
                    }
                    Err(e) => obs::emit_entry_dropped(&entry.path, &e),
                }
            }
        }

        obs::emit_scan_finished(repo, files.len(), total_entries, truncated);
        Ok(ScanResult {
            branch,
            files,
            truncated,
            total_entries,
            listing_truncated: listing.truncated,
        })
    }
}

/// Blobs under the size limit, capped at `max_files` in listing order.
fn select_candidates<'a>(
    entries: &'a [RemoteFileEntry],
    limits: &ScanLimits,
) -> (Vec<&'a RemoteFileEntry>, bool) {
    let mut eligible = entries
        .iter()
        .filter(|e| e.kind == EntryKind::Blob && e.size < limits.max_file_size);
    let candidates: Vec<_> = eligible.by_ref().take(limits.max_files).collect();
    let truncated = eligible.next().is_some();
    (candidates, truncated)
}

/// Decode a base64 blob body into text. Invalid UTF-8 is replaced lossily.
pub fn decode_blob(blob: &BlobContent) -> RemoteResult<String> {
    if blob.encoding != "base64" {
        return Err(RemoteError::UnexpectedResponse(format!(
            "unsupported blob encoding {:?}",
            blob.encoding
        )));
    }
    let compact: String = blob.content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| RemoteError::UnexpectedResponse(format!("invalid base64 blob: {e}")))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
