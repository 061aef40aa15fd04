//! Structured observability hooks for scan and commit operations.
//!
//! Every emission carries an `event` field so log pipelines can filter on it
//! regardless of the human-readable message.

use tracing::{info, warn};

use crate::repo::RepoCoordinates;

/// Span tagging an async remote operation with `op` and `repo`.
///
/// Attach with `tracing::Instrument::instrument` rather than entering it, so
/// the span follows the future across await points.
pub fn operation_span(op: &'static str, repo: &RepoCoordinates) -> tracing::Span {
    tracing::info_span!("protodesk.remote", op = op, repo = %repo)
}

pub fn emit_scan_started(repo: &RepoCoordinates, branch: &str) {
    info!(event = "scan.started", repo = %repo, branch = %branch);
}

pub fn emit_scan_finished(repo: &RepoCoordinates, files: usize, total_entries: usize, truncated: bool) {
    info!(
        event = "scan.finished",
        repo = %repo,
        files = files,
        total_entries = total_entries,
        truncated = truncated,
    );
}

/// A file left out of a scan result (fetch failure or unsupported encoding).
pub fn emit_entry_dropped(path: &str, reason: &dyn std::fmt::Display) {
    warn!(event = "scan.entry_dropped", path = %path, reason = %reason);
}

pub fn emit_commit_stage(branch: &str, stage: &dyn std::fmt::Display) {
    tracing::debug!(event = "commit.stage", branch = %branch, stage = %stage);
}

pub fn emit_commit_finished(repo: &RepoCoordinates, branch: &str, commit_sha: &str, files: usize) {
    info!(
        event = "commit.finished",
        repo = %repo,
        branch = %branch,
        commit_sha = %commit_sha,
        files = files,
    );
}

pub fn emit_commit_conflict(repo: &RepoCoordinates, branch: &str, base_commit_sha: &str) {
    warn!(
        event = "commit.conflict",
        repo = %repo,
        branch = %branch,
        base_commit_sha = %base_commit_sha,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_span_create() {
        let repo = RepoCoordinates::new("octo", "demo");
        let span = operation_span("scan", &repo);
        let _guard = span.enter();
        emit_scan_started(&repo, "main");
    }
}
