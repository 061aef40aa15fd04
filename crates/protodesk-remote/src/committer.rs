//! Atomic multi-file commits
//!
//! A commit runs as a fixed sequence of remote calls:
//!
//! ```text
//! ResolveHead -> ResolveBaseTree -> BuildTree -> CreateCommit -> UpdateRef
//! ```
//!
//! The only atomicity mechanism is the non-forced ref update at the end: if
//! the branch moved since `ResolveHead`, the host rejects it and the caller
//! gets a conflict. Nothing is retried. Objects created before a failed step
//! stay unreachable on the host.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::Instrument;

use crate::error::{RemoteError, RemoteErrorKind};
use crate::obs;
use crate::repo::RepoCoordinates;
use crate::store::{FileChange, RemoteObjectStore};

/// Step of the commit sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStage {
    /// Local checks before any remote call
    Validate,
    ResolveHead,
    ResolveBaseTree,
    BuildTree,
    CreateCommit,
    UpdateRef,
}

impl CommitStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitStage::Validate => "validate",
            CommitStage::ResolveHead => "resolve_head",
            CommitStage::ResolveBaseTree => "resolve_base_tree",
            CommitStage::BuildTree => "build_tree",
            CommitStage::CreateCommit => "create_commit",
            CommitStage::UpdateRef => "update_ref",
        }
    }
}

impl fmt::Display for CommitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commit failure tagged with the step it happened at
#[derive(Error, Debug)]
#[error("commit failed at {stage}: {source}")]
pub struct CommitError {
    pub stage: CommitStage,
    #[source]
    pub source: RemoteError,
}

impl CommitError {
    fn at(stage: CommitStage) -> impl FnOnce(RemoteError) -> CommitError {
        move |source| CommitError { stage, source }
    }

    pub fn kind(&self) -> RemoteErrorKind {
        self.source.kind()
    }

    /// The branch moved under us; re-plan from a fresh head and retry.
    pub fn is_conflict(&self) -> bool {
        self.source.is_conflict()
    }
}

pub type CommitResult<T> = std::result::Result<T, CommitError>;

/// Everything needed to build the commit, pinned to one base commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitPlan {
    pub repo: RepoCoordinates,
    pub base_branch: String,
    pub base_commit_sha: String,
    pub base_tree_sha: String,
    pub files: Vec<FileChange>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitOutcome {
    pub commit_sha: String,
    pub files_count: usize,
    pub branch: String,
}

/// Commits file sets to a branch with compare-and-swap ref semantics
#[derive(Clone)]
pub struct AtomicCommitter {
    store: Arc<dyn RemoteObjectStore>,
}

impl AtomicCommitter {
    pub fn new(store: Arc<dyn RemoteObjectStore>) -> Self {
        AtomicCommitter { store }
    }

    /// Resolve the branch head and its tree, producing a plan pinned to it.
    pub async fn plan(
        &self,
        repo: &RepoCoordinates,
        branch: &str,
        files: Vec<FileChange>,
        message: &str,
    ) -> CommitResult<CommitPlan> {
        validate(&files, message).map_err(CommitError::at(CommitStage::Validate))?;

        obs::emit_commit_stage(branch, &CommitStage::ResolveHead);
        let base_commit_sha = self
            .store
            .get_ref(repo, branch)
            .await
            .map_err(CommitError::at(CommitStage::ResolveHead))?;

        obs::emit_commit_stage(branch, &CommitStage::ResolveBaseTree);
        let base_commit = self
            .store
            .get_commit(repo, &base_commit_sha)
            .await
            .map_err(CommitError::at(CommitStage::ResolveBaseTree))?;

        Ok(CommitPlan {
            repo: repo.clone(),
            base_branch: branch.to_string(),
            base_commit_sha,
            base_tree_sha: base_commit.tree_sha,
            files,
            message: message.to_string(),
        })
    }

    /// Build the tree and commit, then move the branch without force.
    pub async fn execute(&self, plan: &CommitPlan) -> CommitResult<CommitOutcome> {
        let repo = &plan.repo;
        let branch = plan.base_branch.as_str();
        validate(&plan.files, &plan.message).map_err(CommitError::at(CommitStage::Validate))?;

        obs::emit_commit_stage(branch, &CommitStage::BuildTree);
        let tree_sha = self
            .store
            .create_tree(repo, &plan.base_tree_sha, &plan.files)
            .await
            .map_err(CommitError::at(CommitStage::BuildTree))?;

        obs::emit_commit_stage(branch, &CommitStage::CreateCommit);
        let parents = [plan.base_commit_sha.clone()];
        let commit_sha = self
            .store
            .create_commit(repo, &tree_sha, &parents, &plan.message)
            .await
            .map_err(CommitError::at(CommitStage::CreateCommit))?;

        obs::emit_commit_stage(branch, &CommitStage::UpdateRef);
        if let Err(e) = self.store.update_ref(repo, branch, &commit_sha, false).await {
            if e.is_conflict() {
                obs::emit_commit_conflict(repo, branch, &plan.base_commit_sha);
            }
            return Err(CommitError::at(CommitStage::UpdateRef)(e));
        }

        obs::emit_commit_finished(repo, branch, &commit_sha, plan.files.len());
        Ok(CommitOutcome {
            commit_sha,
            files_count: plan.files.len(),
            branch: branch.to_string(),
        })
    }

    /// `plan` followed by `execute`.
    pub async fn commit_files(
        &self,
        repo: &RepoCoordinates,
        branch: &str,
        files: Vec<FileChange>,
        message: &str,
    ) -> CommitResult<CommitOutcome> {
        async {
            let plan = self.plan(repo, branch, files, message).await?;
            self.execute(&plan).await
        }
        .instrument(obs::operation_span("commit", repo))
        .await
    }
}

fn validate(files: &[FileChange], message: &str) -> Result<(), RemoteError> {
    if files.is_empty() {
        return Err(RemoteError::InvalidPlan("no files to commit".to_string()));
    }
    if message.trim().is_empty() {
        return Err(RemoteError::InvalidPlan("commit message is empty".to_string()));
    }
    if let Some(file) = files.iter().find(|f| f.path.trim().is_empty()) {
        return Err(RemoteError::InvalidPlan(format!(
            "file path is empty (content length {})",
            file.content.len()
        )));
    }
    Ok(())
}
