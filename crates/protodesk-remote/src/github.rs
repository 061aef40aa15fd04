//! GitHub REST client
//!
//! Implements `RemoteObjectStore` over the git data API
//! (`/repos/{owner}/{repo}/git/...`). Authentication is a bearer token taken
//! from the config; callers holding per-user credentials derive a client with
//! [`GitHubClient::with_token`], which shares the connection pool.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GitHubConfig;
use crate::error::RemoteError;
use crate::repo::RepoCoordinates;
use crate::store::{
    BlobContent, CommitObject, EntryKind, FileChange, RemoteFileEntry, RemoteObjectStore,
    RemoteResult, TreeListing,
};

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";
const REGULAR_FILE_MODE: &str = "100644";

/// GitHub client for git object operations
#[derive(Clone)]
pub struct GitHubClient {
    config: GitHubConfig,
    http_client: reqwest::Client,
}

impl GitHubClient {
    /// Create a new GitHub client
    pub fn new(config: GitHubConfig) -> RemoteResult<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        let http_client = builder.build()?;

        Ok(GitHubClient {
            config,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> RemoteResult<Self> {
        Self::new(GitHubConfig::from_env())
    }

    /// Same client acting with a different access token
    pub fn with_token(&self, token: &str) -> Self {
        GitHubClient {
            config: self.config.clone().with_token(token),
            http_client: self.http_client.clone(),
        }
    }

    pub fn config(&self) -> &GitHubConfig {
        &self.config
    }

    fn repo_url(&self, repo: &RepoCoordinates, tail: &str) -> String {
        repo_url(&self.config.api_url, repo, tail)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self
            .http_client
            .request(method, url)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION);
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and decode a JSON response; non-2xx statuses go through
    /// `classify` so call sites can map specific statuses.
    async fn send<T, F>(&self, builder: RequestBuilder, what: &str, classify: F) -> RemoteResult<T>
    where
        T: DeserializeOwned,
        F: FnOnce(StatusCode, String) -> RemoteError,
    {
        let response = builder.send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), what = %what, "github response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify(status, error_message(&body)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::UnexpectedResponse(format!("{what}: {e}")))
    }
}

fn repo_url(api_url: &str, repo: &RepoCoordinates, tail: &str) -> String {
    let base = format!(
        "{}/repos/{}/{}",
        api_url.trim_end_matches('/'),
        repo.owner,
        repo.name
    );
    if tail.is_empty() {
        base
    } else {
        format!("{base}/{tail}")
    }
}

/// Pull the `message` field out of a GitHub error body when there is one.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// Default status mapping: 404 is `NotFound`, everything else is generic.
fn status_error(what: &str) -> impl FnOnce(StatusCode, String) -> RemoteError + '_ {
    move |status, message| {
        if status == StatusCode::NOT_FOUND {
            RemoteError::NotFound(format!("{what}: {message}"))
        } else {
            RemoteError::Status {
                status: status.as_u16(),
                message,
            }
        }
    }
}

/// Ref updates report a moved branch as a conflict. GitHub answers 409, or
/// 422 with "not a fast forward"; a 422 naming a missing ref or object is a
/// lookup failure instead.
fn ref_update_error(branch: &str) -> impl FnOnce(StatusCode, String) -> RemoteError + '_ {
    move |status, message| {
        let lowered = message.to_ascii_lowercase();
        match status {
            StatusCode::CONFLICT => RemoteError::Conflict {
                branch: branch.to_string(),
                message,
            },
            StatusCode::UNPROCESSABLE_ENTITY if lowered.contains("fast forward") => {
                RemoteError::Conflict {
                    branch: branch.to_string(),
                    message,
                }
            }
            StatusCode::UNPROCESSABLE_ENTITY
                if lowered.contains("reference does not exist")
                    || lowered.contains("object does not exist") =>
            {
                RemoteError::NotFound(format!("ref heads/{branch}: {message}"))
            }
            other => status_error("ref")(other, message),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RepositoryResponse {
    default_branch: String,
}

#[derive(Deserialize)]
struct ObjectRef {
    sha: String,
}

#[derive(Deserialize)]
struct RefResponse {
    object: ObjectRef,
}

#[derive(Deserialize)]
struct CommitResponse {
    sha: String,
    tree: ObjectRef,
    #[serde(default)]
    parents: Vec<ObjectRef>,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct ShaResponse {
    sha: String,
}

#[derive(Deserialize)]
struct TreeItem {
    path: String,
    #[serde(rename = "type")]
    kind: EntryKind,
    sha: String,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Deserialize)]
struct TreeResponse {
    #[serde(default)]
    truncated: bool,
    tree: Vec<TreeItem>,
}

#[derive(Deserialize)]
struct BlobResponse {
    content: String,
    encoding: String,
}

#[derive(Serialize)]
struct NewTreeItem<'a> {
    path: &'a str,
    mode: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct CreateTreeRequest<'a> {
    base_tree: &'a str,
    tree: Vec<NewTreeItem<'a>>,
}

#[derive(Serialize)]
struct CreateCommitRequest<'a> {
    message: &'a str,
    tree: &'a str,
    parents: &'a [String],
}

#[derive(Serialize)]
struct UpdateRefRequest<'a> {
    sha: &'a str,
    force: bool,
}

fn create_tree_request<'a>(base_tree_sha: &'a str, entries: &'a [FileChange]) -> CreateTreeRequest<'a> {
    CreateTreeRequest {
        base_tree: base_tree_sha,
        tree: entries
            .iter()
            .map(|e| NewTreeItem {
                path: &e.path,
                mode: REGULAR_FILE_MODE,
                kind: "blob",
                content: &e.content,
            })
            .collect(),
    }
}

impl From<TreeResponse> for TreeListing {
    fn from(response: TreeResponse) -> Self {
        TreeListing {
            entries: response
                .tree
                .into_iter()
                .map(|item| RemoteFileEntry {
                    path: item.path,
                    size: item.size.unwrap_or(0),
                    kind: item.kind,
                    content_ref: item.sha,
                })
                .collect(),
            truncated: response.truncated,
        }
    }
}

#[async_trait]
impl RemoteObjectStore for GitHubClient {
    async fn default_branch(&self, repo: &RepoCoordinates) -> RemoteResult<String> {
        let url = self.repo_url(repo, "");
        let what = format!("repository {repo}");
        let response: RepositoryResponse = self
            .send(self.request(Method::GET, &url), &what, status_error(&what))
            .await?;
        Ok(response.default_branch)
    }

    async fn get_ref(&self, repo: &RepoCoordinates, branch: &str) -> RemoteResult<String> {
        let url = self.repo_url(repo, &format!("git/ref/heads/{branch}"));
        let what = format!("ref heads/{branch}");
        let response: RefResponse = self
            .send(self.request(Method::GET, &url), &what, status_error(&what))
            .await?;
        Ok(response.object.sha)
    }

    async fn get_commit(&self, repo: &RepoCoordinates, sha: &str) -> RemoteResult<CommitObject> {
        let url = self.repo_url(repo, &format!("git/commits/{sha}"));
        let what = format!("commit {sha}");
        let response: CommitResponse = self
            .send(self.request(Method::GET, &url), &what, status_error(&what))
            .await?;
        Ok(CommitObject {
            sha: response.sha,
            tree_sha: response.tree.sha,
            parents: response.parents.into_iter().map(|p| p.sha).collect(),
            message: response.message,
        })
    }

    async fn create_tree(
        &self,
        repo: &RepoCoordinates,
        base_tree_sha: &str,
        entries: &[FileChange],
    ) -> RemoteResult<String> {
        let url = self.repo_url(repo, "git/trees");
        let body = create_tree_request(base_tree_sha, entries);
        let response: ShaResponse = self
            .send(
                self.request(Method::POST, &url).json(&body),
                "create tree",
                status_error("base tree"),
            )
            .await?;
        Ok(response.sha)
    }

    async fn create_commit(
        &self,
        repo: &RepoCoordinates,
        tree_sha: &str,
        parents: &[String],
        message: &str,
    ) -> RemoteResult<String> {
        let url = self.repo_url(repo, "git/commits");
        let body = CreateCommitRequest {
            message,
            tree: tree_sha,
            parents,
        };
        let response: ShaResponse = self
            .send(
                self.request(Method::POST, &url).json(&body),
                "create commit",
                status_error("commit tree"),
            )
            .await?;
        Ok(response.sha)
    }

    async fn update_ref(
        &self,
        repo: &RepoCoordinates,
        branch: &str,
        sha: &str,
        force: bool,
    ) -> RemoteResult<()> {
        let url = self.repo_url(repo, &format!("git/refs/heads/{branch}"));
        let body = UpdateRefRequest { sha, force };
        let _: RefResponse = self
            .send(
                self.request(Method::PATCH, &url).json(&body),
                "update ref",
                ref_update_error(branch),
            )
            .await?;
        Ok(())
    }

    async fn get_tree_recursive(
        &self,
        repo: &RepoCoordinates,
        branch: &str,
    ) -> RemoteResult<TreeListing> {
        let url = self.repo_url(repo, &format!("git/trees/{branch}?recursive=1"));
        let what = format!("tree {branch}");
        let response: TreeResponse = self
            .send(self.request(Method::GET, &url), &what, status_error(&what))
            .await?;
        Ok(response.into())
    }

    async fn get_blob(&self, repo: &RepoCoordinates, content_ref: &str) -> RemoteResult<BlobContent> {
        let url = self.repo_url(repo, &format!("git/blobs/{content_ref}"));
        let what = format!("blob {content_ref}");
        let response: BlobResponse = self
            .send(self.request(Method::GET, &url), &what, status_error(&what))
            .await?;
        Ok(BlobContent {
            content: response.content,
            encoding: response.encoding,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_API_URL;
    use serde_json::json;

    #[test]
    fn test_repo_url_building() {
        let repo = RepoCoordinates::new("octo", "demo");
        assert_eq!(
            repo_url("https://api.github.com/", &repo, "git/trees/main?recursive=1"),
            "https://api.github.com/repos/octo/demo/git/trees/main?recursive=1"
        );
        assert_eq!(
            repo_url(DEFAULT_API_URL, &repo, ""),
            "https://api.github.com/repos/octo/demo"
        );
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"message": "Reference does not exist", "documentation_url": "x"}"#),
            "Reference does not exist"
        );
        assert_eq!(error_message("  plain text  "), "plain text");
    }

    #[test]
    fn test_status_mapping() {
        let err = status_error("ref heads/main")(StatusCode::NOT_FOUND, "Not Found".into());
        assert!(err.is_not_found());

        let err = status_error("ref heads/main")(StatusCode::FORBIDDEN, "rate limit".into());
        assert!(matches!(err, RemoteError::Status { status: 403, .. }));
    }

    #[test]
    fn test_ref_update_conflict_mapping() {
        let err = ref_update_error("main")(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Update is not a fast forward".into(),
        );
        assert!(err.is_conflict());

        let err = ref_update_error("main")(StatusCode::CONFLICT, "busy".into());
        assert!(err.is_conflict());

        let err = ref_update_error("main")(StatusCode::NOT_FOUND, "gone".into());
        assert!(err.is_not_found());

        let err = ref_update_error("gone")(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Reference does not exist".into(),
        );
        assert!(err.is_not_found());
        assert!(!err.is_conflict());

        let err = ref_update_error("main")(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Object does not exist".into(),
        );
        assert!(err.is_not_found());

        let err = ref_update_error("main")(
            StatusCode::UNPROCESSABLE_ENTITY,
            "sha is not a valid object".into(),
        );
        assert!(matches!(err, RemoteError::Status { status: 422, .. }));
    }

    #[test]
    fn test_create_tree_body_uses_inline_blobs() {
        let files = vec![FileChange::new("src/a.json", "{}")];
        let body = serde_json::to_value(create_tree_request("base123", &files)).unwrap();
        assert_eq!(
            body,
            json!({
                "base_tree": "base123",
                "tree": [{"path": "src/a.json", "mode": "100644", "type": "blob", "content": "{}"}]
            })
        );
    }

    #[test]
    fn test_update_ref_body() {
        let body = serde_json::to_value(UpdateRefRequest {
            sha: "abc",
            force: false,
        })
        .unwrap();
        assert_eq!(body, json!({"sha": "abc", "force": false}));
    }

    #[test]
    fn test_tree_response_conversion() {
        let response: TreeResponse = serde_json::from_value(json!({
            "sha": "t1",
            "truncated": false,
            "tree": [
                {"path": "src", "mode": "040000", "type": "tree", "sha": "d1"},
                {"path": "src/main.rs", "mode": "100644", "type": "blob", "sha": "b1", "size": 12},
                {"path": "vendor/lib", "mode": "160000", "type": "commit", "sha": "c1"}
            ]
        }))
        .unwrap();
        let listing = TreeListing::from(response);
        assert_eq!(listing.entries.len(), 3);
        assert!(listing.entries[0].is_directory());
        assert_eq!(listing.entries[1].kind, EntryKind::Blob);
        assert_eq!(listing.entries[1].size, 12);
        assert_eq!(listing.entries[1].content_ref, "b1");
        assert_eq!(listing.entries[2].kind, EntryKind::Commit);
    }

    #[test]
    fn test_with_token_keeps_endpoint() {
        let client = GitHubClient::new(GitHubConfig::new("https://ghe.local/api/v3")).unwrap();
        let authed = client.with_token("t0k3n");
        assert_eq!(authed.config().api_url, "https://ghe.local/api/v3");
        assert_eq!(authed.config().token.as_deref(), Some("t0k3n"));
        assert!(client.config().token.is_none());
    }
}
