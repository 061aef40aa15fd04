//! Error types for protodesk-remote

use thiserror::Error;

/// Errors returned by remote object-store operations
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Repository, ref, commit or file is absent remotely
    #[error("Not found: {0}")]
    NotFound(String),

    /// Non-forced ref update rejected because the branch moved
    #[error("Ref update conflict on branch {branch}: {message}")]
    Conflict { branch: String, message: String },

    /// Remote answered with an unexpected status
    #[error("Remote request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Response body could not be interpreted
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Repository coordinates could not be parsed
    #[error("Invalid repository: {0}")]
    InvalidRepository(String),

    /// Commit request rejected before touching the remote
    #[error("Invalid commit plan: {0}")]
    InvalidPlan(String),
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    NotFound,
    Conflict,
    /// Anything else: network, auth, rate limit, bad input, bad response.
    Transient,
}

impl RemoteError {
    pub fn kind(&self) -> RemoteErrorKind {
        match self {
            RemoteError::NotFound(_) => RemoteErrorKind::NotFound,
            RemoteError::Conflict { .. } => RemoteErrorKind::Conflict,
            _ => RemoteErrorKind::Transient,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == RemoteErrorKind::Conflict
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == RemoteErrorKind::NotFound
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::UnexpectedResponse(err.to_string())
    }
}
