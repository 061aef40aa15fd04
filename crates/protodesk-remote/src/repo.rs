//! Repository coordinates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

/// Owner and name of a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoCoordinates {
    pub owner: String,
    pub name: String,
}

impl RepoCoordinates {
    pub fn new(owner: &str, name: &str) -> Self {
        RepoCoordinates {
            owner: owner.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for RepoCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoCoordinates {
    type Err = RemoteError;

    /// Accepts `owner/name`, `https://github.com/owner/name(.git)` and
    /// `git@github.com:owner/name.git`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let without_host = ["https://github.com/", "http://github.com/", "git@github.com:"]
            .iter()
            .find_map(|prefix| trimmed.strip_prefix(prefix))
            .unwrap_or(trimmed);
        let cleaned = without_host.trim_end_matches('/');
        let cleaned = cleaned.strip_suffix(".git").unwrap_or(cleaned);

        let mut parts = cleaned.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => {
                Ok(RepoCoordinates::new(owner, name))
            }
            _ => Err(RemoteError::InvalidRepository(s.to_string())),
        }
    }
}
