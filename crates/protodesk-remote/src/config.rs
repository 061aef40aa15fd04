//! Remote client configuration

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default GitHub REST endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// GitHub client configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// REST API base URL
    pub api_url: String,
    /// Access token (optional for public repositories)
    pub token: Option<String>,
    /// User-Agent header sent with every request
    pub user_agent: String,
    /// Outbound proxy URL
    pub proxy: Option<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        GitHubConfig {
            api_url: std::env::var("GITHUB_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            user_agent: format!("protodesk-remote/{}", env!("CARGO_PKG_VERSION")),
            proxy: std::env::var("HTTPS_PROXY")
                .or_else(|_| std::env::var("https_proxy"))
                .ok()
                .filter(|p| !p.is_empty()),
        }
    }
}

impl GitHubConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific API endpoint, ignoring the environment
    pub fn new(api_url: &str) -> Self {
        GitHubConfig {
            api_url: api_url.to_string(),
            token: None,
            user_agent: format!("protodesk-remote/{}", env!("CARGO_PKG_VERSION")),
            proxy: None,
        }
    }

    /// Set authentication token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Route requests through an outbound proxy
    pub fn with_proxy(mut self, proxy: &str) -> Self {
        self.proxy = Some(proxy.to_string());
        self
    }
}

impl fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("user_agent", &self.user_agent)
            .field("proxy", &self.proxy)
            .finish()
    }
}

/// Limits applied by the tree scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanLimits {
    /// Blobs of this size or larger are skipped
    pub max_file_size: u64,
    /// Maximum number of files fetched per scan
    pub max_files: usize,
    /// Concurrent blob fetches per batch
    pub batch_size: usize,
}

impl Default for ScanLimits {
    fn default() -> Self {
        ScanLimits {
            max_file_size: 1_000_000,
            max_files: 100,
            batch_size: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_github_config_new() {
        let config = GitHubConfig::new("https://ghe.example.com/api/v3");
        assert_eq!(config.api_url, "https://ghe.example.com/api/v3");
        assert!(config.token.is_none());
        assert!(config.user_agent.starts_with("protodesk-remote/"));
    }

    #[test]
    fn test_github_config_with_token_and_proxy() {
        let config = GitHubConfig::new(DEFAULT_API_URL)
            .with_token("secret-token")
            .with_proxy("http://proxy.local:3128");
        assert_eq!(config.token, Some("secret-token".to_string()));
        assert_eq!(config.proxy.as_deref(), Some("http://proxy.local:3128"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = GitHubConfig::new(DEFAULT_API_URL).with_token("secret-token");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_scan_limits_default() {
        let limits = ScanLimits::default();
        assert_eq!(limits.max_file_size, 1_000_000);
        assert_eq!(limits.max_files, 100);
        assert_eq!(limits.batch_size, 10);
    }
}
