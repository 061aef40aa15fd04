//! Layered application configuration
//!
//! Values come from, in increasing precedence: built-in defaults, an optional
//! TOML file, environment variables, and finally whatever the caller sets on
//! the returned struct (the CLI applies its flags there).
//!
//! ```toml
//! [github]
//! api_url = "https://api.github.com"
//!
//! [scan]
//! max_files = 200
//! batch_size = 5
//!
//! [log]
//! json = true
//! level = "debug"
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use protodesk_remote::{GitHubConfig, ScanLimits};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub json: bool,
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            json: false,
            level: "info".to_string(),
        }
    }
}

impl LogConfig {
    pub fn tracing_level(&self) -> Result<Level, ConfigError> {
        Level::from_str(&self.level).map_err(|_| ConfigError::InvalidValue {
            key: "log.level".to_string(),
            value: self.level.clone(),
        })
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub github: GitHubConfig,
    pub scan: ScanLimits,
    pub log: LogConfig,
}

impl AppConfig {
    /// Load from `path` (if given) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text)?;
        config.log.tracing_level()?;
        Ok(config)
    }

    /// Override fields from environment-style lookups. Empty values are
    /// treated as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("GITHUB_API_URL") {
            self.github.api_url = url;
        }
        if let Some(token) = get("GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(proxy) = get("HTTPS_PROXY") {
            self.github.proxy = Some(proxy);
        }
        if let Some(value) = get("PROTODESK_MAX_FILES") {
            self.scan.max_files = parse_number("PROTODESK_MAX_FILES", &value)?;
        }
        if let Some(value) = get("PROTODESK_BATCH_SIZE") {
            self.scan.batch_size = parse_number("PROTODESK_BATCH_SIZE", &value)?;
        }
        if let Some(value) = get("PROTODESK_MAX_FILE_SIZE") {
            self.scan.max_file_size = parse_number("PROTODESK_MAX_FILE_SIZE", &value)?;
        }
        if let Some(value) = get("PROTODESK_LOG_JSON") {
            self.log.json = parse_flag("PROTODESK_LOG_JSON", &value)?;
        }
        if let Some(level) = get("PROTODESK_LOG_LEVEL") {
            self.log.level = level;
            self.log.tracing_level()?;
        }
        Ok(())
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str("[scan]\nmax_files = 5\n").unwrap();
        assert_eq!(config.scan.max_files, 5);
        assert_eq!(config.scan.batch_size, 10);
        assert_eq!(config.scan.max_file_size, 1_000_000);
        assert_eq!(config.log, LogConfig::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = AppConfig::from_toml_str(
            "[github]\napi_url = \"https://file.example\"\n[scan]\nbatch_size = 3\n",
        )
        .unwrap();
        config
            .apply_env(env(&[
                ("GITHUB_API_URL", "https://env.example"),
                ("PROTODESK_BATCH_SIZE", "7"),
                ("PROTODESK_LOG_JSON", "true"),
                ("GITHUB_TOKEN", ""),
            ]))
            .unwrap();

        assert_eq!(config.github.api_url, "https://env.example");
        assert_eq!(config.scan.batch_size, 7);
        assert!(config.log.json);
    }

    #[test]
    fn test_env_rejects_bad_numbers() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(env(&[("PROTODESK_MAX_FILES", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "PROTODESK_MAX_FILES"));
    }

    #[test]
    fn test_bad_log_level_is_rejected() {
        let err = AppConfig::from_toml_str("[log]\nlevel = \"chatty\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_parse_flag_variants() {
        assert!(parse_flag("X", "ON").unwrap());
        assert!(!parse_flag("X", "0").unwrap());
        assert!(parse_flag("X", "maybe").is_err());
    }
}
