//! Configuration loading and validation for recollect.
//!
//! Loads configuration from `~/.recollect/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use recollect_core::importance::Importance;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Selection policy names accepted in `context.selection_policy`.
pub const SELECTION_POLICIES: &[&str] = &["greedy", "skip_oversized"];

/// The root configuration structure.
///
/// Maps directly to `~/.recollect/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Context assembly configuration
    #[serde(default)]
    pub context: ContextConfig,

    /// Summarization trigger configuration
    #[serde(default)]
    pub summarization: SummarizationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// `sqlite` or `memory`
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// Database file; defaults to `~/.recollect/memory.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,

    /// Reject writes that reference an unknown session
    #[serde(default = "default_true")]
    pub strict_sessions: bool,

    /// Pause before the single retry of a transiently failed query
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_memory_backend() -> String {
    "sqlite".into()
}
fn default_true() -> bool {
    true
}
fn default_retry_backoff_ms() -> u64 {
    50
}
fn default_max_connections() -> u32 {
    4
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            db_path: None,
            strict_sessions: true,
            retry_backoff_ms: default_retry_backoff_ms(),
            max_connections: default_max_connections(),
        }
    }
}

impl MemoryConfig {
    /// The configured database path, or the default under the config dir.
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("memory.db"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Token budget per assembled context
    #[serde(default = "default_token_limit")]
    pub token_limit: i64,

    /// Summaries considered per context
    #[serde(default = "default_summary_limit")]
    pub summary_limit: usize,

    /// Recent messages considered per context
    #[serde(default = "default_message_window")]
    pub message_window: usize,

    /// `greedy` or `skip_oversized`
    #[serde(default = "default_selection_policy")]
    pub selection_policy: String,

    /// Deadline for one assembly, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_token_limit() -> i64 {
    4000
}
fn default_summary_limit() -> usize {
    5
}
fn default_message_window() -> usize {
    50
}
fn default_selection_policy() -> String {
    "greedy".into()
}
fn default_timeout_ms() -> u64 {
    5000
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            token_limit: default_token_limit(),
            summary_limit: default_summary_limit(),
            message_window: default_message_window(),
            selection_policy: default_selection_policy(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarizationConfig {
    /// Summarize once more than this many messages are uncompressed
    #[serde(default = "default_threshold")]
    pub threshold: usize,

    /// Newest messages left out of each summary
    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,

    /// Importance given to new summaries
    #[serde(default = "default_summary_importance")]
    pub importance: f64,
}

fn default_threshold() -> usize {
    20
}
fn default_keep_recent() -> usize {
    10
}
fn default_summary_importance() -> f64 {
    Importance::SUMMARY.value()
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            keep_recent: default_keep_recent(),
            importance: default_summary_importance(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.recollect/config.toml).
    ///
    /// Environment variables override the file:
    /// - `RECOLLECT_DB_PATH`
    /// - `RECOLLECT_TOKEN_LIMIT`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (the process environment in [`load`](Self::load)).
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(path) = lookup("RECOLLECT_DB_PATH") {
            self.memory.db_path = Some(PathBuf::from(path));
        }

        if let Some(limit) = lookup("RECOLLECT_TOKEN_LIMIT") {
            self.context.token_limit = limit.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "RECOLLECT_TOKEN_LIMIT must be an integer, got '{limit}'"
                ))
            })?;
        }

        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".recollect")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.memory.backend.as_str(), "sqlite" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "memory.backend must be 'sqlite' or 'memory', got '{}'",
                self.memory.backend
            )));
        }

        if self.memory.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "memory.max_connections must be > 0".into(),
            ));
        }

        if self.context.token_limit <= 0 {
            return Err(ConfigError::ValidationError(
                "context.token_limit must be > 0".into(),
            ));
        }

        if self.context.summary_limit == 0 || self.context.message_window == 0 {
            return Err(ConfigError::ValidationError(
                "context.summary_limit and context.message_window must be > 0".into(),
            ));
        }

        if !SELECTION_POLICIES.contains(&self.context.selection_policy.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "context.selection_policy must be one of {SELECTION_POLICIES:?}, got '{}'",
                self.context.selection_policy
            )));
        }

        if self.context.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "context.timeout_ms must be > 0".into(),
            ));
        }

        if self.summarization.threshold == 0 {
            return Err(ConfigError::ValidationError(
                "summarization.threshold must be > 0".into(),
            ));
        }

        if self.summarization.keep_recent >= self.summarization.threshold {
            return Err(ConfigError::ValidationError(
                "summarization.keep_recent must be smaller than summarization.threshold".into(),
            ));
        }

        self.summarization_importance()?;
        Ok(())
    }

    /// The summary importance as a validated [`Importance`].
    pub fn summarization_importance(&self) -> Result<Importance, ConfigError> {
        Importance::new(self.summarization.importance).map_err(|_| {
            ConfigError::ValidationError(
                "summarization.importance must be between 0.0 and 1.0".into(),
            )
        })
    }

    /// Generate a default config TOML string (for `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.memory.backend, "sqlite");
        assert_eq!(config.context.token_limit, 4000);
        assert_eq!(config.context.summary_limit, 5);
        assert_eq!(config.context.message_window, 50);
        assert_eq!(config.summarization.threshold, 20);
        assert_eq!(config.summarization.keep_recent, 10);
        assert!(config.memory.strict_sessions);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[context]\ntoken_limit = 800\nselection_policy = \"skip_oversized\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.context.token_limit, 800);
        assert_eq!(config.context.selection_policy, "skip_oversized");
        assert_eq!(config.context.summary_limit, 5);
        assert_eq!(config.memory, MemoryConfig::default());
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[context\ntoken_limit = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.context.selection_policy = "knapsack".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.summarization.importance = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.context.token_limit = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.summarization.keep_recent = 20;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.memory.backend = "postgres".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("RECOLLECT_DB_PATH", "/var/lib/recollect/m.db"),
            ("RECOLLECT_TOKEN_LIMIT", " 1200 "),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(
            config.memory.resolved_db_path(),
            PathBuf::from("/var/lib/recollect/m.db")
        );
        assert_eq!(config.context.token_limit, 1200);
    }

    #[test]
    fn bad_token_limit_env_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_env_overrides(|k| {
            (k == "RECOLLECT_TOKEN_LIMIT").then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("[context]"));
        assert!(toml_str.contains("token_limit = 4000"));
        assert!(toml_str.contains("selection_policy = \"greedy\""));
    }
}
