//! Subcommand implementations.

pub mod config_cmd;
pub mod context;
pub mod init;
pub mod message;
pub mod pin;
pub mod session;
pub mod status;
pub mod summary;

use recollect_config::AppConfig;
use recollect_context::MemoryEngine;
use recollect_core::importance::Importance;
use recollect_memory::{InMemoryBackend, SqliteBackend, SqliteOptions};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Load the config from `path` (or the default location) with env overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)?;
            config.apply_env_overrides(|key| std::env::var(key).ok())?;
            config
        }
        None => AppConfig::load()?,
    };
    Ok(config)
}

/// Open the configured backend and wrap it in an engine.
pub async fn open_engine(config: &AppConfig) -> Result<MemoryEngine, Box<dyn std::error::Error>> {
    tracing::debug!(backend = %config.memory.backend, "Opening memory store");
    let engine = match config.memory.backend.as_str() {
        "memory" => {
            let backend = InMemoryBackend::new().strict_sessions(config.memory.strict_sessions);
            MemoryEngine::from_config(Arc::new(backend), config)?
        }
        _ => {
            let db_path = config.memory.resolved_db_path();
            if let Some(parent) = db_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let options = SqliteOptions {
                max_connections: config.memory.max_connections,
                retry_backoff: Duration::from_millis(config.memory.retry_backoff_ms),
                strict_sessions: config.memory.strict_sessions,
            };
            let backend = SqliteBackend::open(
                &db_path.to_string_lossy(),
                options,
                Arc::new(recollect_core::clock::SystemClock),
            )
            .await?;
            MemoryEngine::from_config(Arc::new(backend), config)?
        }
    };
    Ok(engine)
}

/// A token that fires on Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });
    cancel
}

/// Parse an optional importance argument.
pub fn importance(value: Option<f64>) -> Result<Option<Importance>, Box<dyn std::error::Error>> {
    Ok(value.map(Importance::new).transpose()?)
}

/// First `max` characters of `text`, with an ellipsis when cut.
pub fn preview(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_cuts_long_text() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("a\nb", 10), "a b");
        assert_eq!(preview("abcdefghij", 4), "abcd…");
    }

    #[test]
    fn importance_argument_validated() {
        assert!(importance(None).unwrap().is_none());
        assert_eq!(importance(Some(0.9)).unwrap().unwrap().value(), 0.9);
        assert!(importance(Some(1.2)).is_err());
    }

    #[tokio::test]
    async fn memory_backend_opens() {
        let mut config = AppConfig::default();
        config.memory.backend = "memory".into();
        let engine = open_engine(&config).await.unwrap();
        let cancel = CancellationToken::new();
        assert!(engine.list_sessions(&cancel).await.unwrap().is_empty());
    }
}
