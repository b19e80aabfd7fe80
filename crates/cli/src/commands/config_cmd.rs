//! `recollect config` — Configuration management commands.

use super::load_config;
use recollect_config::AppConfig;
use std::path::Path;

pub async fn validate(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match load_config(path) {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();

            if config.memory.backend == "memory" {
                warnings.push("In-memory backend: nothing survives the process");
            }

            if !config.memory.strict_sessions {
                warnings.push("strict_sessions = false: writes create unknown sessions");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Backend:      {}", config.memory.backend);
            println!("   Database:     {}", config.memory.resolved_db_path().display());
            println!("   Token limit:  {}", config.context.token_limit);
            println!("   Selection:    {}", config.context.selection_policy);
            println!(
                "   Summarize:    after {} messages, keep {}",
                config.summarization.threshold, config.summarization.keep_recent
            );
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e);
        }
    }

    Ok(())
}

pub async fn show(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(path).map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));
    println!("{}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn config_path_is_valid() {
        let path = recollect_config::AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }
}
