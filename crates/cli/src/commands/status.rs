//! `recollect status` — Show store status.

use recollect_config::AppConfig;
use recollect_context::MemoryEngine;
use tokio_util::sync::CancellationToken;

pub async fn run(
    engine: &MemoryEngine,
    config: &AppConfig,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let sessions = engine.list_sessions(cancel).await?;

    println!("🧠 recollect Status");
    println!("===================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Backend:      {}", config.memory.backend);
    if config.memory.backend == "sqlite" {
        let db_path = config.memory.resolved_db_path();
        match std::fs::metadata(&db_path) {
            Ok(meta) => println!(
                "  DB file:      {} ({:.1} KB)",
                db_path.display(),
                meta.len() as f64 / 1024.0
            ),
            Err(_) => println!("  DB file:      {} (not created yet)", db_path.display()),
        }
    }
    println!("  Sessions:     {}", sessions.len());
    println!("  Token limit:  {}", engine.token_limit());
    println!("  Selection:    {}", config.context.selection_policy);
    println!(
        "  Strict:       {}",
        if config.memory.strict_sessions { "yes" } else { "no" }
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `recollect init` first");
    }

    Ok(())
}
