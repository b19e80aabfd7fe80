//! `recollect context` — Assemble and print a session's context.

use recollect_context::MemoryEngine;
use recollect_core::session::SessionId;
use tokio_util::sync::CancellationToken;

pub async fn run(
    engine: &MemoryEngine,
    session: &SessionId,
    limit: Option<i64>,
    json: bool,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let context = engine.build_context(session, limit, cancel).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&context)?);
        return Ok(());
    }

    let preamble = context.system_preamble();
    if !preamble.is_empty() {
        println!("{preamble}\n");
    }
    if !context.recent_messages.is_empty() {
        println!("[Recent Messages]");
        for m in &context.recent_messages {
            println!("{}: {}", m.role, m.text);
        }
        println!();
    }

    let meta = &context.metadata;
    println!(
        "── {} / {} tokens (pins {}, summaries {}, messages {}) · {} of {} messages · policy {}",
        context.total_tokens,
        meta.token_limit,
        meta.pin_tokens,
        meta.summary_tokens,
        meta.message_tokens,
        meta.messages_included,
        meta.messages_considered,
        meta.policy
    );
    Ok(())
}
