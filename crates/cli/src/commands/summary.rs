//! `recollect summary` — Summary commands.

use super::{importance, preview};
use recollect_context::MemoryEngine;
use recollect_core::session::SessionId;
use tokio_util::sync::CancellationToken;

pub async fn add(
    engine: &MemoryEngine,
    session: SessionId,
    start: i64,
    end: i64,
    text: String,
    score: Option<f64>,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let summary = engine
        .record_summary(&session, start, end, text, importance(score)?, cancel)
        .await?;
    println!("{}", summary.id);
    Ok(())
}

pub async fn list(
    engine: &MemoryEngine,
    session: &SessionId,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let summaries = engine.list_summaries(session, cancel).await?;
    if summaries.is_empty() {
        println!("   No summaries in session {session}.");
        return Ok(());
    }

    for s in summaries {
        println!(
            "  {:>6}  messages {}..={} ({})  [{}] {}",
            s.id,
            s.start_message_id,
            s.end_message_id,
            s.message_count,
            s.importance,
            preview(&s.text, 60)
        );
    }
    Ok(())
}

pub async fn pending(
    engine: &MemoryEngine,
    session: &SessionId,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let policy = engine.summarization_policy();
    match engine.pending_summary(session, cancel).await? {
        Some(range) => {
            println!(
                "📝 Messages {}..={} ({} messages) are due for summarization",
                range.start_message_id,
                range.end_message_id,
                range.messages.len()
            );
            for m in &range.messages {
                println!("  {:>6}  {:<9} {}", m.id, m.role, preview(&m.text, 70));
            }
            println!(
                "\n   Record the result with `recollect summary add {session} {} {} \"...\"`",
                range.start_message_id, range.end_message_id
            );
        }
        None => println!(
            "   Nothing to summarize (threshold {}, keeping the newest {}).",
            policy.threshold, policy.keep_recent
        ),
    }
    Ok(())
}
