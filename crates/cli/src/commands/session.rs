//! `recollect session` — Session management commands.

use recollect_context::MemoryEngine;
use recollect_core::session::SessionId;
use tokio_util::sync::CancellationToken;

pub async fn create(
    engine: &MemoryEngine,
    title: Option<String>,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = engine.create_session(title, cancel).await?;
    println!("{}", session.id);
    Ok(())
}

pub async fn list(
    engine: &MemoryEngine,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let sessions = engine.list_sessions(cancel).await?;
    if sessions.is_empty() {
        println!("   No sessions yet. Create one with `recollect session new`.");
        return Ok(());
    }

    for session in sessions {
        println!(
            "  {}  {}  {}",
            session.id,
            session.created_at.format("%Y-%m-%d %H:%M:%S"),
            session.title.as_deref().unwrap_or("(untitled)")
        );
    }
    Ok(())
}

pub async fn show(
    engine: &MemoryEngine,
    id: &SessionId,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = engine
        .get_session(id, cancel)
        .await?
        .ok_or_else(|| format!("Session not found: {id}"))?;
    let messages = engine.count_messages(id, cancel).await?;
    let summaries = engine.list_summaries(id, cancel).await?;
    let pins = engine.list_pins(id, None, cancel).await?;
    let pending = engine.pending_summary(id, cancel).await?;

    println!("📒 Session {}", session.id);
    println!("   Title:      {}", session.title.as_deref().unwrap_or("(untitled)"));
    println!("   Created:    {}", session.created_at.to_rfc3339());
    println!("   Messages:   {messages}");
    println!("   Summaries:  {}", summaries.len());
    println!("   Pins:       {}", pins.len());
    match pending {
        Some(range) => println!(
            "   Pending:    messages {}..={} ({} messages) are due for summarization",
            range.start_message_id,
            range.end_message_id,
            range.messages.len()
        ),
        None => println!("   Pending:    nothing to summarize"),
    }
    Ok(())
}

pub async fn delete(
    engine: &MemoryEngine,
    id: &SessionId,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    if engine.delete_session(id, cancel).await? {
        println!("🗑️  Deleted session {id} with its messages, summaries and pins.");
    } else {
        println!("   Session {id} does not exist.");
    }
    Ok(())
}
