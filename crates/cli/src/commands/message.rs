//! `recollect message` — Message commands.

use super::{importance, preview};
use recollect_context::MemoryEngine;
use recollect_core::importance::Importance;
use recollect_core::message::{NewMessage, Role};
use recollect_core::session::SessionId;
use tokio_util::sync::CancellationToken;

pub async fn add(
    engine: &MemoryEngine,
    session: SessionId,
    role: Role,
    text: String,
    score: Option<f64>,
    detect_pins: bool,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut new_message = NewMessage::new(session, role, text);
    if let Some(score) = importance(score)? {
        new_message = new_message.with_importance(score);
    }

    if !detect_pins {
        let message = engine.create_message(new_message, cancel).await?;
        println!("{}", message.id);
        return Ok(());
    }

    let turn = engine.record_turn(new_message, cancel).await?;
    println!("{}", turn.message.id);
    for pin in &turn.pins {
        println!("   📌 pinned #{} [{}] {}", pin.id, pin.pin_type, preview(&pin.content, 60));
    }
    Ok(())
}

pub async fn list(
    engine: &MemoryEngine,
    session: &SessionId,
    limit: usize,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut messages = engine.recent_messages(session, limit, cancel).await?;
    if messages.is_empty() {
        println!("   No messages in session {session}.");
        return Ok(());
    }

    messages.reverse();
    for m in messages {
        println!(
            "  {:>6}  {:<9} [{}] {}",
            m.id,
            m.role,
            m.importance,
            preview(&m.text, 80)
        );
    }
    Ok(())
}

pub async fn score(
    engine: &MemoryEngine,
    message_id: i64,
    score: f64,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let score = Importance::new(score)?;
    if engine.set_importance(message_id, score, cancel).await? {
        println!("✅ Message {message_id} importance set to {score}");
    } else {
        println!("   Message {message_id} does not exist.");
    }
    Ok(())
}
