//! `recollect pin` — Pinned memory commands.

use super::{importance, preview};
use recollect_context::MemoryEngine;
use recollect_core::pin::{NewPin, PinType};
use recollect_core::session::SessionId;
use tokio_util::sync::CancellationToken;

pub async fn add(
    engine: &MemoryEngine,
    session: SessionId,
    content: String,
    pin_type: PinType,
    score: Option<f64>,
    source: Option<i64>,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut new_pin = NewPin::new(session, content).with_type(pin_type);
    if let Some(score) = importance(score)? {
        new_pin = new_pin.with_importance(score);
    }
    if let Some(message_id) = source {
        new_pin = new_pin.with_source(message_id);
    }

    let pin = engine.create_pin(new_pin, cancel).await?;
    println!("{}", pin.id);
    Ok(())
}

pub async fn list(
    engine: &MemoryEngine,
    session: &SessionId,
    pin_type: Option<PinType>,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let pins = engine.list_pins(session, pin_type, cancel).await?;
    if pins.is_empty() {
        println!("   No pins in session {session}.");
        return Ok(());
    }

    for pin in pins {
        let source = pin
            .source_message_id
            .map(|id| format!(" (from #{id})"))
            .unwrap_or_default();
        println!(
            "  {:>6}  {:<7} [{}] {}{source}",
            pin.id,
            pin.pin_type,
            pin.importance,
            preview(&pin.content, 80)
        );
    }
    Ok(())
}

pub async fn delete(
    engine: &MemoryEngine,
    pin_id: i64,
    cancel: &CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    if engine.delete_pin(pin_id, cancel).await? {
        println!("🗑️  Deleted pin {pin_id}.");
    } else {
        println!("   Pin {pin_id} does not exist.");
    }
    Ok(())
}
