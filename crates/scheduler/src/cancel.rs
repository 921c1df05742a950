use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::model::{ScheduledMessage, Status};
use crate::store::Store;
use serde_json::json;
use uuid::Uuid;

/// Marks a non-terminal message CANCELED. Cancellation itself never races
/// with delivery -- it unconditionally marks the row -- the race is instead
/// resolved on the report side (see [`crate::report`]). Only messages that
/// have left the system (SENT/DELIVERED/RECEIVED) refuse cancellation;
/// everything else, including a FAILED message awaiting retry, may still be
/// canceled.
pub async fn cancel(store: &Store, clock: &dyn Clock, message_id: Uuid) -> Result<ScheduledMessage> {
    let now = clock.now();
    let mut tx = store.begin_tx().await?;
    let message = Store::lock_message(&mut tx, message_id).await?;

    if message.status == Status::Canceled {
        // Idempotent: no duplicate CANCELED event.
        tx.commit().await?;
        return Ok(message);
    }

    if message.status.is_sent_class() {
        return Err(Error::InvalidState(format!(
            "message {message_id} is already {} and cannot be canceled",
            message.status
        )));
    }

    let updated = Store::apply_cancel(&mut tx, message_id, now).await?;
    Store::append_event(&mut tx, message_id, Status::Canceled, now, json!({"source": "api"})).await?;
    tx.commit().await?;
    Ok(updated)
}
