use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::model::{ScheduledMessage, Status};
use crate::store::Store;
use chrono::{DateTime, Utc};
use serde_json::json;

const MAX_TO_HANDLE_LEN: usize = 255;

/// Creates a message in QUEUED and appends the originating QUEUED event.
pub async fn create_message(
    store: &Store,
    clock: &dyn Clock,
    to_handle: &str,
    body: &str,
    scheduled_for: DateTime<Utc>,
) -> Result<ScheduledMessage> {
    if to_handle.is_empty() {
        return Err(Error::InvalidArgument("to_handle must not be empty".into()));
    }
    if to_handle.chars().count() > MAX_TO_HANDLE_LEN {
        return Err(Error::InvalidArgument(format!(
            "to_handle must be at most {MAX_TO_HANDLE_LEN} characters"
        )));
    }

    let now = clock.now();
    let mut tx = store.begin_tx().await?;
    let message = Store::create_message(&mut tx, to_handle, body, scheduled_for, now).await?;
    Store::append_event(&mut tx, message.id, Status::Queued, now, json!({"source": "api"})).await?;
    tx.commit().await?;
    Ok(message)
}
