use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::model::{ClaimedMessage, Status};
use crate::store::Store;
use serde_json::json;

/// A gateway requesting work gets at most one ACCEPTED message, attributed
/// to it. Two paths: the fast path hands out work the tick already paced;
/// the fallback path lets a gateway drive scheduling on its own, subject to
/// the same throttle, when the tick hasn't gotten to it yet.
pub async fn claim(store: &Store, clock: &dyn Clock, gateway_id: &str) -> Result<Option<ClaimedMessage>> {
    if gateway_id.trim().is_empty() {
        return Err(Error::InvalidArgument("gateway_id must not be empty".into()));
    }

    let now = clock.now();
    let mut tx = store.begin_tx().await?;

    if let Some(pending) = Store::pick_pending_for_gateway(&mut tx, now).await? {
        let attributed = Store::attribute_pending_to_gateway(&mut tx, pending.id, gateway_id, now).await?;
        Store::append_event(
            &mut tx,
            attributed.id,
            Status::Accepted,
            now,
            json!({"gateway_id": gateway_id, "source": "gateway_claim"}),
        )
        .await?;
        tx.commit().await?;
        return Ok(Some(attributed.into()));
    }

    let throttle = Store::lock_throttle(&mut tx, now).await?;
    if now < throttle.next_send_at {
        tx.commit().await?;
        return Ok(None);
    }

    let Some(candidate) = Store::pick_due_queued(&mut tx, now, throttle.max_attempts).await?
    else {
        tx.commit().await?;
        return Ok(None);
    };

    let claimed = Store::promote_and_claim(&mut tx, candidate.id, gateway_id, now).await?;
    Store::append_event(
        &mut tx,
        claimed.id,
        Status::Accepted,
        now,
        json!({"gateway_id": gateway_id}),
    )
    .await?;

    let next_send_at = now + chrono::Duration::seconds(throttle.interval_seconds);
    Store::set_throttle_next_send_at(&mut tx, next_send_at).await?;

    tx.commit().await?;
    Ok(Some(claimed.into()))
}
