use crate::clock::Clock;
use crate::error::Result;
use crate::model::Status;
use crate::store::Store;
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Ready {
        id: Uuid,
    },
    Skipped {
        reason: SkipReason,
        next_send_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Throttled,
    NoDueMessages,
}

/// Runs one sweep of the periodic tick: promote the next due QUEUED message
/// to ACCEPTED (owned by the `gateway_pending` sentinel) and advance the
/// throttle, all inside a single transaction so that no concurrent tick or
/// claim can double-promote within the same interval.
pub async fn run_tick(store: &Store, clock: &dyn Clock) -> Result<TickOutcome> {
    let now = clock.now();
    let mut tx = store.begin_tx().await?;

    let throttle = Store::lock_throttle(&mut tx, now).await?;
    if now < throttle.next_send_at {
        tx.commit().await?;
        return Ok(TickOutcome::Skipped {
            reason: SkipReason::Throttled,
            next_send_at: throttle.next_send_at,
        });
    }

    let Some(candidate) = Store::pick_due_queued(&mut tx, now, throttle.max_attempts).await?
    else {
        tx.commit().await?;
        return Ok(TickOutcome::Skipped {
            reason: SkipReason::NoDueMessages,
            next_send_at: throttle.next_send_at,
        });
    };

    let promoted = Store::promote_to_pending(&mut tx, candidate.id, now).await?;
    Store::append_event(
        &mut tx,
        promoted.id,
        Status::Accepted,
        now,
        json!({"claimed_by": "gateway_pending"}),
    )
    .await?;

    let next_send_at = now + chrono::Duration::seconds(throttle.interval_seconds);
    Store::set_throttle_next_send_at(&mut tx, next_send_at).await?;

    tx.commit().await?;
    Ok(TickOutcome::Ready { id: promoted.id })
}
