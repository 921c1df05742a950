use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::model::{ReportableStatus, ScheduledMessage, Status};
use crate::state_machine;
use crate::store::Store;
use serde_json::{json, Value as Json};
use uuid::Uuid;

const DEFAULT_ERROR_MESSAGE: &str = "unknown error";

/// Applies a gateway-reported outcome, driving retry scheduling or terminal
/// failure. Runs entirely inside one transaction: the message and throttle
/// rows are locked together so that a cancellation racing with this report
/// is resolved deterministically (see [`crate::cancel`]).
pub async fn report(
    store: &Store,
    clock: &dyn Clock,
    message_id: Uuid,
    reported_status: ReportableStatus,
    error: Option<String>,
    detail: Option<Json>,
) -> Result<ScheduledMessage> {
    let now = clock.now();
    let detail = detail.unwrap_or_else(|| json!({}));

    let mut tx = store.begin_tx().await?;
    let throttle = Store::lock_throttle(&mut tx, now).await?;
    let message = Store::lock_message(&mut tx, message_id).await?;

    // The reporter, not the canceller, resolves the cancel/report race: a
    // report that arrives after the message was already canceled is
    // recorded as an audit event but never overrides CANCELED.
    if message.status == Status::Canceled {
        Store::append_event(
            &mut tx,
            message_id,
            Status::Canceled,
            now,
            json!({"note": "skipped_send_because_canceled"}),
        )
        .await?;
        tx.commit().await?;
        return Ok(message);
    }

    let target = reported_status.as_status();
    if !state_machine::allowed(message.status, target) {
        return Err(Error::InvalidState(format!(
            "message {message_id} cannot move from {} to {target}",
            message.status
        )));
    }

    let updated = if reported_status == ReportableStatus::Failed {
        let attempt_count = message.attempt_count + 1;
        let error_message = error.clone().unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string());

        if attempt_count < throttle.max_attempts {
            let delay = throttle.backoff_seconds(attempt_count);
            let scheduled_for = now + chrono::Duration::seconds(delay);

            let updated = Store::apply_retryable_failure(
                &mut tx,
                message_id,
                attempt_count,
                &error_message,
                scheduled_for,
                now,
            )
            .await?;

            Store::append_event(
                &mut tx,
                message_id,
                Status::Failed,
                now,
                json!({
                    "reported_at": now,
                    "error": error,
                    "detail": detail,
                    "attempt_count": attempt_count,
                }),
            )
            .await?;
            Store::append_event(
                &mut tx,
                message_id,
                Status::Queued,
                now,
                json!({
                    "source": "retry",
                    "retry_in_seconds": delay,
                    "scheduled_for": scheduled_for,
                    "attempt_count": attempt_count,
                }),
            )
            .await?;

            updated
        } else {
            let updated = Store::apply_terminal_failure(
                &mut tx,
                message_id,
                attempt_count,
                &error_message,
                now,
            )
            .await?;

            Store::append_event(
                &mut tx,
                message_id,
                Status::Failed,
                now,
                json!({
                    "reported_at": now,
                    "error": error,
                    "detail": detail,
                    "attempt_count": attempt_count,
                }),
            )
            .await?;

            updated
        }
    } else {
        let status = reported_status.as_status();
        let updated = Store::apply_terminal_report(&mut tx, message_id, status, now).await?;
        Store::append_event(
            &mut tx,
            message_id,
            status,
            now,
            json!({"reported_at": now, "error": error, "detail": detail}),
        )
        .await?;
        updated
    };

    tx.commit().await?;
    Ok(updated)
}
