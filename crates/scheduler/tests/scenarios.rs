use chrono::{Duration as ChronoDuration, Utc};
use msg_scheduler::clock::test_support::FixedClock;
use msg_scheduler::error::Error;
use msg_scheduler::model::{ReportableStatus, Status};
use msg_scheduler::store::Store;
use sqlx::PgPool;

async fn set_throttle(
    pool: &PgPool,
    next_send_at: chrono::DateTime<Utc>,
    interval_seconds: i64,
    max_attempts: i32,
    retry_base_seconds: i64,
    retry_max_seconds: i64,
) {
    sqlx::query(
        r#"
        INSERT INTO delivery_throttle
            (id, next_send_at, interval_seconds, max_attempts, retry_base_seconds, retry_max_seconds)
        VALUES (1, $1, $2, $3, $4, $5)
        ON CONFLICT (id) DO UPDATE SET
            next_send_at = excluded.next_send_at,
            interval_seconds = excluded.interval_seconds,
            max_attempts = excluded.max_attempts,
            retry_base_seconds = excluded.retry_base_seconds,
            retry_max_seconds = excluded.retry_max_seconds
        "#,
    )
    .bind(next_send_at)
    .bind(interval_seconds)
    .bind(max_attempts)
    .bind(retry_base_seconds)
    .bind(retry_max_seconds)
    .execute(pool)
    .await
    .unwrap();
}

/// S1 -- FIFO claim under throttle.
#[sqlx::test(migrations = "./migrations")]
async fn fifo_claim_under_throttle(pool: PgPool) -> anyhow::Result<()> {
    let store = Store::from_pool(pool.clone());
    let now = Utc::now();
    let clock = FixedClock::new(now);

    set_throttle(&pool, now - ChronoDuration::seconds(1), 3600, 5, 60, 21_600).await;

    let a = msg_scheduler::create::create_message(
        &store,
        &clock,
        "+15551230000",
        "hello a",
        now - ChronoDuration::minutes(1),
    )
    .await?;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let b = msg_scheduler::create::create_message(
        &store,
        &clock,
        "+15551230001",
        "hello b",
        now - ChronoDuration::minutes(1),
    )
    .await?;

    let claimed_first = msg_scheduler::claim::claim(&store, &clock, "g1").await?.unwrap();
    assert_eq!(claimed_first.id, a.id);

    let claimed_second = msg_scheduler::claim::claim(&store, &clock, "g1").await?;
    assert!(claimed_second.is_none(), "second claim should be throttled");

    set_throttle(&pool, now - ChronoDuration::seconds(1), 3600, 5, 60, 21_600).await;

    let claimed_third = msg_scheduler::claim::claim(&store, &clock, "g1").await?.unwrap();
    assert_eq!(claimed_third.id, b.id);

    Ok(())
}

/// S2 -- throttle block.
#[sqlx::test(migrations = "./migrations")]
async fn throttle_block_leaves_message_queued(pool: PgPool) -> anyhow::Result<()> {
    let store = Store::from_pool(pool.clone());
    let now = Utc::now();
    let clock = FixedClock::new(now);

    set_throttle(&pool, now + ChronoDuration::hours(1), 3600, 5, 60, 21_600).await;
    msg_scheduler::create::create_message(
        &store,
        &clock,
        "+15551230002",
        "hello",
        now - ChronoDuration::minutes(1),
    )
    .await?;

    let claimed = msg_scheduler::claim::claim(&store, &clock, "g1").await?;
    assert!(claimed.is_none());

    let messages = store.list_messages(&Default::default()).await?;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].status, Status::Queued);

    Ok(())
}

/// S3 -- successful delivery via tick + gateway claim + report.
#[sqlx::test(migrations = "./migrations")]
async fn successful_delivery_records_full_event_trail(pool: PgPool) -> anyhow::Result<()> {
    let store = Store::from_pool(pool.clone());
    let now = Utc::now();
    let clock = FixedClock::new(now);

    set_throttle(&pool, now - ChronoDuration::seconds(1), 3600, 5, 60, 21_600).await;
    let created = msg_scheduler::create::create_message(
        &store,
        &clock,
        "+15551230003",
        "hello",
        now - ChronoDuration::minutes(1),
    )
    .await?;

    msg_scheduler::tick::run_tick(&store, &clock).await?;

    set_throttle(&pool, now - ChronoDuration::seconds(1), 3600, 5, 60, 21_600).await;
    let claimed = msg_scheduler::claim::claim(&store, &clock, "g1").await?.unwrap();
    assert_eq!(claimed.id, created.id);

    let reported = msg_scheduler::report::report(
        &store,
        &clock,
        created.id,
        ReportableStatus::Sent,
        None,
        None,
    )
    .await?;
    assert_eq!(reported.status, Status::Sent);

    let events = store.events_for_message(created.id).await?;
    let statuses: Vec<Status> = events.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![Status::Queued, Status::Accepted, Status::Accepted, Status::Sent]
    );

    Ok(())
}

/// S4 -- retry with backoff, then permanent failure.
#[sqlx::test(migrations = "./migrations")]
async fn retry_with_backoff_then_permanent_failure(pool: PgPool) -> anyhow::Result<()> {
    let store = Store::from_pool(pool.clone());
    let now = Utc::now();
    let clock = FixedClock::new(now);

    set_throttle(&pool, now - ChronoDuration::seconds(1), 0, 3, 5, 60).await;
    let created = msg_scheduler::create::create_message(
        &store,
        &clock,
        "+15551230004",
        "hello",
        now - ChronoDuration::minutes(1),
    )
    .await?;

    msg_scheduler::claim::claim(&store, &clock, "g1").await?.unwrap();

    let after_first = msg_scheduler::report::report(
        &store,
        &clock,
        created.id,
        ReportableStatus::Failed,
        Some("boom".to_string()),
        None,
    )
    .await?;
    assert_eq!(after_first.status, Status::Queued);
    assert_eq!(after_first.attempt_count, 1);
    assert_eq!(after_first.last_error.as_deref(), Some("boom"));
    assert_eq!(
        (after_first.scheduled_for - now).num_seconds(),
        5,
        "first retry should back off 5s"
    );

    msg_scheduler::claim::claim(&store, &clock, "g1").await?.unwrap();
    let after_second = msg_scheduler::report::report(
        &store,
        &clock,
        created.id,
        ReportableStatus::Failed,
        Some("boom again".to_string()),
        None,
    )
    .await?;
    assert_eq!(after_second.status, Status::Queued);
    assert_eq!(after_second.attempt_count, 2);
    assert_eq!(
        (after_second.scheduled_for - now).num_seconds(),
        10,
        "second retry should back off 10s"
    );

    msg_scheduler::claim::claim(&store, &clock, "g1").await?.unwrap();
    let after_third = msg_scheduler::report::report(
        &store,
        &clock,
        created.id,
        ReportableStatus::Failed,
        Some("boom thrice".to_string()),
        None,
    )
    .await?;
    assert_eq!(after_third.status, Status::Failed);
    assert_eq!(after_third.attempt_count, 3);

    Ok(())
}

/// S5 -- cancel during in-flight delivery; reporter observes CANCELED.
#[sqlx::test(migrations = "./migrations")]
async fn cancel_during_in_flight_is_resolved_by_reporter(pool: PgPool) -> anyhow::Result<()> {
    let store = Store::from_pool(pool.clone());
    let now = Utc::now();
    let clock = FixedClock::new(now);

    set_throttle(&pool, now - ChronoDuration::seconds(1), 3600, 5, 60, 21_600).await;
    let created = msg_scheduler::create::create_message(
        &store,
        &clock,
        "+15551230005",
        "hello",
        now - ChronoDuration::minutes(1),
    )
    .await?;
    msg_scheduler::claim::claim(&store, &clock, "g1").await?.unwrap();

    let canceled = msg_scheduler::cancel::cancel(&store, &clock, created.id).await?;
    assert_eq!(canceled.status, Status::Canceled);

    let reported = msg_scheduler::report::report(
        &store,
        &clock,
        created.id,
        ReportableStatus::Sent,
        None,
        None,
    )
    .await?;
    assert_eq!(reported.status, Status::Canceled);

    let events = store.events_for_message(created.id).await?;
    let canceled_events: Vec<_> = events
        .iter()
        .filter(|e| e.status == Status::Canceled)
        .collect();
    assert_eq!(canceled_events.len(), 2);
    assert_eq!(
        canceled_events[1].detail.get("note").and_then(|v| v.as_str()),
        Some("skipped_send_because_canceled")
    );

    Ok(())
}

/// S6 -- skip over max-attempts during tick.
#[sqlx::test(migrations = "./migrations")]
async fn tick_skips_messages_at_max_attempts(pool: PgPool) -> anyhow::Result<()> {
    let store = Store::from_pool(pool.clone());
    let now = Utc::now();
    let clock = FixedClock::new(now);

    set_throttle(&pool, now - ChronoDuration::seconds(1), 3600, 3, 60, 21_600).await;
    let created = msg_scheduler::create::create_message(
        &store,
        &clock,
        "+15551230006",
        "hello",
        now - ChronoDuration::minutes(1),
    )
    .await?;

    sqlx::query("UPDATE scheduled_messages SET attempt_count = 3 WHERE id = $1")
        .bind(created.id)
        .execute(&pool)
        .await?;

    let outcome = msg_scheduler::tick::run_tick(&store, &clock).await?;
    assert!(matches!(
        outcome,
        msg_scheduler::tick::TickOutcome::Skipped {
            reason: msg_scheduler::tick::SkipReason::NoDueMessages,
            ..
        }
    ));

    let messages = store.list_messages(&Default::default()).await?;
    assert_eq!(messages[0].status, Status::Queued);

    Ok(())
}

/// Cancel is idempotent: canceling twice does not duplicate the event.
#[sqlx::test(migrations = "./migrations")]
async fn cancel_is_idempotent(pool: PgPool) -> anyhow::Result<()> {
    let store = Store::from_pool(pool.clone());
    let now = Utc::now();
    let clock = FixedClock::new(now);

    let created = msg_scheduler::create::create_message(
        &store,
        &clock,
        "+15551230007",
        "hello",
        now - ChronoDuration::minutes(1),
    )
    .await?;

    msg_scheduler::cancel::cancel(&store, &clock, created.id).await?;
    msg_scheduler::cancel::cancel(&store, &clock, created.id).await?;

    let events = store.events_for_message(created.id).await?;
    let canceled_events = events.iter().filter(|e| e.status == Status::Canceled).count();
    assert_eq!(canceled_events, 1);

    Ok(())
}

/// Canceling a message already in a sent-class status is rejected.
#[sqlx::test(migrations = "./migrations")]
async fn cancel_rejects_sent_class_messages(pool: PgPool) -> anyhow::Result<()> {
    let store = Store::from_pool(pool.clone());
    let now = Utc::now();
    let clock = FixedClock::new(now);

    let created = msg_scheduler::create::create_message(
        &store,
        &clock,
        "+15551230008",
        "hello",
        now - ChronoDuration::minutes(1),
    )
    .await?;
    sqlx::query("UPDATE scheduled_messages SET status = 'sent' WHERE id = $1")
        .bind(created.id)
        .execute(&pool)
        .await?;

    let result = msg_scheduler::cancel::cancel(&store, &clock, created.id).await;
    assert!(matches!(result, Err(Error::InvalidState(_))));

    Ok(())
}

/// A FAILED message (exhausted retries or otherwise terminally failed) is
/// not sent-class and must still be cancelable.
#[sqlx::test(migrations = "./migrations")]
async fn cancel_accepts_failed_messages(pool: PgPool) -> anyhow::Result<()> {
    let store = Store::from_pool(pool.clone());
    let now = Utc::now();
    let clock = FixedClock::new(now);

    let created = msg_scheduler::create::create_message(
        &store,
        &clock,
        "+15551230009",
        "hello",
        now - ChronoDuration::minutes(1),
    )
    .await?;
    sqlx::query("UPDATE scheduled_messages SET status = 'failed' WHERE id = $1")
        .bind(created.id)
        .execute(&pool)
        .await?;

    let canceled = msg_scheduler::cancel::cancel(&store, &clock, created.id).await?;
    assert_eq!(canceled.status, Status::Canceled);

    Ok(())
}
