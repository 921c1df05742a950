use crate::error::{Error, Result};
use crate::model::{MessageStatusEvent, ScheduledMessage, Status, GATEWAY_PENDING};
use crate::throttle::DeliveryThrottle;
use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

/// Transactional persistence of messages, events and the throttle singleton.
///
/// This is the only component that knows about storage. All ordering and
/// concurrency invariants the rest of the crate relies on (at-most-one
/// promotion per interval, at-most-one owner per message, FIFO selection)
/// are expressed here in terms of row locks and `FOR UPDATE SKIP LOCKED`.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<Status>,
    pub scheduled_from: Option<DateTime<Utc>>,
    pub scheduled_to: Option<DateTime<Utc>>,
    pub to_handle: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatusCount {
    pub status: Status,
    pub count: i64,
}

impl Store {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| Error::Store(sqlx::Error::Migrate(Box::new(err))))
    }

    pub async fn begin_tx(&self) -> Result<Transaction<'_, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    /// Returns the singleton throttle row, holding an exclusive lock until
    /// the transaction commits. Creates it with defaults on first use.
    pub async fn lock_throttle(
        conn: &mut PgConnection,
        now: DateTime<Utc>,
    ) -> Result<DeliveryThrottle> {
        let defaults = DeliveryThrottle::defaults(now);
        sqlx::query(
            r#"
            INSERT INTO delivery_throttle
                (id, next_send_at, interval_seconds, max_attempts, retry_base_seconds, retry_max_seconds)
            VALUES (1, $1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(defaults.next_send_at)
        .bind(defaults.interval_seconds)
        .bind(defaults.max_attempts)
        .bind(defaults.retry_base_seconds)
        .bind(defaults.retry_max_seconds)
        .execute(&mut *conn)
        .await?;

        let throttle = sqlx::query_as::<_, DeliveryThrottle>(
            "SELECT next_send_at, interval_seconds, max_attempts, retry_base_seconds, retry_max_seconds \
             FROM delivery_throttle WHERE id = 1 FOR UPDATE",
        )
        .fetch_one(&mut *conn)
        .await?;

        Ok(throttle)
    }

    pub async fn set_throttle_next_send_at(
        conn: &mut PgConnection,
        next_send_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE delivery_throttle SET next_send_at = $1 WHERE id = 1")
            .bind(next_send_at)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// `status = QUEUED ∧ scheduled_for ≤ now ∧ claimed_at IS NULL ∧
    /// attempt_count < max_attempts`, FIFO ordered, non-blocking.
    pub async fn pick_due_queued(
        conn: &mut PgConnection,
        now: DateTime<Utc>,
        max_attempts: i32,
    ) -> Result<Option<ScheduledMessage>> {
        let row = sqlx::query_as::<_, ScheduledMessage>(
            r#"
            SELECT * FROM scheduled_messages
            WHERE status = 'queued'
              AND scheduled_for <= $1
              AND claimed_at IS NULL
              AND attempt_count < $2
            ORDER BY scheduled_for ASC, created_at ASC, id ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(now)
        .bind(max_attempts)
        .fetch_optional(conn)
        .await?;
        Ok(row)
    }

    /// `status = ACCEPTED ∧ claimed_by = "gateway_pending" ∧ claimed_at IS
    /// NULL ∧ scheduled_for ≤ now`, FIFO ordered, non-blocking.
    pub async fn pick_pending_for_gateway(
        conn: &mut PgConnection,
        now: DateTime<Utc>,
    ) -> Result<Option<ScheduledMessage>> {
        let row = sqlx::query_as::<_, ScheduledMessage>(
            r#"
            SELECT * FROM scheduled_messages
            WHERE status = 'accepted'
              AND claimed_by = $2
              AND claimed_at IS NULL
              AND scheduled_for <= $1
            ORDER BY scheduled_for ASC, created_at ASC, id ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(now)
        .bind(GATEWAY_PENDING)
        .fetch_optional(conn)
        .await?;
        Ok(row)
    }

    pub async fn lock_message(conn: &mut PgConnection, id: Uuid) -> Result<ScheduledMessage> {
        sqlx::query_as::<_, ScheduledMessage>(
            "SELECT * FROM scheduled_messages WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(Error::NotFound)
    }

    pub async fn append_event(
        conn: &mut PgConnection,
        message_id: Uuid,
        status: Status,
        timestamp: DateTime<Utc>,
        detail: Json,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO message_status_events (message_id, status, timestamp, detail) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(message_id)
        .bind(status)
        .bind(timestamp)
        .bind(detail)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn create_message(
        conn: &mut PgConnection,
        to_handle: &str,
        body: &str,
        scheduled_for: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ScheduledMessage> {
        let id = Uuid::new_v4();
        let message = sqlx::query_as::<_, ScheduledMessage>(
            r#"
            INSERT INTO scheduled_messages
                (id, to_handle, body, scheduled_for, status, created_at, updated_at,
                 claimed_at, claimed_by, attempt_count, last_error)
            VALUES ($1, $2, $3, $4, 'queued', $5, $5, NULL, NULL, 0, NULL)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(to_handle)
        .bind(body)
        .bind(scheduled_for)
        .bind(now)
        .fetch_one(conn)
        .await?;
        Ok(message)
    }

    pub async fn promote_to_pending(
        conn: &mut PgConnection,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ScheduledMessage> {
        sqlx::query_as::<_, ScheduledMessage>(
            r#"
            UPDATE scheduled_messages
            SET status = 'accepted', claimed_at = NULL, claimed_by = $2, updated_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(GATEWAY_PENDING)
        .bind(now)
        .fetch_one(conn)
        .await
        .map_err(Error::from)
    }

    pub async fn attribute_pending_to_gateway(
        conn: &mut PgConnection,
        id: Uuid,
        gateway_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ScheduledMessage> {
        sqlx::query_as::<_, ScheduledMessage>(
            r#"
            UPDATE scheduled_messages
            SET claimed_at = $3, claimed_by = $2, updated_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(gateway_id)
        .bind(now)
        .fetch_one(conn)
        .await
        .map_err(Error::from)
    }

    pub async fn promote_and_claim(
        conn: &mut PgConnection,
        id: Uuid,
        gateway_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ScheduledMessage> {
        sqlx::query_as::<_, ScheduledMessage>(
            r#"
            UPDATE scheduled_messages
            SET status = 'accepted', claimed_at = $3, claimed_by = $2, updated_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(gateway_id)
        .bind(now)
        .fetch_one(conn)
        .await
        .map_err(Error::from)
    }

    pub async fn apply_terminal_report(
        conn: &mut PgConnection,
        id: Uuid,
        status: Status,
        now: DateTime<Utc>,
    ) -> Result<ScheduledMessage> {
        sqlx::query_as::<_, ScheduledMessage>(
            r#"
            UPDATE scheduled_messages
            SET status = $2, last_error = NULL, updated_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(now)
        .fetch_one(conn)
        .await
        .map_err(Error::from)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn apply_retryable_failure(
        conn: &mut PgConnection,
        id: Uuid,
        attempt_count: i32,
        last_error: &str,
        retry_scheduled_for: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ScheduledMessage> {
        sqlx::query_as::<_, ScheduledMessage>(
            r#"
            UPDATE scheduled_messages
            SET status = 'queued',
                scheduled_for = $4,
                claimed_at = NULL,
                claimed_by = NULL,
                attempt_count = $2,
                last_error = $3,
                updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(attempt_count)
        .bind(last_error)
        .bind(retry_scheduled_for)
        .bind(now)
        .fetch_one(conn)
        .await
        .map_err(Error::from)
    }

    pub async fn apply_terminal_failure(
        conn: &mut PgConnection,
        id: Uuid,
        attempt_count: i32,
        last_error: &str,
        now: DateTime<Utc>,
    ) -> Result<ScheduledMessage> {
        sqlx::query_as::<_, ScheduledMessage>(
            r#"
            UPDATE scheduled_messages
            SET status = 'failed', attempt_count = $2, last_error = $3, updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(attempt_count)
        .bind(last_error)
        .bind(now)
        .fetch_one(conn)
        .await
        .map_err(Error::from)
    }

    pub async fn apply_cancel(
        conn: &mut PgConnection,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ScheduledMessage> {
        sqlx::query_as::<_, ScheduledMessage>(
            "UPDATE scheduled_messages SET status = 'canceled', updated_at = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(now)
        .fetch_one(conn)
        .await
        .map_err(Error::from)
    }

    pub async fn list_messages(&self, filter: &ListFilter) -> Result<Vec<ScheduledMessage>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM scheduled_messages WHERE 1 = 1");

        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(from) = filter.scheduled_from {
            qb.push(" AND scheduled_for >= ").push_bind(from);
        }
        if let Some(to) = filter.scheduled_to {
            qb.push(" AND scheduled_for <= ").push_bind(to);
        }
        if let Some(to_handle) = &filter.to_handle {
            qb.push(" AND to_handle ILIKE ")
                .push_bind(format!("%{to_handle}%"));
        }
        qb.push(" ORDER BY created_at DESC");

        let rows = qb
            .build_query_as::<ScheduledMessage>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn events_for_message(&self, message_id: Uuid) -> Result<Vec<MessageStatusEvent>> {
        let rows = sqlx::query_as::<_, MessageStatusEvent>(
            "SELECT * FROM message_status_events WHERE message_id = $1 ORDER BY timestamp ASC, id ASC",
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn stats(&self) -> Result<Vec<StatusCount>> {
        let rows = sqlx::query_as::<_, StatusCount>(
            "SELECT status, count(*) AS count FROM scheduled_messages GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Deletes terminal messages older than `older_than`. An operator
    /// maintenance primitive; not wired to any HTTP verb.
    pub async fn purge_terminal_older_than(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM scheduled_messages
            WHERE status IN ('sent', 'delivered', 'received', 'failed', 'canceled')
              AND updated_at < $1
            "#,
        )
        .bind(older_than)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
