// SQLite Expiration Scheduler
//
// Timers live in `expiration_timers`, so armed expirations survive restarts.
// Delivery uses leases: a claimed row is hidden until `lease_until`, and a
// sweeper that dies mid-delivery simply lets the lease run out.

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use jobboard_core::domain::PostingId;
use jobboard_core::error::Result;
use jobboard_core::port::{DueTimer, ExpirationScheduler, TimeProvider, TimerQueue};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;

pub struct SqliteExpirationScheduler {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteExpirationScheduler {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }
}

#[async_trait]
impl ExpirationScheduler for SqliteExpirationScheduler {
    async fn arm_after(&self, posting_id: &PostingId, delay_ms: i64) -> Result<bool> {
        let now = self.time_provider.now_millis();
        let due_at = now + delay_ms.max(0);

        let result = sqlx::query(
            r#"
            INSERT INTO expiration_timers (posting_id, due_at, armed_at, attempts)
            VALUES (?, ?, ?, 0)
            ON CONFLICT(posting_id) DO NOTHING
            "#,
        )
        .bind(posting_id)
        .bind(due_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let armed = result.rows_affected() == 1;
        if armed {
            debug!(posting_id = %posting_id, due_at = due_at, "Timer row inserted");
        }
        Ok(armed)
    }

    async fn is_armed(&self, posting_id: &PostingId) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM expiration_timers WHERE posting_id = ?")
                .bind(posting_id)
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(count > 0)
    }
}

#[async_trait]
impl TimerQueue for SqliteExpirationScheduler {
    async fn claim_due(
        &self,
        now_millis: i64,
        limit: usize,
        lease_ms: i64,
    ) -> Result<Vec<DueTimer>> {
        // One UPDATE selects and leases, so concurrent sweepers never share a row
        let mut rows: Vec<TimerRow> = sqlx::query_as(
            r#"
            UPDATE expiration_timers
            SET lease_until = ?
            WHERE posting_id IN (
                SELECT posting_id FROM expiration_timers
                WHERE fired_at IS NULL
                  AND due_at <= ?
                  AND (lease_until IS NULL OR lease_until <= ?)
                ORDER BY due_at ASC
                LIMIT ?
            )
            RETURNING posting_id, due_at, attempts
            "#,
        )
        .bind(now_millis + lease_ms)
        .bind(now_millis)
        .bind(now_millis)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        // RETURNING order is unspecified
        rows.sort_by(|a, b| a.due_at.cmp(&b.due_at).then_with(|| a.posting_id.cmp(&b.posting_id)));

        Ok(rows.into_iter().map(TimerRow::into_due_timer).collect())
    }

    async fn mark_fired(&self, posting_id: &PostingId, now_millis: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE expiration_timers
            SET fired_at = ?, lease_until = NULL
            WHERE posting_id = ? AND fired_at IS NULL
            "#,
        )
        .bind(now_millis)
        .bind(posting_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn release(&self, posting_id: &PostingId, retry_at: i64, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE expiration_timers
            SET attempts = attempts + 1, due_at = ?, lease_until = NULL, last_error = ?
            WHERE posting_id = ? AND fired_at IS NULL
            "#,
        )
        .bind(retry_at)
        .bind(error)
        .bind(posting_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn pending_count(&self) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM expiration_timers WHERE fired_at IS NULL")
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(count)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TimerRow {
    posting_id: String,
    due_at: i64,
    attempts: i32,
}

impl TimerRow {
    fn into_due_timer(self) -> DueTimer {
        DueTimer {
            posting_id: self.posting_id,
            due_at: self.due_at,
            attempts: self.attempts,
        }
    }
}
