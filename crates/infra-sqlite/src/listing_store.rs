// SQLite ListingStore Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use jobboard_core::domain::{EmploymentType, JobPosting, PostingContent, PostingId, PostingStatus};
use jobboard_core::error::{AppError, Result};
use jobboard_core::port::{CheckoutSession, ListingStore};
use sqlx::SqlitePool;

pub struct SqliteListingStore {
    pool: SqlitePool,
}

impl SqliteListingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// `?, ?, ?` for an IN clause
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[async_trait]
impl ListingStore for SqliteListingStore {
    async fn get(&self, id: &PostingId) -> Result<Option<JobPosting>> {
        let row = sqlx::query_as::<_, PostingRow>("SELECT * FROM postings WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(PostingRow::into_posting).transpose()
    }

    async fn insert(&self, posting: &JobPosting) -> Result<bool> {
        let benefits = serde_json::to_string(&posting.content.benefits)?;

        // Only the (owner_id, idempotency_key) index is absorbed; a duplicate
        // primary key still fails.
        let result = sqlx::query(
            r#"
            INSERT INTO postings (
                id, owner_id, listing_duration_days, created_at,
                status, activated_at, expired_at, updated_at,
                title, description, employment_type, location,
                salary_from, salary_to, benefits,
                idempotency_key, checkout_session_id, checkout_url
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(owner_id, idempotency_key) DO NOTHING
            "#,
        )
        .bind(&posting.id)
        .bind(&posting.owner_id)
        .bind(i64::from(posting.listing_duration_days))
        .bind(posting.created_at)
        .bind(posting.status.as_str())
        .bind(posting.activated_at)
        .bind(posting.expired_at)
        .bind(posting.updated_at)
        .bind(&posting.content.title)
        .bind(&posting.content.description)
        .bind(posting.content.employment_type.as_str())
        .bind(&posting.content.location)
        .bind(posting.content.salary_from)
        .bind(posting.content.salary_to)
        .bind(&benefits)
        .bind(&posting.idempotency_key)
        .bind(&posting.checkout_session_id)
        .bind(&posting.checkout_url)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_by_idempotency_key(
        &self,
        owner_id: &str,
        key: &str,
    ) -> Result<Option<JobPosting>> {
        let row = sqlx::query_as::<_, PostingRow>(
            "SELECT * FROM postings WHERE owner_id = ? AND idempotency_key = ?",
        )
        .bind(owner_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(PostingRow::into_posting).transpose()
    }

    async fn conditional_update_status(
        &self,
        id: &PostingId,
        expected: &[PostingStatus],
        new_status: PostingStatus,
        now_millis: i64,
    ) -> Result<bool> {
        if expected.is_empty() {
            return Ok(false);
        }

        // Single-statement compare-and-set; the status guard decides the race
        let stamp = match new_status {
            PostingStatus::Active => ", activated_at = ?",
            PostingStatus::Expired => ", expired_at = ?",
            PostingStatus::PendingPayment => "",
        };
        let sql = format!(
            "UPDATE postings SET status = ?, updated_at = ?{} WHERE id = ? AND status IN ({})",
            stamp,
            placeholders(expected.len())
        );

        let mut query = sqlx::query(&sql)
            .bind(new_status.as_str())
            .bind(now_millis);
        if !stamp.is_empty() {
            query = query.bind(now_millis);
        }
        query = query.bind(id);
        for status in expected {
            query = query.bind(status.as_str());
        }

        let result = query
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_content(
        &self,
        id: &PostingId,
        editable: &[PostingStatus],
        content: &PostingContent,
        now_millis: i64,
    ) -> Result<bool> {
        if editable.is_empty() {
            return Ok(false);
        }
        let benefits = serde_json::to_string(&content.benefits)?;

        let sql = format!(
            r#"
            UPDATE postings
            SET title = ?, description = ?, employment_type = ?, location = ?,
                salary_from = ?, salary_to = ?, benefits = ?, updated_at = ?
            WHERE id = ? AND status IN ({})
            "#,
            placeholders(editable.len())
        );

        let mut query = sqlx::query(&sql)
            .bind(&content.title)
            .bind(&content.description)
            .bind(content.employment_type.as_str())
            .bind(&content.location)
            .bind(content.salary_from)
            .bind(content.salary_to)
            .bind(&benefits)
            .bind(now_millis)
            .bind(id);
        for status in editable {
            query = query.bind(status.as_str());
        }

        let result = query
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_checkout(&self, id: &PostingId, session: &CheckoutSession) -> Result<()> {
        sqlx::query("UPDATE postings SET checkout_session_id = ?, checkout_url = ? WHERE id = ?")
            .bind(&session.session_id)
            .bind(&session.redirect_url)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn delete(&self, id: &PostingId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM postings WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<JobPosting>> {
        let rows: Vec<PostingRow> = sqlx::query_as(
            r#"
            SELECT * FROM postings
            WHERE owner_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(PostingRow::into_posting).collect()
    }

    async fn find_by_status(&self, status: PostingStatus) -> Result<Vec<JobPosting>> {
        let rows: Vec<PostingRow> = sqlx::query_as(
            r#"
            SELECT * FROM postings
            WHERE status = ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(PostingRow::into_posting).collect()
    }

    async fn count_by_status(&self, status: PostingStatus) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM postings WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(count)
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct PostingRow {
    id: String,
    owner_id: String,
    listing_duration_days: i64,
    created_at: i64,

    status: String,
    activated_at: Option<i64>,
    expired_at: Option<i64>,
    updated_at: Option<i64>,

    title: String,
    description: String,
    employment_type: String,
    location: String,
    salary_from: i64,
    salary_to: i64,
    benefits: String, // JSON array

    idempotency_key: Option<String>,
    checkout_session_id: Option<String>,
    checkout_url: Option<String>,
}

impl PostingRow {
    fn into_posting(self) -> Result<JobPosting> {
        let corrupt = |field: &str, detail: String| {
            AppError::Database(format!("Corrupt posting {} ({}): {}", self.id, field, detail))
        };

        let status = self
            .status
            .parse::<PostingStatus>()
            .map_err(|e| corrupt("status", e.to_string()))?;
        let employment_type = self
            .employment_type
            .parse::<EmploymentType>()
            .map_err(|e| corrupt("employment_type", e.to_string()))?;
        let listing_duration_days = u32::try_from(self.listing_duration_days)
            .map_err(|e| corrupt("listing_duration_days", e.to_string()))?;
        let benefits: Vec<String> = serde_json::from_str(&self.benefits)
            .map_err(|e| corrupt("benefits", e.to_string()))?;

        Ok(JobPosting {
            id: self.id,
            owner_id: self.owner_id,
            listing_duration_days,
            created_at: self.created_at,
            status,
            activated_at: self.activated_at,
            expired_at: self.expired_at,
            updated_at: self.updated_at,
            content: PostingContent {
                title: self.title,
                description: self.description,
                employment_type,
                location: self.location,
                salary_from: self.salary_from,
                salary_to: self.salary_to,
                benefits,
            },
            idempotency_key: self.idempotency_key,
            checkout_session_id: self.checkout_session_id,
            checkout_url: self.checkout_url,
        })
    }
}
