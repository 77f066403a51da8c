// Listing Store Port (Interface)

use crate::domain::{JobPosting, PostingContent, PostingId, PostingStatus};
use crate::error::Result;
use crate::port::payment_gateway::CheckoutSession;
use async_trait::async_trait;

/// Durable keyed store of job postings.
///
/// `conditional_update_status` is the concurrency primitive: every status
/// change goes through it so racing signals on one posting serialize.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Find posting by ID
    async fn get(&self, id: &PostingId) -> Result<Option<JobPosting>>;

    /// Insert a new posting
    ///
    /// Returns `false` (and writes nothing) when the owner already has a
    /// posting with the same idempotency key.
    async fn insert(&self, posting: &JobPosting) -> Result<bool>;

    /// Find the posting created under `(owner_id, key)`
    async fn find_by_idempotency_key(
        &self,
        owner_id: &str,
        key: &str,
    ) -> Result<Option<JobPosting>>;

    /// Compare-and-set on status
    ///
    /// Moves `id` to `new_status` only if its current status is one of
    /// `expected`. Stamps `activated_at` / `expired_at` accordingly.
    /// Returns whether the update applied.
    async fn conditional_update_status(
        &self,
        id: &PostingId,
        expected: &[PostingStatus],
        new_status: PostingStatus,
        now_millis: i64,
    ) -> Result<bool>;

    /// Overwrite content fields if current status is one of `editable`
    ///
    /// Returns whether the update applied.
    async fn update_content(
        &self,
        id: &PostingId,
        editable: &[PostingStatus],
        content: &PostingContent,
        now_millis: i64,
    ) -> Result<bool>;

    /// Remember the checkout started for a posting
    async fn record_checkout(&self, id: &PostingId, session: &CheckoutSession) -> Result<()>;

    /// Remove a posting (returns whether a row existed)
    async fn delete(&self, id: &PostingId) -> Result<bool>;

    /// All postings of an owner, newest first
    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<JobPosting>>;

    /// All postings in a status, oldest first
    async fn find_by_status(&self, status: PostingStatus) -> Result<Vec<JobPosting>>;

    /// Count postings in a status
    async fn count_by_status(&self, status: PostingStatus) -> Result<i64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory ListingStore
    ///
    /// A single mutex gives the same per-record compare-and-set semantics as
    /// the SQLite conditional UPDATE.
    #[derive(Default)]
    pub struct InMemoryListingStore {
        postings: Mutex<HashMap<PostingId, JobPosting>>,
        fail_writes: AtomicBool,
    }

    impl InMemoryListingStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every write fail with a Database error (store outage)
        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub fn len(&self) -> usize {
            self.postings.lock().unwrap().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        fn check_writable(&self) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(AppError::Database("store unavailable".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ListingStore for InMemoryListingStore {
        async fn get(&self, id: &PostingId) -> Result<Option<JobPosting>> {
            Ok(self.postings.lock().unwrap().get(id).cloned())
        }

        async fn insert(&self, posting: &JobPosting) -> Result<bool> {
            self.check_writable()?;
            let mut postings = self.postings.lock().unwrap();

            if let Some(key) = &posting.idempotency_key {
                let duplicate = postings.values().any(|p| {
                    p.owner_id == posting.owner_id && p.idempotency_key.as_deref() == Some(key)
                });
                if duplicate {
                    return Ok(false);
                }
            }
            if postings.contains_key(&posting.id) {
                return Err(AppError::Database(format!(
                    "Unique constraint violation: postings.id {}",
                    posting.id
                )));
            }

            postings.insert(posting.id.clone(), posting.clone());
            Ok(true)
        }

        async fn find_by_idempotency_key(
            &self,
            owner_id: &str,
            key: &str,
        ) -> Result<Option<JobPosting>> {
            Ok(self
                .postings
                .lock()
                .unwrap()
                .values()
                .find(|p| p.owner_id == owner_id && p.idempotency_key.as_deref() == Some(key))
                .cloned())
        }

        async fn conditional_update_status(
            &self,
            id: &PostingId,
            expected: &[PostingStatus],
            new_status: PostingStatus,
            now_millis: i64,
        ) -> Result<bool> {
            self.check_writable()?;
            let mut postings = self.postings.lock().unwrap();

            let Some(posting) = postings.get_mut(id) else {
                return Ok(false);
            };
            if !expected.contains(&posting.status) {
                return Ok(false);
            }

            posting.status = new_status;
            posting.updated_at = Some(now_millis);
            match new_status {
                PostingStatus::Active => posting.activated_at = Some(now_millis),
                PostingStatus::Expired => posting.expired_at = Some(now_millis),
                PostingStatus::PendingPayment => {}
            }
            Ok(true)
        }

        async fn update_content(
            &self,
            id: &PostingId,
            editable: &[PostingStatus],
            content: &PostingContent,
            now_millis: i64,
        ) -> Result<bool> {
            self.check_writable()?;
            let mut postings = self.postings.lock().unwrap();

            match postings.get_mut(id) {
                Some(posting) if editable.contains(&posting.status) => {
                    posting.content = content.clone();
                    posting.updated_at = Some(now_millis);
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn record_checkout(
            &self,
            id: &PostingId,
            session: &CheckoutSession,
        ) -> Result<()> {
            self.check_writable()?;
            if let Some(posting) = self.postings.lock().unwrap().get_mut(id) {
                posting.checkout_session_id = Some(session.session_id.clone());
                posting.checkout_url = Some(session.redirect_url.clone());
            }
            Ok(())
        }

        async fn delete(&self, id: &PostingId) -> Result<bool> {
            self.check_writable()?;
            Ok(self.postings.lock().unwrap().remove(id).is_some())
        }

        async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<JobPosting>> {
            let mut found: Vec<JobPosting> = self
                .postings
                .lock()
                .unwrap()
                .values()
                .filter(|p| p.owner_id == owner_id)
                .cloned()
                .collect();
            found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(found)
        }

        async fn find_by_status(&self, status: PostingStatus) -> Result<Vec<JobPosting>> {
            let mut found: Vec<JobPosting> = self
                .postings
                .lock()
                .unwrap()
                .values()
                .filter(|p| p.status == status)
                .cloned()
                .collect();
            found.sort_by_key(|p| p.created_at);
            Ok(found)
        }

        async fn count_by_status(&self, status: PostingStatus) -> Result<i64> {
            Ok(self
                .postings
                .lock()
                .unwrap()
                .values()
                .filter(|p| p.status == status)
                .count() as i64)
        }
    }
}
