//! Racing signals and sweeper redelivery over a shared SQLite file

mod common;

use async_trait::async_trait;
use common::{listing, Board, TempDb, START};
use jobboard_core::application::RetryPolicy;
use jobboard_core::domain::{
    JobPosting, PaymentOutcome, PostingContent, PostingId, PostingStatus, MILLIS_PER_DAY,
};
use jobboard_core::error::{AppError, Result};
use jobboard_core::port::time_provider::mocks::MockTimeProvider;
use jobboard_core::port::{CheckoutSession, ListingStore, TimerQueue};
use jobboard_infra_sqlite::SqliteListingStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_payment_and_expiration_race_expiration_wins() {
    let db = TempDb::new("race");
    let board = Arc::new(Board::new(
        db.open().await,
        Arc::new(MockTimeProvider::new(START)),
    ));

    for _ in 0..20 {
        let created = board.orchestrator.create_listing(listing("acme", 7)).await.unwrap();
        let id = created.posting_id;

        let payment = {
            let board = board.clone();
            let id = id.clone();
            tokio::spawn(async move {
                board
                    .orchestrator
                    .apply_payment_completion(&id, PaymentOutcome::Success)
                    .await
            })
        };
        let expiration = {
            let board = board.clone();
            let id = id.clone();
            tokio::spawn(async move { board.orchestrator.apply_expiration(&id).await })
        };

        payment.await.unwrap().unwrap();
        expiration.await.unwrap().unwrap();

        let posting = board.orchestrator.get_listing(&id).await.unwrap();
        assert_eq!(posting.status, PostingStatus::Expired, "posting {}", id);
        assert!(posting.expired_at.is_some());
    }

    board.pool.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_sweepers_deliver_each_timer_once() {
    let db = TempDb::new("two-sweepers");
    let clock = Arc::new(MockTimeProvider::new(START));
    let board = Board::new(db.open().await, clock.clone());

    for _ in 0..30 {
        board.orchestrator.create_listing(listing("acme", 7)).await.unwrap();
    }
    clock.advance(7 * MILLIS_PER_DAY);

    // Second "process" on the same file
    let other = Board::new(db.open().await, clock.clone());
    let (sweeper_a, sweeper_b) = (board.sweeper(), other.sweeper());
    let (a, b) = tokio::join!(sweeper_a.sweep_once(), sweeper_b.sweep_once());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.delivered + b.delivered, 30);
    assert_eq!(board.scheduler.pending_count().await.unwrap(), 0);
    assert_eq!(
        board.orchestrator.status_counts().await.unwrap().expired,
        30
    );

    board.pool.close().await;
    other.pool.close().await;
}

#[tokio::test]
async fn test_crashed_sweeper_lease_is_redelivered() {
    let db = TempDb::new("lease");
    let clock = Arc::new(MockTimeProvider::new(START));
    let board = Board::new(db.open().await, clock.clone());
    let created = board.orchestrator.create_listing(listing("acme", 7)).await.unwrap();

    clock.advance(7 * MILLIS_PER_DAY);
    // Claimed by a sweeper that dies before acknowledging
    let claimed = board
        .scheduler
        .claim_due(clock_now(&clock), 10, 60_000)
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);

    let sweeper = board.sweeper();
    assert_eq!(sweeper.sweep_once().await.unwrap().delivered, 0);

    clock.advance(60_000);
    assert_eq!(sweeper.sweep_once().await.unwrap().delivered, 1);
    assert_eq!(
        board.orchestrator.get_listing(&created.posting_id).await.unwrap().status,
        PostingStatus::Expired
    );

    board.pool.close().await;
}

fn clock_now(clock: &MockTimeProvider) -> i64 {
    use jobboard_core::port::TimeProvider;
    clock.now_millis()
}

/// SQLite store whose status writes fail a fixed number of times
struct FlakyStore {
    inner: Arc<SqliteListingStore>,
    failures_left: AtomicUsize,
}

#[async_trait]
impl ListingStore for FlakyStore {
    async fn get(&self, id: &PostingId) -> Result<Option<JobPosting>> {
        self.inner.get(id).await
    }

    async fn insert(&self, posting: &JobPosting) -> Result<bool> {
        self.inner.insert(posting).await
    }

    async fn find_by_idempotency_key(
        &self,
        owner_id: &str,
        key: &str,
    ) -> Result<Option<JobPosting>> {
        self.inner.find_by_idempotency_key(owner_id, key).await
    }

    async fn conditional_update_status(
        &self,
        id: &PostingId,
        expected: &[PostingStatus],
        new_status: PostingStatus,
        now_millis: i64,
    ) -> Result<bool> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::Database("database is locked".to_string()));
        }
        self.inner
            .conditional_update_status(id, expected, new_status, now_millis)
            .await
    }

    async fn update_content(
        &self,
        id: &PostingId,
        editable: &[PostingStatus],
        content: &PostingContent,
        now_millis: i64,
    ) -> Result<bool> {
        self.inner.update_content(id, editable, content, now_millis).await
    }

    async fn record_checkout(&self, id: &PostingId, session: &CheckoutSession) -> Result<()> {
        self.inner.record_checkout(id, session).await
    }

    async fn delete(&self, id: &PostingId) -> Result<bool> {
        self.inner.delete(id).await
    }

    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<JobPosting>> {
        self.inner.find_by_owner(owner_id).await
    }

    async fn find_by_status(&self, status: PostingStatus) -> Result<Vec<JobPosting>> {
        self.inner.find_by_status(status).await
    }

    async fn count_by_status(&self, status: PostingStatus) -> Result<i64> {
        self.inner.count_by_status(status).await
    }
}

#[tokio::test]
async fn test_failed_delivery_backs_off_then_succeeds() {
    let db = TempDb::new("redelivery");
    let clock = Arc::new(MockTimeProvider::new(START));
    let pool = db.open().await;
    let sqlite_store = Arc::new(SqliteListingStore::new(pool.clone()));
    let flaky = Arc::new(FlakyStore {
        inner: sqlite_store.clone(),
        failures_left: AtomicUsize::new(0),
    });
    let board = Board::with_store(pool, clock.clone(), sqlite_store, flaky.clone());

    let created = board.orchestrator.create_listing(listing("acme", 7)).await.unwrap();
    flaky.failures_left.store(2, Ordering::SeqCst);
    clock.advance(7 * MILLIS_PER_DAY);

    // Backoff of 1s, 2s with jitter of at most 10%
    let sweeper = board.sweeper_with(RetryPolicy::new(1_000, 2.0, 60_000));

    let first = sweeper.sweep_once().await.unwrap();
    assert_eq!((first.delivered, first.retried), (0, 1));
    assert_eq!(sweeper.sweep_once().await.unwrap().retried, 0);

    clock.advance(1_100);
    let second = sweeper.sweep_once().await.unwrap();
    assert_eq!((second.delivered, second.retried), (0, 1));

    clock.advance(2_200);
    let third = sweeper.sweep_once().await.unwrap();
    assert_eq!((third.delivered, third.retried), (1, 0));

    assert_eq!(
        board.orchestrator.get_listing(&created.posting_id).await.unwrap().status,
        PostingStatus::Expired
    );
    assert_eq!(board.scheduler.pending_count().await.unwrap(), 0);

    board.pool.close().await;
}
