//! Shared wiring for the end-to-end tests: real SQLite, mock gateway, mock clock

#![allow(dead_code)]

use jobboard_core::application::{
    CreateListingRequest, ExpirationSweeper, LifecycleOrchestrator, RecoveryService, RetryPolicy,
    SweeperConfig,
};
use jobboard_core::domain::{PostingContent, PricingTable};
use jobboard_core::port::id_provider::UuidProvider;
use jobboard_core::port::payment_gateway::mocks::MockPaymentGateway;
use jobboard_core::port::time_provider::mocks::MockTimeProvider;
use jobboard_core::port::ListingStore;
use jobboard_infra_sqlite::{
    create_pool, run_migrations, SqliteExpirationScheduler, SqliteListingStore,
};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const START: i64 = 1_700_000_000_000;

/// A fresh database file under the temp dir
pub struct TempDb {
    pub path: PathBuf,
}

impl TempDb {
    pub fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "jobboard-it-{}-{}.db",
            name,
            uuid::Uuid::new_v4()
        ));
        Self { path }
    }

    pub fn url(&self) -> String {
        format!("sqlite://{}", self.path.display())
    }

    pub async fn open(&self) -> SqlitePool {
        let pool = create_pool(&self.url()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", self.path.display(), suffix));
        }
    }
}

pub async fn memory_pool() -> SqlitePool {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

/// Orchestrator, sweeper and recovery over one pool
pub struct Board {
    pub pool: SqlitePool,
    pub clock: Arc<MockTimeProvider>,
    pub store: Arc<SqliteListingStore>,
    pub scheduler: Arc<SqliteExpirationScheduler>,
    pub gateway: Arc<MockPaymentGateway>,
    pub orchestrator: Arc<LifecycleOrchestrator>,
}

impl Board {
    pub fn new(pool: SqlitePool, clock: Arc<MockTimeProvider>) -> Self {
        let store = Arc::new(SqliteListingStore::new(pool.clone()));
        Self::with_store(pool, clock, store.clone(), store)
    }

    /// `store` is what the orchestrator talks to (may wrap `sqlite_store`)
    pub fn with_store(
        pool: SqlitePool,
        clock: Arc<MockTimeProvider>,
        sqlite_store: Arc<SqliteListingStore>,
        store: Arc<dyn ListingStore>,
    ) -> Self {
        let scheduler = Arc::new(SqliteExpirationScheduler::new(pool.clone(), clock.clone()));
        let gateway = Arc::new(MockPaymentGateway::new());
        let orchestrator = Arc::new(LifecycleOrchestrator::new(
            store,
            gateway.clone(),
            scheduler.clone(),
            PricingTable::default(),
            Arc::new(UuidProvider),
            clock.clone(),
        ));

        Self {
            pool,
            clock,
            store: sqlite_store,
            scheduler,
            gateway,
            orchestrator,
        }
    }

    pub fn sweeper(&self) -> ExpirationSweeper {
        self.sweeper_with(RetryPolicy::new(1_000, 2.0, 60_000))
    }

    pub fn sweeper_with(&self, retry_policy: RetryPolicy) -> ExpirationSweeper {
        ExpirationSweeper::new(
            self.orchestrator.clone(),
            self.scheduler.clone(),
            retry_policy,
            self.clock.clone(),
            SweeperConfig {
                poll_interval: Duration::from_millis(10),
                batch_size: 50,
                lease_ms: 60_000,
            },
        )
    }

    pub fn recovery(&self) -> RecoveryService {
        RecoveryService::new(self.store.clone(), self.scheduler.clone(), self.clock.clone())
    }
}

pub fn listing(owner: &str, days: u32) -> CreateListingRequest {
    CreateListingRequest {
        owner_id: owner.to_string(),
        content: PostingContent::new_test("Data Engineer"),
        duration_days: days,
        idempotency_key: None,
    }
}
