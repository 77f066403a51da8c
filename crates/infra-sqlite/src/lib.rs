// Job Board Infrastructure - SQLite Adapter
// Implements: ListingStore, ExpirationScheduler, TimerQueue

mod connection;
mod error;
mod expiration_scheduler;
mod listing_store;
mod migration;

pub use connection::create_pool;
pub use expiration_scheduler::SqliteExpirationScheduler;
pub use listing_store::SqliteListingStore;
pub use migration::run_migrations;

// Note: sqlx::Error conversion goes through `error::map_sqlx_error`
// (orphan rules forbid `From<sqlx::Error> for AppError` here)
