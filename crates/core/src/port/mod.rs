// Port Layer - Interfaces for external collaborators

pub mod expiration_scheduler;
pub mod id_provider; // For deterministic testing
pub mod listing_store;
pub mod payment_gateway;
pub mod time_provider;

// Re-exports
pub use expiration_scheduler::{DueTimer, ExpirationScheduler, TimerQueue};
pub use id_provider::IdProvider;
pub use listing_store::ListingStore;
pub use payment_gateway::{CheckoutRequest, CheckoutSession, PaymentGateway};
pub use time_provider::TimeProvider;
