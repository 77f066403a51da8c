// Application Layer - Use Cases and Business Logic

pub mod listing;
pub mod recovery;
pub mod retry;
pub mod sweeper;

// Re-exports
pub use listing::{
    CreateListingRequest, CreatedListing, LifecycleOrchestrator, StatusCounts, TransitionOutcome,
};
pub use recovery::RecoveryService;
pub use retry::RetryPolicy;
pub use sweeper::{shutdown_channel, ExpirationSweeper, ShutdownSender, ShutdownToken, SweeperConfig};
