// Domain Layer - Pure business logic and entities

pub mod error;
pub mod posting;
pub mod pricing;

// Re-exports
pub use error::DomainError;
pub use posting::{
    EmploymentType, JobPosting, OwnerId, PaymentOutcome, PostingContent, PostingId,
    PostingStatus, MILLIS_PER_DAY,
};
pub use pricing::{PricingTable, PricingTier};
