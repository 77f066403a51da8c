// Domain Error Types

use thiserror::Error;

/// Rejections produced by the listing lifecycle rules.
///
/// None of these are retryable: a redelivered request gets the same answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid listing duration: no pricing tier for {0} days")]
    InvalidDuration(u32),

    #[error("Owner {owner_id} does not own posting {posting_id}")]
    Forbidden {
        posting_id: String,
        owner_id: String,
    },

    #[error("Posting not found: {0}")]
    NotFound(String),

    #[error("Posting {0} has expired")]
    Terminal(String),

    #[error("Posting {0} is already active")]
    AlreadyActive(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
