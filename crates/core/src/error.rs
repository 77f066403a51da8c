// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True for failures of a collaborator (store, gateway, scheduler) rather
    /// than a rejection of the request itself. Signal handlers propagate these
    /// so the delivering collaborator retries.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Gateway(_)
                | AppError::Scheduler(_)
                | AppError::Io(_)
                | AppError::Internal(_)
        )
    }

    /// Borrow the domain error, if this is one
    pub fn as_domain(&self) -> Option<&crate::domain::DomainError> {
        match self {
            AppError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Note: sqlx::Error and reqwest::Error conversions live in the infra crates
// (orphan rule), mapped to AppError::Database / AppError::Gateway
