//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use jobboard_core::domain::DomainError;
use jobboard_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const THROTTLED: i32 = 4003;
    pub const FORBIDDEN: i32 = 4030;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const DB_ERROR: i32 = 5001;
    pub const EXTERNAL_ERROR: i32 = 5002;
}

fn domain_code(err: &DomainError) -> i32 {
    match err {
        DomainError::InvalidDuration(_) | DomainError::Validation(_) => code::VALIDATION_ERROR,
        DomainError::NotFound(_) => code::NOT_FOUND,
        DomainError::Terminal(_) | DomainError::AlreadyActive(_) => code::CONFLICT,
        DomainError::Forbidden { .. } => code::FORBIDDEN,
    }
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    let code = match &err {
        AppError::Domain(e) => domain_code(e),
        AppError::Serialization(_) => code::VALIDATION_ERROR,
        AppError::Database(_) => code::DB_ERROR,
        AppError::Gateway(_) | AppError::Scheduler(_) => code::EXTERNAL_ERROR,
        AppError::Io(_) | AppError::Config(_) | AppError::Internal(_) => code::INTERNAL_ERROR,
    };

    let message = match err {
        AppError::Domain(e) => e.to_string(),
        other => other.to_string(),
    };
    ErrorObjectOwned::owned(code, message, None::<()>)
}

pub fn throttled() -> ErrorObjectOwned {
    ErrorObjectOwned::owned(
        code::THROTTLED,
        "Rate limit exceeded. Please slow down.",
        None::<()>,
    )
}
