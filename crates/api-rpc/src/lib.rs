//! JSON-RPC API Layer
//!
//! Owner-facing listing operations, the internal payment-completion boundary
//! and admin statistics, served as versioned JSON-RPC 2.0 methods.

pub mod error;
pub mod handler;
pub mod rate_limiter;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};
