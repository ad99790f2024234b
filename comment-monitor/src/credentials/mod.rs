//! Credential management.
//!
//! - [`CredentialPool`]: executes remote operations with automatic account failover
//! - [`PoolError`]: configuration, exhaustion, rejection and cancellation outcomes

mod error;
mod pool;

pub use error::PoolError;
pub use pool::{CredentialPool, DEFAULT_ROTATION_BACKOFF};
