//! Connection lifecycle layer.
//!
//! This module provides the pieces the host application wires together:
//! - Named connection registry
//! - Connection factory with startup retry
//! - Transaction scoping helper
//! - Backend-specific pool and transaction wrappers

pub mod factory;
pub mod handle;
pub mod pool;
pub mod registry;
pub mod retry;
pub mod transaction;

pub use factory::ConnectionFactory;
pub use handle::ConnectionHandle;
pub use pool::DbPool;
pub use registry::ConnectionRegistry;
pub use retry::{RetryPolicy, with_retry};
pub use transaction::{DbTransaction, TransactionOptions, with_transaction};
