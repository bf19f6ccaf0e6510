//! Named database connection lifecycle.
//!
//! This library wires database connections into a host application's
//! startup and shutdown phases:
//! - a [`ConnectionRegistry`] tracks live handles by name
//! - a [`ConnectionFactory`] builds each handle at startup (with retry),
//!   attaches registered model definitions, and synchronizes schema
//! - [`with_transaction`] resolves a handle by name and scopes a unit of
//!   work to one transaction, passing an already-open transaction through
//!   unchanged
//! - a [`DatabaseModule`] binds one configuration to init/shutdown hooks

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod module;

pub use config::{ConnectionOptions, DEFAULT_CONNECTION_NAME, PoolOptions, SyncOptions};
pub use db::{
    ConnectionFactory, ConnectionHandle, ConnectionRegistry, DbPool, DbTransaction, RetryPolicy,
    TransactionOptions, with_retry, with_transaction,
};
pub use error::{DbError, DbResult};
pub use models::{Dialect, ModelDefinition, ModelRegistry, QueryParam};
pub use module::DatabaseModule;
