//! Transaction scoping for units of work.
//!
//! [`with_transaction`] resolves a registered connection by name and runs a
//! unit of work inside a transaction, committing on success and rolling back
//! on error. A caller already holding an open transaction passes it in and
//! the unit of work runs on it unchanged, so nested transactional calls
//! compose without opening a second transaction.

use crate::config::DEFAULT_CONNECTION_NAME;
use crate::db::registry::ConnectionRegistry;
use crate::error::{DbError, DbResult};
use crate::models::{Dialect, QueryParam, RowToJson};
use futures_util::TryStreamExt;
use futures_util::future::BoxFuture;
use sqlx::types::Json;
use std::sync::Arc;
use tracing::{debug, warn};

fn bind_mysql_param<'q>(
    query: sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Json(v) => query.bind(Json(v)),
    }
}

fn bind_postgres_param<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Json(v) => query.bind(Json(v)),
    }
}

fn bind_sqlite_param<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        // SQLite has no native JSON type, store as text
        QueryParam::Json(v) => query.bind(v.to_string()),
    }
}

/// Database-specific transaction wrapper.
///
/// Owned by the call stack that opened it; consumed by commit or rollback.
pub enum DbTransaction {
    /// MySQL transaction
    MySql(sqlx::Transaction<'static, sqlx::MySql>),
    /// PostgreSQL transaction
    Postgres(sqlx::Transaction<'static, sqlx::Postgres>),
    /// SQLite transaction
    SQLite(sqlx::Transaction<'static, sqlx::Sqlite>),
}

impl DbTransaction {
    /// Get the dialect for this transaction.
    pub fn dialect(&self) -> Dialect {
        match self {
            DbTransaction::MySql(_) => Dialect::MySql,
            DbTransaction::Postgres(_) => Dialect::Postgres,
            DbTransaction::SQLite(_) => Dialect::SQLite,
        }
    }

    /// Commit the transaction.
    pub async fn commit(self) -> DbResult<()> {
        match self {
            DbTransaction::MySql(tx) => tx.commit().await.map_err(DbError::from),
            DbTransaction::Postgres(tx) => tx.commit().await.map_err(DbError::from),
            DbTransaction::SQLite(tx) => tx.commit().await.map_err(DbError::from),
        }
    }

    /// Rollback the transaction.
    pub async fn rollback(self) -> DbResult<()> {
        match self {
            DbTransaction::MySql(tx) => tx.rollback().await.map_err(DbError::from),
            DbTransaction::Postgres(tx) => tx.rollback().await.map_err(DbError::from),
            DbTransaction::SQLite(tx) => tx.rollback().await.map_err(DbError::from),
        }
    }

    /// Execute a statement within the transaction, returning affected rows.
    pub async fn execute(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<u64> {
        let rows_affected = match self {
            DbTransaction::MySql(tx) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_mysql_param(query, param);
                }
                query
                    .execute(&mut **tx)
                    .await
                    .map_err(DbError::from)?
                    .rows_affected()
            }
            DbTransaction::Postgres(tx) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_postgres_param(query, param);
                }
                query
                    .execute(&mut **tx)
                    .await
                    .map_err(DbError::from)?
                    .rows_affected()
            }
            DbTransaction::SQLite(tx) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_sqlite_param(query, param);
                }
                query
                    .execute(&mut **tx)
                    .await
                    .map_err(DbError::from)?
                    .rows_affected()
            }
        };

        debug!(sql = %sql, rows_affected, "Executed in transaction");
        Ok(rows_affected)
    }

    /// Run a query within the transaction, returning rows as JSON maps.
    pub async fn fetch_all(
        &mut self,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<Vec<serde_json::Map<String, serde_json::Value>>> {
        let rows: Vec<serde_json::Map<String, serde_json::Value>> = match self {
            DbTransaction::MySql(tx) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_mysql_param(query, param);
                }
                let rows: Vec<sqlx::mysql::MySqlRow> = query
                    .fetch(&mut **tx)
                    .try_collect()
                    .await
                    .map_err(DbError::from)?;
                rows.iter().map(|r| r.to_json_map()).collect()
            }
            DbTransaction::Postgres(tx) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_postgres_param(query, param);
                }
                let rows: Vec<sqlx::postgres::PgRow> = query
                    .fetch(&mut **tx)
                    .try_collect()
                    .await
                    .map_err(DbError::from)?;
                rows.iter().map(|r| r.to_json_map()).collect()
            }
            DbTransaction::SQLite(tx) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_sqlite_param(query, param);
                }
                let rows: Vec<sqlx::sqlite::SqliteRow> = query
                    .fetch(&mut **tx)
                    .try_collect()
                    .await
                    .map_err(DbError::from)?;
                rows.iter().map(|r| r.to_json_map()).collect()
            }
        };

        debug!(sql = %sql, row_count = rows.len(), "Queried in transaction");
        Ok(rows)
    }
}

impl std::fmt::Debug for DbTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DbTransaction")
            .field(&self.dialect())
            .finish()
    }
}

/// Callback invoked with a failed unit of work's error before it is surfaced.
pub type ErrorCallback = Arc<dyn Fn(&DbError) + Send + Sync>;

/// Options for [`with_transaction`].
#[derive(Clone, Default)]
pub struct TransactionOptions {
    /// Connection name. `None` resolves to the default name.
    pub name: Option<String>,
    /// Observer for unit-of-work failures. The error is surfaced to the
    /// caller either way.
    pub on_error: Option<ErrorCallback>,
}

impl TransactionOptions {
    /// Options targeting a named connection.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Attach an error observer.
    pub fn on_error(mut self, callback: impl Fn(&DbError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

impl std::fmt::Debug for TransactionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionOptions")
            .field("name", &self.name)
            .field("has_on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Run a unit of work inside a transaction on a registered connection.
///
/// The connection is resolved by `options.name` (or the default name) and the
/// call fails with [`DbError::ConnectionNotFound`] before the unit of work
/// runs when nothing is registered under it. When `existing` carries an open
/// transaction the work runs on it unchanged and the outer scope keeps
/// ownership of commit and rollback; otherwise a transaction is begun here,
/// committed on `Ok` and rolled back on `Err`.
pub async fn with_transaction<T, F>(
    registry: &ConnectionRegistry,
    options: &TransactionOptions,
    existing: Option<&mut DbTransaction>,
    work: F,
) -> DbResult<T>
where
    F: for<'t> FnOnce(&'t mut DbTransaction) -> BoxFuture<'t, DbResult<T>>,
{
    let name = options.name.as_deref().unwrap_or(DEFAULT_CONNECTION_NAME);

    let handle = registry
        .get(name)
        .await
        .ok_or_else(|| DbError::connection_not_found(name))?;

    // Nested composition: an outer transactional call passes its open
    // transaction straight through and keeps commit/rollback ownership.
    if let Some(tx) = existing {
        return work(tx).await;
    }

    let mut tx = handle.begin().await?;
    let result = match work(&mut tx).await {
        Ok(value) => tx.commit().await.map(|()| value),
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(
                    connection = name,
                    error = %rollback_err,
                    "Rollback failed after unit of work error"
                );
            }
            Err(err)
        }
    };

    match result {
        Ok(value) => Ok(value),
        Err(err) => {
            if let Some(callback) = &options.on_error {
                callback(&err);
            }
            // The failure is surfaced regardless; the callback only observes.
            Err(err)
        }
    }
}
