//! The live connection handle tracked by the registry.

use crate::config::SyncOptions;
use crate::db::pool::DbPool;
use crate::db::transaction::DbTransaction;
use crate::error::{DbError, DbResult};
use crate::models::{Dialect, ModelDefinition};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A live database client: a backend pool plus the model definitions
/// attached to it at startup.
///
/// At most one live handle exists per connection name within one registry.
#[derive(Debug)]
pub struct ConnectionHandle {
    name: String,
    pool: DbPool,
    models: RwLock<Vec<ModelDefinition>>,
    opened_at: DateTime<Utc>,
}

impl ConnectionHandle {
    pub(crate) fn new(name: impl Into<String>, pool: DbPool) -> Self {
        Self {
            name: name.into(),
            pool,
            models: RwLock::new(Vec::new()),
            opened_at: Utc::now(),
        }
    }

    /// The connection name this handle is registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The backend dialect.
    pub fn dialect(&self) -> Dialect {
        self.pool.dialect()
    }

    /// The underlying pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// When this handle was built.
    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Attach model definitions to this handle.
    pub(crate) async fn attach_models(&self, definitions: Vec<ModelDefinition>) {
        debug!(
            connection = %self.name,
            count = definitions.len(),
            "Attaching model definitions"
        );
        *self.models.write().await = definitions;
    }

    /// A snapshot of the attached model definitions.
    pub async fn models(&self) -> Vec<ModelDefinition> {
        self.models.read().await.clone()
    }

    /// Resolve the physical table name for a logical model, honoring any
    /// remap applied at startup.
    pub async fn table_name(&self, model: &str) -> Option<String> {
        self.models
            .read()
            .await
            .iter()
            .find(|definition| definition.model == model)
            .map(|definition| definition.table.clone())
    }

    /// Verify connectivity.
    pub async fn authenticate(&self) -> DbResult<()> {
        self.pool.ping().await
    }

    /// Reconcile the schema: render and execute each attached definition's
    /// DDL. With `force`, each table is dropped first.
    pub async fn sync(&self, options: &SyncOptions) -> DbResult<()> {
        let definitions = self.models().await;
        for definition in &definitions {
            if options.force {
                self.execute_ddl(&format!("DROP TABLE IF EXISTS {}", definition.table))
                    .await?;
            }
            self.execute_ddl(&definition.render_ddl()).await?;
            debug!(
                connection = %self.name,
                model = %definition.model,
                table = %definition.table,
                "Synchronized model"
            );
        }
        if !definitions.is_empty() {
            info!(
                connection = %self.name,
                models = definitions.len(),
                force = options.force,
                "Schema synchronized"
            );
        }
        Ok(())
    }

    async fn execute_ddl(&self, sql: &str) -> DbResult<()> {
        match &self.pool {
            DbPool::MySql(pool) => sqlx::query(sql).execute(pool).await.map(|_| ()),
            DbPool::Postgres(pool) => sqlx::query(sql).execute(pool).await.map(|_| ()),
            DbPool::SQLite(pool) => sqlx::query(sql).execute(pool).await.map(|_| ()),
        }
        .map_err(DbError::from)
    }

    /// Begin a transaction on this handle.
    pub async fn begin(&self) -> DbResult<DbTransaction> {
        let tx = match &self.pool {
            DbPool::MySql(pool) => DbTransaction::MySql(pool.begin().await.map_err(DbError::from)?),
            DbPool::Postgres(pool) => {
                DbTransaction::Postgres(pool.begin().await.map_err(DbError::from)?)
            }
            DbPool::SQLite(pool) => {
                DbTransaction::SQLite(pool.begin().await.map_err(DbError::from)?)
            }
        };
        debug!(connection = %self.name, "Transaction started");
        Ok(tx)
    }

    /// Close the underlying pool. Idempotent.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Whether the underlying pool has been closed.
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolOptions;
    use crate::db::pool::create_pool;

    async fn sqlite_handle() -> ConnectionHandle {
        let pool = create_pool("sqlite::memory:", &PoolOptions::default())
            .await
            .unwrap();
        ConnectionHandle::new("default", pool)
    }

    #[tokio::test]
    async fn test_attach_and_lookup_models() {
        let handle = sqlite_handle().await;
        assert!(handle.models().await.is_empty());

        handle
            .attach_models(vec![ModelDefinition::new(
                "User",
                "app_users",
                "CREATE TABLE IF NOT EXISTS {table} (id INTEGER PRIMARY KEY)",
            )])
            .await;

        assert_eq!(handle.models().await.len(), 1);
        assert_eq!(
            handle.table_name("User").await.as_deref(),
            Some("app_users")
        );
        assert!(handle.table_name("Order").await.is_none());
    }

    #[tokio::test]
    async fn test_sync_creates_tables() {
        let handle = sqlite_handle().await;
        handle
            .attach_models(vec![ModelDefinition::new(
                "User",
                "users",
                "CREATE TABLE IF NOT EXISTS {table} (id INTEGER PRIMARY KEY, name TEXT)",
            )])
            .await;

        handle.sync(&SyncOptions::default()).await.unwrap();
        handle.authenticate().await.unwrap();

        // The table exists: inserting into it succeeds.
        let mut tx = handle.begin().await.unwrap();
        let affected = tx
            .execute("INSERT INTO users (id, name) VALUES (1, 'a')", &[])
            .await
            .unwrap();
        assert_eq!(affected, 1);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_sync_force_recreates_tables() {
        let handle = sqlite_handle().await;
        handle
            .attach_models(vec![ModelDefinition::new(
                "User",
                "users",
                "CREATE TABLE IF NOT EXISTS {table} (id INTEGER PRIMARY KEY, name TEXT)",
            )])
            .await;
        handle.sync(&SyncOptions::default()).await.unwrap();

        let mut tx = handle.begin().await.unwrap();
        tx.execute("INSERT INTO users (id, name) VALUES (1, 'a')", &[])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        handle.sync(&SyncOptions { force: true }).await.unwrap();

        let mut tx = handle.begin().await.unwrap();
        let rows = tx.fetch_all("SELECT id FROM users", &[]).await.unwrap();
        assert!(rows.is_empty());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_sync_surfaces_invalid_ddl() {
        let handle = sqlite_handle().await;
        handle
            .attach_models(vec![ModelDefinition::new("Broken", "broken", "NOT VALID SQL")])
            .await;

        let result = handle.sync(&SyncOptions::default()).await;
        assert!(matches!(result, Err(DbError::Database { .. })));
    }
}
