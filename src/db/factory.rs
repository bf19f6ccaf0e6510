//! Connection factory: builds, verifies, and registers handles at startup.

use crate::config::ConnectionOptions;
use crate::db::handle::ConnectionHandle;
use crate::db::pool::create_pool;
use crate::db::registry::ConnectionRegistry;
use crate::db::retry::with_retry;
use crate::error::{DbError, DbResult};
use crate::models::definition::apply_table_remap;
use crate::models::{ModelDefinition, ModelRegistry};
use std::sync::Arc;
use tracing::{info, warn};

/// Builds one connection handle per configuration and registers it.
///
/// The registry and model store are shared instances owned by the host;
/// cloning the factory clones the references, not the stores.
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    registry: Arc<ConnectionRegistry>,
    models: Arc<ModelRegistry>,
}

impl ConnectionFactory {
    pub fn new(registry: Arc<ConnectionRegistry>, models: Arc<ModelRegistry>) -> Self {
        Self { registry, models }
    }

    /// The connection registry this factory writes to.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// The model metadata store this factory reads from.
    pub fn models(&self) -> &Arc<ModelRegistry> {
        &self.models
    }

    /// Build, verify, and register a connection.
    ///
    /// The whole connect-and-verify sequence runs through the retry operator
    /// with the configured attempt budget and delay. A duplicate name is a
    /// configuration conflict and fails without retrying; each failed
    /// attempt tears its own registration down first, so a retry starts from
    /// a clean registry.
    pub async fn create_connection(
        &self,
        options: &ConnectionOptions,
    ) -> DbResult<Arc<ConnectionHandle>> {
        let name = options.resolved_name().to_string();
        let policy = options.retry_policy();

        with_retry(policy, || self.try_create(&name, options)).await
    }

    async fn try_create(
        &self,
        name: &str,
        options: &ConnectionOptions,
    ) -> DbResult<Arc<ConnectionHandle>> {
        // Collect the definitions registered under this name and apply the
        // physical table remap before anything touches the database.
        let mut definitions = self.models.models_for(name).await;
        if let Some(remap) = &options.table_names {
            apply_table_remap(&mut definitions, remap);
        }

        let url = options.connection_url().map_err(DbError::config)?;
        let pool = create_pool(&url, &options.pool).await?;
        let handle = Arc::new(ConnectionHandle::new(name, pool));

        // A name that is already live is a configuration conflict. The pool
        // built for this attempt is closed before the error surfaces.
        if self.registry.contains(name).await {
            handle.close().await;
            return Err(DbError::duplicate_connection(name));
        }

        self.registry.add(name, Arc::clone(&handle)).await;
        info!(
            connection = name,
            dialect = %handle.dialect(),
            "Connection registered"
        );

        if !options.auto_load_models {
            return Ok(handle);
        }

        match self.finish_setup(&handle, definitions, options).await {
            Ok(()) => Ok(handle),
            Err(err) => {
                // Unwind this attempt's registration so a retry does not
                // collide with its own leftovers.
                self.registry.remove(name).await;
                handle.close().await;
                warn!(connection = name, error = %err, "Connection setup failed");
                Err(err)
            }
        }
    }

    async fn finish_setup(
        &self,
        handle: &ConnectionHandle,
        definitions: Vec<ModelDefinition>,
        options: &ConnectionOptions,
    ) -> DbResult<()> {
        handle.attach_models(definitions).await;
        handle.authenticate().await?;
        if options.should_synchronize() {
            handle.sync(&options.sync).await?;
        }
        Ok(())
    }

    /// Shutdown hook: close the handle registered under `name`, if any, and
    /// remove the registry entry regardless of close outcome. Idempotent.
    pub async fn shutdown(&self, name: &str) {
        if let Some(handle) = self.registry.get(name).await {
            handle.close().await;
            info!(connection = name, "Connection closed");
        }
        self.registry.remove(name).await;
    }
}
