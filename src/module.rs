//! Per-module-instance lifecycle wrapper.
//!
//! A `DatabaseModule` binds one connection configuration to the host
//! application's startup and shutdown hooks: `init` runs the factory,
//! `shutdown` closes the handle under the configured name and removes its
//! registry entry. Module instances sharing one registry see each other's
//! connections by name.

use crate::config::ConnectionOptions;
use crate::db::factory::ConnectionFactory;
use crate::db::handle::ConnectionHandle;
use crate::error::DbResult;
use std::sync::Arc;
use tracing::info;

/// One module instance: configuration plus the factory it runs through.
#[derive(Debug, Clone)]
pub struct DatabaseModule {
    id: String,
    options: ConnectionOptions,
    factory: ConnectionFactory,
}

impl DatabaseModule {
    pub fn new(factory: ConnectionFactory, options: ConnectionOptions) -> Self {
        Self {
            id: generate_module_id(),
            options,
            factory,
        }
    }

    /// Unique id of this module instance.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The connection name this module manages.
    pub fn connection_name(&self) -> &str {
        self.options.resolved_name()
    }

    /// The configuration this module was built with.
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Startup hook: build, verify, and register the connection.
    pub async fn init(&self) -> DbResult<Arc<ConnectionHandle>> {
        info!(
            module = %self.id,
            connection = self.connection_name(),
            "Initializing database module"
        );
        self.factory.create_connection(&self.options).await
    }

    /// Shutdown hook: close the handle under the configured name, if
    /// present, and remove the registry entry regardless of close outcome.
    pub async fn shutdown(&self) {
        info!(
            module = %self.id,
            connection = self.connection_name(),
            "Shutting down database module"
        );
        self.factory.shutdown(self.connection_name()).await;
    }
}

/// Generate a unique module instance id.
fn generate_module_id() -> String {
    format!("mod_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::registry::ConnectionRegistry;
    use crate::models::ModelRegistry;

    fn module(options: ConnectionOptions) -> DatabaseModule {
        let factory = ConnectionFactory::new(
            Arc::new(ConnectionRegistry::new()),
            Arc::new(ModelRegistry::new()),
        );
        DatabaseModule::new(factory, options)
    }

    #[test]
    fn test_module_id_format() {
        let module = module(ConnectionOptions::default());
        assert!(module.id().starts_with("mod_"));
        assert_eq!(module.id().len(), 4 + 32); // "mod_" + 32 hex chars
    }

    #[test]
    fn test_module_ids_unique_per_instance() {
        let a = module(ConnectionOptions::default());
        let b = module(ConnectionOptions::default());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_connection_name_resolution() {
        let anonymous = module(ConnectionOptions::default());
        assert_eq!(anonymous.connection_name(), "default");

        let named = module(ConnectionOptions {
            name: Some("analytics".to_string()),
            ..ConnectionOptions::default()
        });
        assert_eq!(named.connection_name(), "analytics");
    }
}
