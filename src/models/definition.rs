//! Model definitions and the metadata store the factory reads them from.
//!
//! A model definition ties a logical model name to a physical table and the
//! DDL used to create it. Definitions are registered per connection name;
//! the factory collects them at startup, applies any table remap, and
//! attaches them to the handle it builds.

use std::collections::HashMap;
use tokio::sync::RwLock;

/// Placeholder in DDL templates replaced with the physical table name.
const TABLE_PLACEHOLDER: &str = "{table}";

/// One schema definition: logical model, physical table, and its DDL.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ModelDefinition {
    /// Logical model name, e.g. "User".
    pub model: String,
    /// Physical table name. Subject to the `table_names` remap.
    pub table: String,
    /// DDL template; occurrences of `{table}` are replaced with the
    /// physical table name at synchronize time.
    pub ddl: String,
}

impl ModelDefinition {
    pub fn new(
        model: impl Into<String>,
        table: impl Into<String>,
        ddl: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            table: table.into(),
            ddl: ddl.into(),
        }
    }

    /// Render the DDL against the current physical table name.
    pub fn render_ddl(&self) -> String {
        self.ddl.replace(TABLE_PLACEHOLDER, &self.table)
    }
}

/// Registry of model definitions grouped by connection name.
///
/// This is the metadata store the factory consults at startup; it does not
/// own or track live connections.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    by_connection: RwLock<HashMap<String, Vec<ModelDefinition>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one definition under a connection name.
    pub async fn register(&self, connection_name: &str, definition: ModelDefinition) {
        let mut map = self.by_connection.write().await;
        map.entry(connection_name.to_string())
            .or_default()
            .push(definition);
    }

    /// Register several definitions under a connection name.
    pub async fn register_all(
        &self,
        connection_name: &str,
        definitions: impl IntoIterator<Item = ModelDefinition>,
    ) {
        let mut map = self.by_connection.write().await;
        map.entry(connection_name.to_string())
            .or_default()
            .extend(definitions);
    }

    /// A snapshot of the definitions registered under a connection name.
    pub async fn models_for(&self, connection_name: &str) -> Vec<ModelDefinition> {
        let map = self.by_connection.read().await;
        map.get(connection_name).cloned().unwrap_or_default()
    }

    /// Drop all definitions registered under a connection name.
    pub async fn clear(&self, connection_name: &str) {
        let mut map = self.by_connection.write().await;
        map.remove(connection_name);
    }

    /// Number of definitions registered under a connection name.
    pub async fn count_for(&self, connection_name: &str) -> usize {
        let map = self.by_connection.read().await;
        map.get(connection_name).map_or(0, Vec::len)
    }
}

/// Apply a logical→physical table remap to a set of definitions.
///
/// Keys of the remap address the definition's current table name; models not
/// named in the map are left untouched.
pub fn apply_table_remap(definitions: &mut [ModelDefinition], remap: &HashMap<String, String>) {
    for definition in definitions {
        if let Some(physical) = remap.get(&definition.table) {
            definition.table = physical.clone();
        }
    }
}
