//! Named connection registry.
//!
//! A shared store mapping connection names to live handles. Written by the
//! factory at startup and by shutdown hooks; read by the transaction helper
//! and any consumer resolving connections outside the host's own wiring.
//! Share one instance (behind `Arc`) everywhere cross-cutting visibility of
//! connections is wanted.

use crate::db::handle::ConnectionHandle;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Registry of live connection handles keyed by name.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    handles: RwLock<HashMap<String, Arc<ConnectionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a handle under a name. Unconditional: a later write under the
    /// same name wins. Duplicate detection is the factory's concern.
    pub async fn add(&self, name: &str, handle: Arc<ConnectionHandle>) {
        let mut handles = self.handles.write().await;
        if handles.insert(name.to_string(), handle).is_some() {
            debug!(connection = name, "Replaced existing registry entry");
        }
    }

    /// Look up a handle by name.
    pub async fn get(&self, name: &str) -> Option<Arc<ConnectionHandle>> {
        let handles = self.handles.read().await;
        handles.get(name).cloned()
    }

    /// Remove the entry under a name, returning it if present.
    pub async fn remove(&self, name: &str) -> Option<Arc<ConnectionHandle>> {
        let mut handles = self.handles.write().await;
        handles.remove(name)
    }

    /// Check whether a name is registered.
    pub async fn contains(&self, name: &str) -> bool {
        let handles = self.handles.read().await;
        handles.contains_key(name)
    }

    /// List all registered connection names.
    pub async fn names(&self) -> Vec<String> {
        let handles = self.handles.read().await;
        handles.keys().cloned().collect()
    }

    /// Number of registered connections.
    pub async fn count(&self) -> usize {
        let handles = self.handles.read().await;
        handles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolOptions;
    use crate::db::pool::create_pool;

    async fn handle(name: &str) -> Arc<ConnectionHandle> {
        let pool = create_pool("sqlite::memory:", &PoolOptions::default())
            .await
            .unwrap();
        Arc::new(ConnectionHandle::new(name, pool))
    }

    #[tokio::test]
    async fn test_add_get_remove() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.count().await, 0);

        let first = handle("default").await;
        registry.add("default", Arc::clone(&first)).await;

        let fetched = registry.get("default").await.unwrap();
        assert!(Arc::ptr_eq(&first, &fetched));
        assert!(registry.contains("default").await);

        let removed = registry.remove("default").await.unwrap();
        assert!(Arc::ptr_eq(&first, &removed));
        assert!(registry.get("default").await.is_none());
    }

    #[tokio::test]
    async fn test_add_last_write_wins() {
        let registry = ConnectionRegistry::new();
        let first = handle("default").await;
        let second = handle("default").await;

        registry.add("default", Arc::clone(&first)).await;
        registry.add("default", Arc::clone(&second)).await;

        let fetched = registry.get("default").await.unwrap();
        assert!(Arc::ptr_eq(&second, &fetched));
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn test_remove_missing_is_noop() {
        let registry = ConnectionRegistry::new();
        assert!(registry.remove("ghost").await.is_none());
    }

    #[tokio::test]
    async fn test_names() {
        let registry = ConnectionRegistry::new();
        registry.add("default", handle("default").await).await;
        registry.add("analytics", handle("analytics").await).await;

        let mut names = registry.names().await;
        names.sort();
        assert_eq!(names, vec!["analytics", "default"]);
    }
}
