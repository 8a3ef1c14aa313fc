//! Keyed persistent store contract.
//!
//! The store is an external collaborator; this crate only relies on the
//! read/write contract below. [`MemoryStore`] is an in-process
//! implementation used by tests and embedders.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{ManagerError, Result};

/// Table holding manager records, keyed by manager URL.
pub const MANAGERS_TABLE: &str = "Managers";

/// Table holding plugin records, keyed by plugin id.
pub const PLUGIN_TABLE: &str = "Plugin";

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch the body stored under `key`. Fails with `NotFound` when absent.
    async fn get(&self, table: &str, key: &str) -> Result<String>;

    /// Insert or replace the body stored under `key`.
    async fn put(&self, table: &str, key: &str, body: &str) -> Result<()>;

    /// All keys of `table`, sorted.
    async fn list_keys(&self, table: &str) -> Result<Vec<String>>;
}

#[async_trait]
impl<T: ResourceStore + ?Sized> ResourceStore for std::sync::Arc<T> {
    async fn get(&self, table: &str, key: &str) -> Result<String> {
        (**self).get(table, key).await
    }

    async fn put(&self, table: &str, key: &str, body: &str) -> Result<()> {
        (**self).put(table, key, body).await
    }

    async fn list_keys(&self, table: &str) -> Result<Vec<String>> {
        (**self).list_keys(table).await
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// In-memory [`ResourceStore`].
///
/// `set_failing(true)` makes every operation fail with a store error, which
/// lets callers exercise the "store unavailable" path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, BTreeMap<String, String>>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert for seeding fixtures.
    pub async fn with(self, table: &str, key: &str, body: impl Into<String>) -> Self {
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), body.into());
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(ManagerError::Store("store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get(&self, table: &str, key: &str) -> Result<String> {
        self.check_available()?;
        self.tables
            .read()
            .await
            .get(table)
            .and_then(|rows| rows.get(key))
            .cloned()
            .ok_or_else(|| ManagerError::NotFound(format!("{}/{}", table, key)))
    }

    async fn put(&self, table: &str, key: &str, body: &str) -> Result<()> {
        self.check_available()?;
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), body.to_string());
        Ok(())
    }

    async fn list_keys(&self, table: &str) -> Result<Vec<String>> {
        self.check_available()?;
        Ok(self
            .tables
            .read()
            .await
            .get(table)
            .map(|rows| rows.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_missing_key_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .get(MANAGERS_TABLE, "/redfish/v1/Managers/uuid1:1/Ethernet")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_put_then_list() {
        let store = MemoryStore::new()
            .with(MANAGERS_TABLE, "/redfish/v1/Managers/b:1", "{}")
            .await;
        store
            .put(MANAGERS_TABLE, "/redfish/v1/Managers/a:1", "{}")
            .await
            .unwrap();

        let keys = store.list_keys(MANAGERS_TABLE).await.unwrap();
        assert_eq!(
            keys,
            vec!["/redfish/v1/Managers/a:1", "/redfish/v1/Managers/b:1"]
        );
        assert!(store.list_keys("Empty").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_store() {
        let store = MemoryStore::new().with(PLUGIN_TABLE, "p", "{}").await;
        store.set_failing(true);
        assert!(matches!(
            store.get(PLUGIN_TABLE, "p").await,
            Err(ManagerError::Store(_))
        ));
        store.set_failing(false);
        assert_eq!(store.get(PLUGIN_TABLE, "p").await.unwrap(), "{}");
    }
}
