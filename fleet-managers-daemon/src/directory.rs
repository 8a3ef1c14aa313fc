//! # Manager Directory
//!
//! Resolves a manager URL to its typed record and owning plugin.
//!
//! Manager records live in the `Managers` table keyed by their Redfish URL
//! (`/redfish/v1/Managers/<uuid>:<system>`). The same table also caches
//! sub-resources under longer keys, so listing filters those out.

use std::collections::HashMap;
use std::sync::Arc;

use fleet_managers_core::{Manager, ManagerError, ResourceStore, Result, MANAGERS_TABLE};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub struct ManagerDirectory<S> {
    store: S,
    /// Per-URL guards serializing read-modify-write updates.
    writers: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: ResourceStore> ManagerDirectory<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            writers: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a manager and the identifier of the plugin that owns it.
    ///
    /// No retries: a missing record is `NotFound`, anything else the store
    /// reports (or a record that fails to decode) is a store error.
    pub async fn resolve(&self, manager_url: &str) -> Result<(Manager, String)> {
        let raw = self
            .store
            .get(MANAGERS_TABLE, manager_url)
            .await
            .map_err(|err| match err {
                ManagerError::NotFound(_) => {
                    ManagerError::NotFound(format!("manager {} does not exist", manager_url))
                }
                other => other,
            })?;

        let manager = Manager::from_record(&raw).inspect_err(|err| {
            warn!(manager_url = %manager_url, error = %err, "Stored manager record is malformed");
        })?;
        let plugin_id = manager.plugin_id().to_string();

        debug!(
            manager_url = %manager_url,
            plugin_id = %plugin_id,
            manager_type = manager.manager_type.as_str(),
            "Resolved manager"
        );
        Ok((manager, plugin_id))
    }

    /// URLs of all known managers.
    pub async fn list(&self) -> Result<Vec<String>> {
        let keys = self.store.list_keys(MANAGERS_TABLE).await?;
        Ok(keys.into_iter().filter(|key| is_manager_url(key)).collect())
    }

    /// Overlay `fields` onto the stored record of `manager_url`.
    ///
    /// Only the named top-level fields change; the rest of the record is
    /// written back as it was read. Updates to the same manager through this
    /// directory are applied one at a time, so concurrent overlays never
    /// drop each other's fields.
    pub async fn update_manager_data(
        &self,
        manager_url: &str,
        fields: Map<String, Value>,
    ) -> Result<()> {
        let writer = self.writer(manager_url).await;
        let _guard = writer.lock().await;

        let raw = self.store.get(MANAGERS_TABLE, manager_url).await?;
        let mut record: Value = serde_json::from_str(&raw)?;
        let object = record.as_object_mut().ok_or_else(|| {
            ManagerError::Store(format!("manager record {} is not an object", manager_url))
        })?;

        for (name, value) in fields {
            object.insert(name, value);
        }

        self.store
            .put(MANAGERS_TABLE, manager_url, &record.to_string())
            .await?;
        debug!(manager_url = %manager_url, "Updated manager record");
        Ok(())
    }

    async fn writer(&self, manager_url: &str) -> Arc<Mutex<()>> {
        let mut writers = self.writers.lock().await;
        Arc::clone(writers.entry(manager_url.to_string()).or_default())
    }
}

/// `true` for `/redfish/v1/Managers/<id>`, `false` for anything nested below it.
fn is_manager_url(key: &str) -> bool {
    key.trim_end_matches('/')
        .rsplit_once('/')
        .is_some_and(|(parent, id)| parent.ends_with("/Managers") && !id.is_empty())
}
