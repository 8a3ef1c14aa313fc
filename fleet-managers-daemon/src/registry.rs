//! # Plugin Registry
//!
//! Resolves plugin identifiers to their connection profiles.
//!
//! Profiles are read from the `Plugin` table of the resource store and
//! returned with the password still in its stored, encrypted form. The
//! registry never decrypts and never mutates a profile.

use fleet_managers_core::{ManagerError, PluginProfile, ResourceStore, Result, PLUGIN_TABLE};
use tracing::{debug, warn};

/// Read-only view of registered plugins.
///
/// # Example
///
/// ```no_run
/// use fleet_managers_core::MemoryStore;
/// use fleet_managers_daemon::registry::PluginRegistry;
///
/// # async fn example() -> fleet_managers_core::Result<()> {
/// let registry = PluginRegistry::new(MemoryStore::new());
/// let profile = registry.get("CFM").await?;
/// println!("CFM listens on {}:{}", profile.address, profile.port);
/// # Ok(())
/// # }
/// ```
pub struct PluginRegistry<S> {
    store: S,
}

impl<S: ResourceStore> PluginRegistry<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Get the profile registered under `plugin_id`.
    ///
    /// Fails with `NotFound` when no plugin is registered under that id and
    /// with a store error when the stored record cannot be decoded.
    pub async fn get(&self, plugin_id: &str) -> Result<PluginProfile> {
        let raw = self
            .store
            .get(PLUGIN_TABLE, plugin_id)
            .await
            .map_err(|err| match err {
                ManagerError::NotFound(_) => {
                    ManagerError::NotFound(format!("plugin {} is not registered", plugin_id))
                }
                other => other,
            })?;

        let profile = PluginProfile::from_record(&raw).inspect_err(|err| {
            warn!(plugin_id = %plugin_id, error = %err, "Stored plugin record is malformed");
        })?;

        debug!(
            plugin_id = %plugin_id,
            auth = ?profile.preferred_auth_type,
            "Resolved plugin profile"
        );
        Ok(profile)
    }

    /// List all registered plugin IDs.
    pub async fn list(&self) -> Result<Vec<String>> {
        self.store.list_keys(PLUGIN_TABLE).await
    }
}
