//! # Device Info Orchestrator
//!
//! Answers "give me sub-resource X of manager Y" by chaining the Manager
//! Directory, Plugin Registry, Session Broker and Plugin Contact Client:
//!
//! ```text
//! ResolveManager -> [Service?  -> store]
//!                -> ResolvePlugin -> Authenticate -> Contact -> body
//!                                         ^              |
//!                                         +-- 401 once --+
//! ```
//!
//! A rejected session token is invalidated and the exchange retried once
//! with a fresh session. Every other failure surfaces unchanged.

use fleet_managers_core::{
    manager_local_id, DeviceQuery, ManagerError, ManagerState, Method, PluginApi, PluginContact,
    PluginProfile, PluginRequest, PluginResponse, ResourceStore, Result, SessionBroker,
    StoredResource, MANAGERS_TABLE,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::directory::ManagerDirectory;
use crate::registry::PluginRegistry;

/// Upper bound on contact attempts for one request: the first try plus one
/// retry after a rejected session token.
pub const MAX_CONTACT_ATTEMPTS: u32 = 2;

pub struct DeviceInfoService<S, B, C> {
    store: S,
    directory: Arc<ManagerDirectory<S>>,
    registry: Arc<PluginRegistry<S>>,
    broker: B,
    contact: C,
    api: PluginApi,
}

impl<S, B, C> DeviceInfoService<S, B, C>
where
    S: ResourceStore + Clone,
    B: SessionBroker,
    C: PluginContact,
{
    pub fn new(store: S, broker: B, contact: C, api: PluginApi) -> Self {
        Self {
            directory: Arc::new(ManagerDirectory::new(store.clone())),
            registry: Arc::new(PluginRegistry::new(store.clone())),
            store,
            broker,
            contact,
            api,
        }
    }

    /// Fetch a sub-resource of a manager from the plugin that owns it.
    ///
    /// Service managers are answered from the store and never reach a
    /// plugin. For everything else the body the plugin returns is handed
    /// back byte-for-byte.
    pub async fn fetch_device_info(&self, query: &DeviceQuery) -> Result<String> {
        let (manager, plugin_id) = self.directory.resolve(&query.manager_url).await?;

        if manager.is_service() {
            debug!(manager_url = %query.manager_url, "Serving service manager from store");
            return self.store.get(MANAGERS_TABLE, &query.cache_key()).await;
        }

        let plugin = self.resolve_plugin(&query.manager_url, &plugin_id).await?;
        let url = self.api.manager_url(
            &plugin,
            manager_local_id(&query.manager_url),
            &query.sub_resource_path,
        );

        let response = self.get_with_auth(&plugin, &url).await?;
        into_body(response, &url)
    }

    /// Cached resource straight from the store. Never contacts a plugin.
    pub async fn get_resource(&self, table: &str, key: &str) -> Result<StoredResource> {
        let body = self.store.get(table, key).await?;
        Ok(StoredResource {
            table: table.to_string(),
            key: key.to_string(),
            body,
        })
    }

    /// Serve `query` from `table` when a cached copy exists, otherwise
    /// fetch it live.
    pub async fn fetch_or_cached(&self, table: &str, query: &DeviceQuery) -> Result<String> {
        match self.store.get(table, &query.cache_key()).await {
            Ok(body) => {
                debug!(table, key = %query.cache_key(), "Serving cached resource");
                Ok(body)
            }
            Err(ManagerError::NotFound(_)) => self.fetch_device_info(query).await,
            Err(err) => Err(err),
        }
    }

    /// Re-read a manager's root resource from its plugin and record the
    /// outcome in the stored manager record.
    ///
    /// A plugin that cannot be reached, or no longer knows the manager,
    /// marks the manager `Absent`. Service managers are returned as-is.
    pub async fn refresh_manager_state(&self, manager_url: &str) -> Result<ManagerState> {
        let (manager, plugin_id) = self.directory.resolve(manager_url).await?;
        if manager.is_service() {
            return Ok(manager.state);
        }

        let plugin = self.resolve_plugin(manager_url, &plugin_id).await?;
        let url = self
            .api
            .manager_url(&plugin, manager_local_id(manager_url), "");

        let fetched = self
            .get_with_auth(&plugin, &url)
            .await
            .and_then(|response| into_body(response, &url));

        let body = match fetched {
            Ok(body) => body,
            Err(err @ (ManagerError::Unreachable(_) | ManagerError::NotFound(_))) => {
                warn!(manager_url = %manager_url, error = %err, "Marking manager absent");
                let mut status = manager.status.unwrap_or_default();
                status.state = Some("Absent".to_string());

                let mut fields = Map::new();
                fields.insert("State".to_string(), Value::from("Absent"));
                fields.insert("Status".to_string(), serde_json::to_value(status)?);
                self.directory
                    .update_manager_data(manager_url, fields)
                    .await?;
                return Ok(ManagerState::Absent);
            }
            Err(err) => return Err(err),
        };

        let live: Value = serde_json::from_str(&body).map_err(|err| {
            ManagerError::Unreachable(format!("plugin {} returned malformed manager: {}", plugin.id, err))
        })?;
        let Some(status) = live.get("Status") else {
            debug!(manager_url = %manager_url, "Plugin reported no status");
            return Ok(manager.state);
        };

        // A top-level State takes precedence when the record is read back,
        // so it must follow the refreshed Status.
        let state = status.get("State").cloned().unwrap_or(Value::Null);
        let mut fields = Map::new();
        fields.insert("State".to_string(), state);
        fields.insert("Status".to_string(), status.clone());
        self.directory
            .update_manager_data(manager_url, fields)
            .await?;

        let (refreshed, _) = self.directory.resolve(manager_url).await?;
        info!(manager_url = %manager_url, state = ?refreshed.state, "Refreshed manager state");
        Ok(refreshed.state)
    }

    pub async fn list_managers(&self) -> Result<Vec<String>> {
        self.directory.list().await
    }

    pub fn directory(&self) -> &Arc<ManagerDirectory<S>> {
        &self.directory
    }

    pub fn registry(&self) -> &Arc<PluginRegistry<S>> {
        &self.registry
    }

    async fn resolve_plugin(&self, manager_url: &str, plugin_id: &str) -> Result<PluginProfile> {
        self.registry.get(plugin_id).await.map_err(|err| match err {
            ManagerError::NotFound(_) => {
                warn!(manager_url = %manager_url, plugin_id = %plugin_id, "Manager bound to unknown plugin");
                ManagerError::Misconfigured {
                    manager: manager_url.to_string(),
                    plugin_id: plugin_id.to_string(),
                }
            }
            other => other,
        })
    }

    /// GET `url` with the plugin's credential, re-authenticating once if a
    /// session token is rejected.
    async fn get_with_auth(&self, plugin: &PluginProfile, url: &str) -> Result<PluginResponse> {
        let mut attempt = 1;
        loop {
            let credential = self.broker.get_credential(plugin).await?;

            let request = PluginRequest::new(Method::Get, url).with_credential(credential.clone());
            let response = self.contact.send(request).await?;

            if !response.is_unauthorized() {
                debug!(plugin_id = %plugin.id, status = response.status, attempt, "Plugin answered");
                return Ok(response);
            }

            if !credential.is_token() {
                return Err(ManagerError::AuthFailed(format!(
                    "plugin {} rejected basic credentials",
                    plugin.id
                )));
            }

            // Only the rejected token is evicted; a session another caller
            // already renewed stays cached.
            self.broker.invalidate_rejected(&plugin.id, &credential).await;
            if attempt >= MAX_CONTACT_ATTEMPTS {
                return Err(ManagerError::AuthFailed(format!(
                    "plugin {} rejected a fresh session token",
                    plugin.id
                )));
            }

            warn!(plugin_id = %plugin.id, attempt, "Session token rejected, re-authenticating");
            attempt += 1;
        }
    }
}

fn into_body(response: PluginResponse, url: &str) -> Result<String> {
    if response.is_success() {
        return Ok(response.body);
    }
    match response.status {
        404 => Err(ManagerError::NotFound(format!("{} does not exist on plugin", url))),
        status => Err(ManagerError::Unreachable(format!(
            "plugin returned status {} for {}",
            status, url
        ))),
    }
}
