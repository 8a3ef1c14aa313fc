//! Composed collaborators handed to callers.
//!
//! [`ExternalInterface`] replaces process-wide singletons: every component
//! is built once and shared through `Arc`s, and tests inject their own
//! store, broker and contact client through [`ExternalInterface::new`].

use std::sync::Arc;

use anyhow::{Context, Result};
use fleet_managers_core::{
    DeviceQuery, PassthroughDecryptor, PluginApi, PluginContact, ResourceStore, SessionBroker,
};
use fleet_managers_session::PluginSessionBroker;
use tracing::info;

use crate::config::Config;
use crate::contact::HttpContactClient;
use crate::device::DeviceInfoService;
use crate::directory::ManagerDirectory;
use crate::registry::PluginRegistry;
use crate::store::SqliteStore;

pub type SharedStore = Arc<dyn ResourceStore>;
pub type SharedBroker = Arc<dyn SessionBroker>;
pub type SharedContact = Arc<dyn PluginContact>;

pub type Devices = DeviceInfoService<SharedStore, SharedBroker, SharedContact>;

/// Every component of the service, wired together.
///
/// `managers` and `plugins` are the same instances the orchestrator uses,
/// so manager updates made through either are serialized together.
#[derive(Clone)]
pub struct ExternalInterface {
    pub store: SharedStore,
    pub managers: Arc<ManagerDirectory<SharedStore>>,
    pub plugins: Arc<PluginRegistry<SharedStore>>,
    pub sessions: SharedBroker,
    pub contact: SharedContact,
    pub devices: Arc<Devices>,
}

impl ExternalInterface {
    pub fn new(
        store: SharedStore,
        sessions: SharedBroker,
        contact: SharedContact,
        api: PluginApi,
    ) -> Self {
        let devices = DeviceInfoService::new(
            Arc::clone(&store),
            Arc::clone(&sessions),
            Arc::clone(&contact),
            api,
        );

        Self {
            managers: Arc::clone(devices.directory()),
            plugins: Arc::clone(devices.registry()),
            store,
            sessions,
            contact,
            devices: Arc::new(devices),
        }
    }

    pub async fn fetch_device_info(
        &self,
        manager_url: &str,
        sub_resource_path: &str,
    ) -> fleet_managers_core::Result<String> {
        self.devices
            .fetch_device_info(&DeviceQuery::new(manager_url, sub_resource_path))
            .await
    }
}

/// Build the production interface: SQLite store, `reqwest` contact client
/// and a session broker reading plaintext passwords.
pub fn get_external_interface(config: &Config) -> Result<ExternalInterface> {
    let store_path = config.store_path()?;
    let store: SharedStore = Arc::new(
        SqliteStore::open_at(&store_path)
            .with_context(|| format!("Failed to open resource store at {}", store_path.display()))?,
    );

    let contact: SharedContact = Arc::new(
        HttpContactClient::new(config.request_timeout())
            .context("Failed to build plugin HTTP client")?,
    );

    let mut broker =
        PluginSessionBroker::new(Arc::clone(&contact), PassthroughDecryptor, config.plugin_api());
    if let Some(ttl) = config.session_ttl() {
        broker = broker.with_ttl(ttl);
    }
    let sessions: SharedBroker = Arc::new(broker);

    info!(
        scheme = %config.plugins.scheme,
        api_root = %config.plugins.api_root,
        "Plugin interface ready"
    );
    Ok(ExternalInterface::new(
        store,
        sessions,
        contact,
        config.plugin_api(),
    ))
}
