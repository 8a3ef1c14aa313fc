//! Plugin API URL construction.

use crate::model::PluginProfile;

/// Where a plugin's API lives relative to its host and port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginApi {
    /// `http` or `https`.
    pub scheme: String,
    /// API root without surrounding slashes, e.g. `ODIM/v1`.
    pub api_root: String,
}

impl Default for PluginApi {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            api_root: "ODIM/v1".to_string(),
        }
    }
}

impl PluginApi {
    pub fn new(scheme: impl Into<String>, api_root: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            api_root: api_root.into().trim_matches('/').to_string(),
        }
    }

    /// `<scheme>://<address>:<port>/<path>`
    pub fn url(&self, plugin: &PluginProfile, path: &str) -> String {
        format!(
            "{}://{}:{}/{}",
            self.scheme,
            plugin.address,
            plugin.port,
            path.trim_start_matches('/')
        )
    }

    pub fn sessions_url(&self, plugin: &PluginProfile) -> String {
        self.url(plugin, &format!("{}/Sessions", self.api_root))
    }

    /// URL of a manager sub-resource on the owning plugin.
    pub fn manager_url(&self, plugin: &PluginProfile, local_id: &str, sub_resource: &str) -> String {
        let sub = sub_resource.trim_matches('/');
        let path = if sub.is_empty() {
            format!("{}/Managers/{}", self.api_root, local_id)
        } else {
            format!("{}/Managers/{}/{}", self.api_root, local_id, sub)
        };
        self.url(plugin, &path)
    }
}

/// Plugin-local id of a manager: the last URL segment without its
/// `:<system>` suffix. `/redfish/v1/Managers/uuid:1` becomes `uuid`.
pub fn manager_local_id(manager_url: &str) -> &str {
    let last = manager_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    last.split(':').next().unwrap_or(last)
}
