//! Typed records for managers and plugins.
//!
//! Records are stored as Redfish-style JSON documents. Decoding is explicit
//! and fails with [`ManagerError::Store`] on any shape mismatch instead of
//! defaulting fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ManagerError, Result};

// ============================================================================
// Manager
// ============================================================================

/// Kind of manager. `Service` is the aggregator's own manager and is never
/// backed by a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerType {
    Service,
    Bmc,
    EnclosureManager,
    ManagementController,
    AuxiliaryController,
    RackManager,
    Other(String),
}

impl ManagerType {
    pub fn parse(value: &str) -> Self {
        match value {
            "Service" => ManagerType::Service,
            "BMC" => ManagerType::Bmc,
            "EnclosureManager" => ManagerType::EnclosureManager,
            "ManagementController" => ManagerType::ManagementController,
            "AuxiliaryController" => ManagerType::AuxiliaryController,
            "RackManager" => ManagerType::RackManager,
            other => ManagerType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ManagerType::Service => "Service",
            ManagerType::Bmc => "BMC",
            ManagerType::EnclosureManager => "EnclosureManager",
            ManagerType::ManagementController => "ManagementController",
            ManagerType::AuxiliaryController => "AuxiliaryController",
            ManagerType::RackManager => "RackManager",
            ManagerType::Other(other) => other,
        }
    }
}

/// Last known state of a manager. Advisory only: it may be stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerState {
    Enabled,
    Disabled,
    Absent,
    Other(String),
    Unknown,
}

impl ManagerState {
    pub fn parse(value: &str) -> Self {
        match value {
            "Enabled" => ManagerState::Enabled,
            "Disabled" => ManagerState::Disabled,
            "Absent" => ManagerState::Absent,
            other => ManagerState::Other(other.to_string()),
        }
    }
}

/// Redfish `Status` object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerStatus {
    #[serde(rename = "State", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(rename = "Health", default, skip_serializing_if = "Option::is_none")]
    pub health: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ManagerRecord {
    #[serde(rename = "Id", default)]
    id: Option<String>,
    #[serde(rename = "UUID", default)]
    uuid: Option<String>,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "ManagerType")]
    manager_type: String,
    #[serde(rename = "FirmwareVersion", default)]
    firmware_version: Option<String>,
    #[serde(rename = "State", default)]
    state: Option<String>,
    #[serde(rename = "Status", default)]
    status: Option<Value>,
}

/// A logical controller resource tracked by the fleet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manager {
    pub id: Option<String>,
    pub uuid: Option<String>,
    /// Identifier of the plugin that owns this manager.
    pub name: String,
    pub manager_type: ManagerType,
    pub firmware_version: Option<String>,
    pub state: ManagerState,
    pub status: Option<ManagerStatus>,
}

impl Manager {
    /// Decode a stored manager record.
    pub fn from_record(raw: &str) -> Result<Self> {
        let record: ManagerRecord = serde_json::from_str(raw)?;
        let status = match record.status {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(serde_json::from_value(Value::Object(map))?),
            // Some writers store Status as a JSON document inside a string.
            Some(Value::String(inner)) => Some(serde_json::from_str(&inner)?),
            Some(other) => {
                return Err(ManagerError::Store(format!(
                    "malformed record: Status must be an object, got {}",
                    other
                )))
            }
        };

        let state = record
            .state
            .as_deref()
            .or_else(|| status.as_ref().and_then(|s: &ManagerStatus| s.state.as_deref()))
            .map(ManagerState::parse)
            .unwrap_or(ManagerState::Unknown);

        Ok(Self {
            id: record.id,
            uuid: record.uuid,
            name: record.name,
            manager_type: ManagerType::parse(&record.manager_type),
            firmware_version: record.firmware_version,
            state,
            status,
        })
    }

    /// Identifier of the owning plugin.
    pub fn plugin_id(&self) -> &str {
        &self.name
    }

    pub fn is_service(&self) -> bool {
        self.manager_type == ManagerType::Service
    }
}

// ============================================================================
// Plugin
// ============================================================================

/// Authentication scheme a plugin expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthScheme {
    BasicAuth,
    #[serde(rename = "XAuthToken", alias = "SessionToken")]
    SessionToken,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortField {
    Number(u16),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SecretField {
    Bytes(Vec<u8>),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct PluginRecord {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "IP")]
    address: String,
    #[serde(rename = "Port")]
    port: PortField,
    #[serde(rename = "Username")]
    username: String,
    #[serde(rename = "Password")]
    password: SecretField,
    #[serde(rename = "PreferredAuthType")]
    preferred_auth_type: AuthScheme,
}

/// Connection profile of a registered plugin.
///
/// `password` stays in its stored (encrypted) form; it is only decrypted
/// by the component that puts it on the wire.
#[derive(Clone, PartialEq, Eq)]
pub struct PluginProfile {
    pub id: String,
    pub address: String,
    pub port: u16,
    pub username: String,
    pub password: Vec<u8>,
    pub preferred_auth_type: AuthScheme,
}

impl PluginProfile {
    /// Decode a stored plugin record.
    pub fn from_record(raw: &str) -> Result<Self> {
        let record: PluginRecord = serde_json::from_str(raw)?;
        let port = match record.port {
            PortField::Number(port) => port,
            PortField::Text(text) => text.trim().parse().map_err(|_| {
                ManagerError::Store(format!(
                    "malformed record: plugin {} has invalid port {:?}",
                    record.id, text
                ))
            })?,
        };
        let password = match record.password {
            SecretField::Bytes(bytes) => bytes,
            SecretField::Text(text) => text.into_bytes(),
        };

        Ok(Self {
            id: record.id,
            address: record.address,
            port,
            username: record.username,
            password,
            preferred_auth_type: record.preferred_auth_type,
        })
    }

    pub fn uses_sessions(&self) -> bool {
        self.preferred_auth_type == AuthScheme::SessionToken
    }
}

impl std::fmt::Debug for PluginProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginProfile")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("preferred_auth_type", &self.preferred_auth_type)
            .finish()
    }
}

// ============================================================================
// Queries and stored resources
// ============================================================================

/// A request for a sub-resource of a manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceQuery {
    pub manager_url: String,
    pub sub_resource_path: String,
}

impl DeviceQuery {
    pub fn new(manager_url: impl Into<String>, sub_resource_path: impl Into<String>) -> Self {
        Self {
            manager_url: manager_url.into(),
            sub_resource_path: sub_resource_path.into(),
        }
    }

    /// Store key under which a cached copy of this sub-resource lives.
    pub fn cache_key(&self) -> String {
        let sub = self.sub_resource_path.trim_matches('/');
        if sub.is_empty() {
            self.manager_url.trim_end_matches('/').to_string()
        } else {
            format!("{}/{}", self.manager_url.trim_end_matches('/'), sub)
        }
    }
}

/// Opaque payload cached in the persistent store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResource {
    pub table: String,
    pub key: String,
    pub body: String,
}
