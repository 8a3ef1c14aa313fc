//! Error taxonomy shared by every component.
//!
//! Each component fails fast with one of these variants. The orchestrator
//! passes them through unchanged, except that a first rejected token is
//! turned into a session invalidate-and-retry cycle.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManagerError {
    /// Manager, plugin, or stored resource absent.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The manager names a plugin that has no registered profile.
    #[error("Manager {manager} is bound to unknown plugin {plugin_id}")]
    Misconfigured { manager: String, plugin_id: String },

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Transport failure or timeout while talking to a plugin.
    #[error("Plugin unreachable: {0}")]
    Unreachable(String),

    /// The persistent store failed for a reason other than "not found".
    #[error("Store error: {0}")]
    Store(String),
}

/// Fieldless mirror of [`ManagerError`] for matching in callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Misconfigured,
    AuthFailed,
    Unreachable,
    Store,
}

impl ManagerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ManagerError::NotFound(_) => ErrorKind::NotFound,
            ManagerError::Misconfigured { .. } => ErrorKind::Misconfigured,
            ManagerError::AuthFailed(_) => ErrorKind::AuthFailed,
            ManagerError::Unreachable(_) => ErrorKind::Unreachable,
            ManagerError::Store(_) => ErrorKind::Store,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ManagerError::NotFound(_))
    }
}

impl From<serde_json::Error> for ManagerError {
    fn from(err: serde_json::Error) -> Self {
        ManagerError::Store(format!("malformed record: {}", err))
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Misconfigured => "Misconfigured",
            ErrorKind::AuthFailed => "AuthFailed",
            ErrorKind::Unreachable => "Unreachable",
            ErrorKind::Store => "StoreError",
        };
        f.write_str(name)
    }
}

pub type Result<T> = std::result::Result<T, ManagerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            ManagerError::NotFound("x".to_string()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ManagerError::Misconfigured {
                manager: "/redfish/v1/Managers/a:1".to_string(),
                plugin_id: "gone".to_string(),
            }
            .kind(),
            ErrorKind::Misconfigured
        );
        assert_eq!(ErrorKind::Store.to_string(), "StoreError");
    }

    #[test]
    fn test_json_error_is_store_error() {
        let err: ManagerError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Store);
    }
}
