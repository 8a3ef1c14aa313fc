//! # fleet-managers-core
//!
//! Core types and collaborator traits for resolving fleet managers to the
//! out-of-band plugins that own them.
//!
//! - [`Manager`] and [`PluginProfile`] - typed records decoded from the store
//! - [`ResourceStore`] - keyed persistent store contract
//! - [`PluginContact`] - one authenticated exchange with a plugin
//! - [`SessionBroker`] - credential acquisition and invalidation
//! - [`Decryptor`] - reversible transform for stored plugin passwords
//! - [`ManagerError`] - the error taxonomy shared by all components

pub mod auth;
pub mod contact;
pub mod endpoint;
pub mod error;
pub mod model;
pub mod store;

pub use auth::{DecryptError, Decryptor, PassthroughDecryptor, SessionBroker};
pub use contact::{
    Credential, Method, PluginContact, PluginRequest, PluginResponse, SESSION_TOKEN_HEADER,
};
pub use endpoint::{manager_local_id, PluginApi};
pub use error::{ErrorKind, ManagerError, Result};
pub use model::{
    AuthScheme, DeviceQuery, Manager, ManagerState, ManagerStatus, ManagerType, PluginProfile,
    StoredResource,
};
pub use store::{MemoryStore, ResourceStore, MANAGERS_TABLE, PLUGIN_TABLE};

/// Re-export of commonly used types for convenience.
pub mod prelude {
    pub use crate::{
        AuthScheme, Credential, DeviceQuery, Manager, ManagerError, PluginContact, PluginProfile,
        PluginRequest, PluginResponse, ResourceStore, Result, SessionBroker,
    };
}
