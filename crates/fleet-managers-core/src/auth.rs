//! Credential collaborators: decryption of stored passwords and the
//! session broker seam used by the orchestrator.

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

use crate::contact::Credential;
use crate::error::{ManagerError, Result};
use crate::model::PluginProfile;

#[derive(Debug, Error)]
pub enum DecryptError {
    #[error("Invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    #[error("Decryption key unavailable: {0}")]
    KeyUnavailable(String),
}

impl From<DecryptError> for ManagerError {
    fn from(err: DecryptError) -> Self {
        ManagerError::AuthFailed(format!("plugin credentials unusable: {}", err))
    }
}

/// Reversible transform applied to stored plugin passwords.
pub trait Decryptor: Send + Sync {
    fn decrypt(&self, ciphertext: &[u8]) -> std::result::Result<SecretString, DecryptError>;
}

impl<T: Decryptor + ?Sized> Decryptor for std::sync::Arc<T> {
    fn decrypt(&self, ciphertext: &[u8]) -> std::result::Result<SecretString, DecryptError> {
        (**self).decrypt(ciphertext)
    }
}

/// Treats stored passwords as UTF-8 plaintext.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughDecryptor;

impl Decryptor for PassthroughDecryptor {
    fn decrypt(&self, ciphertext: &[u8]) -> std::result::Result<SecretString, DecryptError> {
        let plaintext = std::str::from_utf8(ciphertext)
            .map_err(|e| DecryptError::InvalidCiphertext(e.to_string()))?;
        Ok(SecretString::from(plaintext.to_string()))
    }
}

/// Obtains credential material for a plugin and forgets it on demand.
#[async_trait]
pub trait SessionBroker: Send + Sync {
    /// Credential to attach when contacting `plugin`.
    ///
    /// Session-based plugins yield [`Credential::Token`]; basic-auth plugins
    /// yield [`Credential::Basic`] without any network exchange.
    async fn get_credential(&self, plugin: &PluginProfile) -> Result<Credential>;

    /// Evict any cached session for `plugin_id`.
    async fn invalidate(&self, plugin_id: &str);

    /// Evict the session for `plugin_id` only if it still holds the token
    /// carried by `rejected`. A session created after the rejected one is
    /// kept. Basic credentials have no session and are ignored.
    async fn invalidate_rejected(&self, plugin_id: &str, rejected: &Credential);
}

#[async_trait]
impl<T: SessionBroker + ?Sized> SessionBroker for std::sync::Arc<T> {
    async fn get_credential(&self, plugin: &PluginProfile) -> Result<Credential> {
        (**self).get_credential(plugin).await
    }

    async fn invalidate(&self, plugin_id: &str) {
        (**self).invalidate(plugin_id).await
    }

    async fn invalidate_rejected(&self, plugin_id: &str, rejected: &Credential) {
        (**self).invalidate_rejected(plugin_id, rejected).await
    }
}
