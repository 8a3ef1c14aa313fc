//! # fleet-managers-session
//!
//! Session token acquisition and caching for plugins that authenticate with
//! `X-Auth-Token` sessions.
//!
//! This crate provides:
//! - [`PluginSessionBroker`] - [`SessionBroker`] implementation with a
//!   per-plugin token cache
//! - [`Session`] - a cached session, never printed with its token
//!
//! At most one session is cached per plugin. A cache miss takes a per-plugin
//! flight guard so concurrent callers for the same plugin wait for a single
//! session-creation request instead of each opening their own. A cached,
//! unexpired token is read without taking the guard.
//!
//! ## Example
//!
//! ```no_run
//! use fleet_managers_core::{PassthroughDecryptor, PluginApi, PluginContact, PluginProfile, SessionBroker};
//! use fleet_managers_session::PluginSessionBroker;
//!
//! # async fn example(contact: impl PluginContact, plugin: PluginProfile) -> fleet_managers_core::Result<()> {
//! let broker = PluginSessionBroker::new(contact, PassthroughDecryptor, PluginApi::default());
//! let credential = broker.get_credential(&plugin).await?;
//! assert_eq!(credential.is_token(), plugin.uses_sessions());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_managers_core::{
    AuthScheme, Credential, Decryptor, ManagerError, Method, PluginApi, PluginContact,
    PluginProfile, PluginRequest, PluginResponse, Result, SessionBroker, SESSION_TOKEN_HEADER,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

// ============================================================================
// Session
// ============================================================================

/// A live session with one plugin.
pub struct Session {
    pub plugin_id: String,
    token: SecretString,
    pub created_at: DateTime<Utc>,
    /// `None` means valid until invalidated.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }

    fn token(&self) -> SecretString {
        SecretString::from(self.token.expose_secret().to_string())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("plugin_id", &self.plugin_id)
            .field("token", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

// ============================================================================
// Broker
// ============================================================================

/// Session broker backed by a [`PluginContact`] for session creation.
pub struct PluginSessionBroker<C, D> {
    contact: C,
    decryptor: D,
    api: PluginApi,
    ttl: Option<chrono::Duration>,
    sessions: RwLock<HashMap<String, Session>>,
    flights: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<C, D> PluginSessionBroker<C, D>
where
    C: PluginContact,
    D: Decryptor,
{
    pub fn new(contact: C, decryptor: D, api: PluginApi) -> Self {
        Self {
            contact,
            decryptor,
            api,
            ttl: None,
            sessions: RwLock::new(HashMap::new()),
            flights: Mutex::new(HashMap::new()),
        }
    }

    /// Expire cached sessions after `ttl`.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = chrono::Duration::from_std(ttl).ok();
        self
    }

    /// Number of sessions currently cached.
    pub async fn cached_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn has_session(&self, plugin_id: &str) -> bool {
        self.sessions.read().await.contains_key(plugin_id)
    }

    async fn session_token(&self, plugin: &PluginProfile) -> Result<SecretString> {
        if let Some(token) = self.cached_token(&plugin.id).await {
            return Ok(token);
        }

        let flight = self.flight_guard(&plugin.id).await;
        let _guard = flight.lock().await;

        // Another caller may have finished creating the session while we waited.
        if let Some(token) = self.cached_token(&plugin.id).await {
            debug!(plugin_id = %plugin.id, "Reusing session created by concurrent caller");
            return Ok(token);
        }

        let session = self.create_session(plugin).await?;
        let token = session.token();
        self.sessions.write().await.insert(plugin.id.clone(), session);

        info!(plugin_id = %plugin.id, "Created plugin session");
        Ok(token)
    }

    async fn cached_token(&self, plugin_id: &str) -> Option<SecretString> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(plugin_id) {
                Some(session) if !session.is_expired(now) => return Some(session.token()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut sessions = self.sessions.write().await;
        if sessions
            .get(plugin_id)
            .is_some_and(|session| session.is_expired(now))
        {
            sessions.remove(plugin_id);
            warn!(plugin_id = %plugin_id, "Plugin session expired");
        }
        None
    }

    async fn flight_guard(&self, plugin_id: &str) -> Arc<Mutex<()>> {
        let mut flights = self.flights.lock().await;
        Arc::clone(flights.entry(plugin_id.to_string()).or_default())
    }

    async fn create_session(&self, plugin: &PluginProfile) -> Result<Session> {
        let password = self.decryptor.decrypt(&plugin.password)?;
        let url = self.api.sessions_url(plugin);
        let request = PluginRequest::new(Method::Post, url).with_json(json!({
            "UserName": plugin.username,
            "Password": password.expose_secret(),
        }));

        debug!(plugin_id = %plugin.id, "Requesting plugin session");
        let response = self.contact.send(request).await?;

        if !response.is_success() {
            warn!(
                plugin_id = %plugin.id,
                status = response.status,
                "Plugin rejected session creation"
            );
            return Err(ManagerError::AuthFailed(format!(
                "plugin {} rejected session creation with status {}",
                plugin.id, response.status
            )));
        }

        let token = extract_token(&response).ok_or_else(|| {
            ManagerError::AuthFailed(format!("plugin {} returned no session token", plugin.id))
        })?;

        let created_at = Utc::now();
        Ok(Session {
            plugin_id: plugin.id.clone(),
            token: SecretString::from(token),
            created_at,
            expires_at: self.ttl.map(|ttl| created_at + ttl),
        })
    }
}

#[async_trait]
impl<C, D> SessionBroker for PluginSessionBroker<C, D>
where
    C: PluginContact,
    D: Decryptor,
{
    async fn get_credential(&self, plugin: &PluginProfile) -> Result<Credential> {
        match plugin.preferred_auth_type {
            AuthScheme::BasicAuth => {
                let password = self.decryptor.decrypt(&plugin.password)?;
                Ok(Credential::Basic {
                    username: plugin.username.clone(),
                    password,
                })
            }
            AuthScheme::SessionToken => self.session_token(plugin).await.map(Credential::Token),
        }
    }

    async fn invalidate(&self, plugin_id: &str) {
        if self.sessions.write().await.remove(plugin_id).is_some() {
            debug!(plugin_id = %plugin_id, "Invalidated plugin session");
        }
    }

    async fn invalidate_rejected(&self, plugin_id: &str, rejected: &Credential) {
        let Some(rejected) = rejected.token_value() else {
            return;
        };

        let mut sessions = self.sessions.write().await;
        match sessions.get(plugin_id) {
            Some(session) if session.token.expose_secret() == rejected => {
                sessions.remove(plugin_id);
                debug!(plugin_id = %plugin_id, "Invalidated rejected plugin session");
            }
            Some(_) => {
                debug!(plugin_id = %plugin_id, "Rejected token already replaced");
            }
            None => {}
        }
    }
}

/// Session token from the `X-Auth-Token` header, or a non-empty `Token`
/// field in the body.
fn extract_token(response: &PluginResponse) -> Option<String> {
    if let Some(token) = response
        .header(SESSION_TOKEN_HEADER)
        .filter(|token| !token.is_empty())
    {
        return Some(token.to_string());
    }

    serde_json::from_str::<serde_json::Value>(&response.body)
        .ok()?
        .get("Token")?
        .as_str()
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

// ============================================================================
// Tests
// ============================================================================
