//! Plugin contact contract.
//!
//! A [`PluginContact`] performs one authenticated request/response exchange
//! against a plugin's HTTP API. It never interprets status codes; only a
//! transport-level failure is an error.

use std::collections::HashMap;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::error::Result;

/// Header carrying a plugin session token.
pub const SESSION_TOKEN_HEADER: &str = "X-Auth-Token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Credential material attached to a plugin request.
///
/// A request carries at most one of the two forms.
pub enum Credential {
    Token(SecretString),
    Basic {
        username: String,
        password: SecretString,
    },
}

impl Credential {
    pub fn token(token: impl Into<String>) -> Self {
        Credential::Token(SecretString::from(token.into()))
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credential::Basic {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    pub fn is_token(&self) -> bool {
        matches!(self, Credential::Token(_))
    }

    /// Exposes the session token, if this is a token credential.
    pub fn token_value(&self) -> Option<&str> {
        match self {
            Credential::Token(token) => Some(token.expose_secret()),
            Credential::Basic { .. } => None,
        }
    }
}

impl Clone for Credential {
    fn clone(&self) -> Self {
        match self {
            Credential::Token(token) => Credential::token(token.expose_secret()),
            Credential::Basic { username, password } => {
                Credential::basic(username.clone(), password.expose_secret())
            }
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Token(_) => f.write_str("Credential::Token([REDACTED])"),
            Credential::Basic { username, .. } => f
                .debug_struct("Credential::Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
        }
    }
}

/// A single request to a plugin.
#[derive(Debug, Clone)]
pub struct PluginRequest {
    pub method: Method,
    pub url: String,
    pub credential: Option<Credential>,
    pub body: Option<Value>,
}

impl PluginRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            credential: None,
            body: None,
        }
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Raw plugin response: status, headers and body, uninterpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl PluginResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

/// Executes authenticated exchanges against plugin HTTP APIs.
#[async_trait]
pub trait PluginContact: Send + Sync {
    /// Send one request. Fails only with [`crate::ManagerError::Unreachable`]
    /// when the exchange cannot complete.
    async fn send(&self, request: PluginRequest) -> Result<PluginResponse>;
}

#[async_trait]
impl<T: PluginContact + ?Sized> PluginContact for std::sync::Arc<T> {
    async fn send(&self, request: PluginRequest) -> Result<PluginResponse> {
        (**self).send(request).await
    }
}
