//! Concurrency tests for the session broker.
//!
//! These tests drive many callers at the same plugin at once and verify
//! that session creation is deduplicated per plugin while unrelated
//! plugins proceed independently.

use async_trait::async_trait;
use fleet_managers_core::{
    AuthScheme, ManagerError, Method, PassthroughDecryptor, PluginApi, PluginContact,
    PluginProfile, PluginRequest, PluginResponse, Result, SessionBroker,
};
use fleet_managers_session::PluginSessionBroker;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Test Utilities
// ============================================================================

/// Plugin fake that counts session-creation requests per URL and answers
/// after a short delay, widening the window for racing callers.
#[derive(Default)]
struct SlowSessionPlugin {
    calls: Mutex<HashMap<String, usize>>,
    issued: AtomicUsize,
}

impl SlowSessionPlugin {
    fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl PluginContact for SlowSessionPlugin {
    async fn send(&self, request: PluginRequest) -> Result<PluginResponse> {
        assert_eq!(request.method, Method::Post);
        *self
            .calls
            .lock()
            .unwrap()
            .entry(request.url.clone())
            .or_default() += 1;

        tokio::time::sleep(Duration::from_millis(50)).await;

        if request.url.contains(":9092/") {
            return Ok(PluginResponse::new(401, r#"{"Token": ""}"#));
        }
        let token = format!("token-{}", self.issued.fetch_add(1, Ordering::SeqCst));
        Ok(PluginResponse::new(201, "").with_header("X-Auth-Token", token))
    }
}

fn session_plugin(id: &str, port: u16) -> PluginProfile {
    PluginProfile {
        id: id.to_string(),
        address: "localhost".to_string(),
        port,
        username: "admin".to_string(),
        password: b"password".to_vec(),
        preferred_auth_type: AuthScheme::SessionToken,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_one_session() {
    let plugin = Arc::new(SlowSessionPlugin::default());
    let broker = Arc::new(PluginSessionBroker::new(
        Arc::clone(&plugin),
        PassthroughDecryptor,
        PluginApi::default(),
    ));
    let cfm = session_plugin("CFM", 9091);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let broker = Arc::clone(&broker);
        let cfm = cfm.clone();
        handles.push(tokio::spawn(async move {
            broker
                .get_credential(&cfm)
                .await
                .map(|credential| credential.token_value().map(str::to_string))
        }));
    }

    let mut tokens = Vec::new();
    for handle in handles {
        tokens.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(plugin.calls_to("https://localhost:9091/ODIM/v1/Sessions"), 1);
    assert!(tokens.iter().all(|token| token.as_deref() == Some("token-0")));
    assert_eq!(broker.cached_sessions().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_plugins_acquire_sessions_independently() {
    let plugin = Arc::new(SlowSessionPlugin::default());
    let broker = Arc::new(PluginSessionBroker::new(
        Arc::clone(&plugin),
        PassthroughDecryptor,
        PluginApi::default(),
    ));

    let first = {
        let broker = Arc::clone(&broker);
        tokio::spawn(async move { broker.get_credential(&session_plugin("a", 9101)).await })
    };
    let second = {
        let broker = Arc::clone(&broker);
        tokio::spawn(async move { broker.get_credential(&session_plugin("b", 9102)).await })
    };

    assert!(first.await.unwrap().is_ok());
    assert!(second.await.unwrap().is_ok());
    assert_eq!(plugin.calls_to("https://localhost:9101/ODIM/v1/Sessions"), 1);
    assert_eq!(plugin.calls_to("https://localhost:9102/ODIM/v1/Sessions"), 1);
    assert_eq!(broker.cached_sessions().await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rejections_leave_cache_empty() {
    let plugin = Arc::new(SlowSessionPlugin::default());
    let broker = Arc::new(PluginSessionBroker::new(
        Arc::clone(&plugin),
        PassthroughDecryptor,
        PluginApi::default(),
    ));
    let no_token = session_plugin("noToken", 9092);

    let mut handles = Vec::new();
    for _ in 0..4 {
        let broker = Arc::clone(&broker);
        let no_token = no_token.clone();
        handles.push(tokio::spawn(
            async move { broker.get_credential(&no_token).await },
        ));
    }

    for handle in handles {
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(ManagerError::AuthFailed(_))));
    }
    assert!(!broker.has_session("noToken").await);
}

#[tokio::test]
async fn test_cancelled_acquisition_leaves_no_session() {
    let plugin = Arc::new(SlowSessionPlugin::default());
    let broker = Arc::new(PluginSessionBroker::new(
        Arc::clone(&plugin),
        PassthroughDecryptor,
        PluginApi::default(),
    ));
    let cfm = session_plugin("CFM", 9091);

    let cancelled =
        tokio::time::timeout(Duration::from_millis(5), broker.get_credential(&cfm)).await;
    assert!(cancelled.is_err());
    assert_eq!(broker.cached_sessions().await, 0);

    let credential = broker.get_credential(&cfm).await.unwrap();
    assert!(credential.is_token());
    assert_eq!(broker.cached_sessions().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_staggered_rejections_renew_session_once() {
    let plugin = Arc::new(SlowSessionPlugin::default());
    let broker = Arc::new(PluginSessionBroker::new(
        Arc::clone(&plugin),
        PassthroughDecryptor,
        PluginApi::default(),
    ));
    let cfm = session_plugin("CFM", 9091);

    let stale = broker.get_credential(&cfm).await.unwrap();
    assert_eq!(stale.token_value(), Some("token-0"));

    // Every caller was rejected with token-0, but the rejections land 20ms
    // apart, some of them after the replacement session already exists.
    let mut handles = Vec::new();
    for i in 0..6u64 {
        let broker = Arc::clone(&broker);
        let cfm = cfm.clone();
        let stale = stale.clone();
        handles.push(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(i * 20)).await;
            broker.invalidate_rejected("CFM", &stale).await;
            broker
                .get_credential(&cfm)
                .await
                .map(|credential| credential.token_value().map(str::to_string))
        }));
    }

    for handle in handles {
        let token = handle.await.unwrap().unwrap();
        assert_eq!(token.as_deref(), Some("token-1"));
    }
    assert_eq!(plugin.calls_to("https://localhost:9091/ODIM/v1/Sessions"), 2);
    assert_eq!(broker.cached_sessions().await, 1);
}
