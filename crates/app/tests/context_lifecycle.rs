//! Integration tests for AppContext lifecycle
//!
//! Tests verify that AppContext can be created, started, and shut down, and
//! that a login survives a restart. The platform keychain is replaced by
//! the in-memory provider and the site's OAuth endpoints by wiremock.

use std::sync::Arc;

use serde_json::json;
use siteauth_app::AppContext;
use siteauth_common::testing::MockKeychainProvider;
use siteauth_core::SessionEvent;
use siteauth_domain::{Config, SiteRecord};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.site_directory_path = dir.path().join("sites.json");
    config.storage.keychain_service = "SiteAuth.app-test".into();
    config
}

async fn oauth_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "seed-access",
            "refresh_token": "seed-refresh",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/revoke"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

/// Validates startup and shutdown without any stored site.
///
/// Assertions:
/// - Start succeeds and reports no session
/// - The scheduler runs until shutdown
/// - A second shutdown is harmless
#[tokio::test(flavor = "multi_thread")]
async fn test_context_starts_signed_out_and_shuts_down() {
    let dir = TempDir::new().unwrap();
    let ctx = AppContext::with_secret_store(
        test_config(&dir),
        Arc::new(MockKeychainProvider::new("SiteAuth.app-test")),
    )
    .expect("context builds");

    let accessor = ctx.start().await.expect("context starts");
    assert!(accessor.is_none());
    assert!(ctx.status().is_none());
    assert!(ctx.is_scheduler_running().await);

    ctx.shutdown().await.expect("shutdown succeeds");
    assert!(!ctx.is_scheduler_running().await);
    ctx.shutdown().await.expect("second shutdown succeeds");
}

/// Validates that an invalid configuration is refused.
///
/// Assertions:
/// - Context construction fails before touching storage
#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.session.refresh_threshold_secs = config.session.check_interval_secs;

    let result = AppContext::with_secret_store(
        config,
        Arc::new(MockKeychainProvider::new("SiteAuth.app-test")),
    );

    assert!(result.is_err());
}

/// Validates login, restart and logout end to end.
///
/// Assertions:
/// - Completing a login activates the site and publishes `SessionReady`
/// - A fresh context over the same storage restores the session on start
/// - Logout clears the session and publishes `LoggedOut`
#[tokio::test(flavor = "multi_thread")]
async fn test_login_survives_restart_until_logout() {
    let dir = TempDir::new().unwrap();
    let server = oauth_server().await;
    let keychain = MockKeychainProvider::new("SiteAuth.app-test");

    let first =
        AppContext::with_secret_store(test_config(&dir), Arc::new(keychain.clone())).unwrap();
    let mut events = first.subscribe();

    let request = first.begin_login(SiteRecord::new("acme", server.uri(), "desktop-client"));
    assert!(request.url.starts_with(&format!("{}/oauth/authorize?", server.uri())));
    assert!(request.url.contains(&format!("state={}", request.state)));

    let accessor = first.complete_login(&request.state, "auth-code").await.expect("login");
    assert_eq!(accessor.bearer().as_deref(), Some("seed-access"));
    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::SessionReady { ref site_id, .. } if site_id == "acme"
    ));
    first.shutdown().await.unwrap();
    drop(first);

    let second =
        AppContext::with_secret_store(test_config(&dir), Arc::new(keychain.clone())).unwrap();
    let mut events = second.subscribe();
    let restored = second.start().await.unwrap().expect("default site restored");
    assert_eq!(restored.site_id(), "acme");
    assert_eq!(restored.bearer().as_deref(), Some("seed-access"));
    assert_eq!(second.status().map(|s| s.site_id), Some("acme".to_string()));

    second.logout("acme").await.expect("logout succeeds");
    assert!(second.status().is_none());
    assert!(!keychain.secret_exists("token.acme"));
    let logged_out = loop {
        match events.recv().await.unwrap() {
            SessionEvent::LoggedOut { site_id } => break site_id,
            _ => continue,
        }
    };
    assert_eq!(logged_out, "acme");

    second.shutdown().await.unwrap();
}
