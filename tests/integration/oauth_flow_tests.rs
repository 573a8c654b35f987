// ===================================
// tests/integration/oauth_flow_tests.rs
// ===================================
//! Google OAuth handshake against a scripted provider.
use std::time::Duration;

use axum::http::StatusCode;
use keystone_backend::store::{Credential, CredentialStore};
use serde_json::Value;

use crate::test_utils::*;

/// Run `/google/login` and return the CSRF state cookie value.
async fn start(app: &TestApp, redirect: Option<&str>) -> String {
    let uri = match redirect {
        Some(r) => format!("/api/v1/auth/google/login?redirect={r}"),
        None => "/api/v1/auth/google/login".to_string(),
    };
    let response = app.send(get(&uri, None)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let state = cookie_set_value(&response, "oauth_state").unwrap();
    assert!(location(&response).ends_with(&format!("state={state}")));
    state
}

fn callback_uri(state: &str, code: &str) -> String {
    format!("/api/v1/auth/google/callback?state={state}&code={code}")
}

#[tokio::test]
async fn test_login_sets_state_and_redirect_cookies() {
    let app = TestApp::default_app();
    let response = app
        .send(get("/api/v1/auth/google/login?redirect=/courses/7", None))
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).starts_with("https://idp.test/authorize"));

    let state = cookie_set_value(&response, "oauth_state").unwrap();
    assert_eq!(state.len(), 48);
    assert_eq!(
        cookie_set_value(&response, "post_login_redirect").as_deref(),
        Some("/courses/7")
    );
    for cookie in set_cookies(&response) {
        assert!(cookie.contains("HttpOnly"));
    }

    // fresh state per handshake
    assert_ne!(start(&app, None).await, state);
}

#[tokio::test]
async fn test_callback_creates_user_and_session() {
    let app = TestApp::default_app();
    let state = start(&app, Some("/dashboard")).await;

    let cookie = format!("oauth_state={state}; post_login_redirect=/dashboard");
    let response = app.send(get(&callback_uri(&state, "ok"), Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), format!("{FRONTEND}/dashboard"));
    assert_eq!(app.provider.calls(), 2);

    let sid = cookie_set_value(&response, "sid").unwrap();
    assert_eq!(cookie_set_value(&response, "oauth_state").as_deref(), Some(""));
    assert_eq!(cookie_set_value(&response, "post_login_redirect").as_deref(), Some(""));

    let created = app.store.find_by_email("alice@x.com").await.unwrap().unwrap();
    assert_eq!(created.username, "alice");
    assert_eq!(created.first_name, "Alice");
    assert_eq!(created.last_name, "L");
    assert_eq!(created.provider.as_deref(), Some("google"));
    assert!(created.password_hash.is_none());
    assert!(created.is_email_verified);

    let identity = app.state.sessions.resolve(&sid).await.unwrap();
    assert_eq!(identity.user_id, created.id);
}

#[tokio::test]
async fn test_state_mismatch_never_reaches_provider() {
    let app = TestApp::default_app();
    let state = start(&app, None).await;

    let forged = format!("oauth_state={state}");
    let response = app.send(get(&callback_uri("forged", "ok"), Some(&forged))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.send(get(&callback_uri(&state, "ok"), None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(get("/api/v1/auth/google/callback?code=ok", Some(&forged)))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(app.provider.calls(), 0);
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_missing_code_is_rejected() {
    let app = TestApp::default_app();
    let state = start(&app, None).await;
    let cookie = format!("oauth_state={state}");

    let response = app
        .send(get(&format!("/api/v1/auth/google/callback?state={state}"), Some(&cookie)))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.provider.calls(), 0);
}

#[tokio::test]
async fn test_existing_email_reuses_credential() {
    let app = TestApp::default_app();
    let existing = app.seed_user("alice@x.com", "alice", "secret1", "user").await;

    let state = start(&app, None).await;
    let cookie = format!("oauth_state={state}");
    let response = app.send(get(&callback_uri(&state, "ok"), Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), format!("{FRONTEND}/"));

    assert_eq!(app.store.len(), 1);
    let sid = cookie_set_value(&response, "sid").unwrap();
    let identity = app.state.sessions.resolve(&sid).await.unwrap();
    assert_eq!(identity.user_id, existing.id);

    // provider vouched for the address
    assert!(!existing.is_email_verified);
    let refreshed = app.store.find_by_id(&existing.id).await.unwrap().unwrap();
    assert!(refreshed.is_email_verified);
    assert!(refreshed.provider.is_none());
}

#[tokio::test]
async fn test_username_collision_retries_with_suffix() {
    let app = TestApp::default_app();
    // same local part, different email
    app.seed_user("alice@other.com", "alice", "secret1", "user").await;

    let state = start(&app, None).await;
    let cookie = format!("oauth_state={state}");
    let response = app.send(get(&callback_uri(&state, "ok"), Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let created = app.store.find_by_email("alice@x.com").await.unwrap().unwrap();
    assert_ne!(created.username, "alice");
    let suffix = created.username.strip_prefix("alice_").unwrap();
    assert_eq!(suffix.len(), 8);
    assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(app.store.len(), 2);
}

#[tokio::test]
async fn test_inactive_account_is_forbidden() {
    let app = TestApp::default_app();
    let mut disabled = Credential::new("alice@x.com", "alice");
    disabled.is_active = false;
    app.store.create(disabled).await.unwrap();

    let state = start(&app, None).await;
    let cookie = format!("oauth_state={state}");
    let response = app.send(get(&callback_uri(&state, "ok"), Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(cookie_set_value(&response, "sid").is_none());
    assert!(app.state.sessions.is_empty().await);
}

#[tokio::test]
async fn test_deleted_account_is_forbidden() {
    let app = TestApp::default_app();
    let existing = app.seed_user("alice@x.com", "alice", "secret1", "user").await;
    app.store.soft_delete(&existing.id).await.unwrap();

    let state = start(&app, None).await;
    let cookie = format!("oauth_state={state}");
    let response = app.send(get(&callback_uri(&state, "ok"), Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_provider_failures_map_to_gateway() {
    let app = TestApp::default_app();
    let state = start(&app, None).await;
    let cookie = format!("oauth_state={state}");

    let response = app.send(get(&callback_uri(&state, "rejected"), Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = json_body(response).await;
    assert_eq!(body["error"]["code"], "GW_001");
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_provider_timeout() {
    let app = TestApp::new(
        test_settings(),
        FakeProvider::slow(google_identity("alice@x.com", "Alice L"), Duration::from_secs(3)),
    );
    let state = start(&app, None).await;
    let cookie = format!("oauth_state={state}");

    let response = app.send(get(&callback_uri(&state, "ok"), Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_redirect_path_is_normalized() {
    let app = TestApp::default_app();
    let state = start(&app, None).await;

    // cookie without leading slash
    let cookie = format!("oauth_state={state}; post_login_redirect=profile");
    let response = app.send(get(&callback_uri(&state, "ok"), Some(&cookie))).await;
    assert_eq!(location(&response), format!("{FRONTEND}/profile"));

    // no cookie, query fallback
    let state = start(&app, None).await;
    let cookie = format!("oauth_state={state}");
    let uri = format!("{}&redirect=settings", callback_uri(&state, "ok"));
    let response = app.send(get(&uri, Some(&cookie))).await;
    assert_eq!(location(&response), format!("{FRONTEND}/settings"));
}

#[tokio::test]
async fn test_unconfigured_oauth_is_unavailable() {
    let mut settings = test_settings();
    settings.oauth.google_client_secret = None;
    let app = TestApp::new(settings, FakeProvider::new(google_identity("a@x.com", "A")));

    let response = app.send(get("/api/v1/auth/google/login", None)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = app
        .send(get(&callback_uri("s", "ok"), Some("oauth_state=s")))
        .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(app.provider.calls(), 0);
}
