// ==================================
// tests/integration/http_api_tests.rs
// ==================================
//! HTTP surface: registration, login, identity endpoints, logout and admin.
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use keystone_common::{LoginResponse, MeResponse, UserView};
use serde_json::{json, Value};

use crate::test_utils::*;

async fn register(app: &TestApp, email: &str, username: &str, password: &str) -> StatusCode {
    let response = app
        .send(json_request(
            "POST",
            "/api/v1/auth/register",
            json!({ "email": email, "username": username, "password": password }),
        ))
        .await;
    response.status()
}

/// Log in and return the response body plus the session cookie pair.
async fn login(app: &TestApp, email: &str, password: &str) -> (LoginResponse, String) {
    let response = app
        .send(json_request(
            "POST",
            "/api/v1/auth/login",
            json!({ "email": email, "password": password }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let sid = cookie_set_value(&response, "sid").unwrap();
    (json_body(response).await, format!("sid={sid}"))
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::default_app();
    let response = app.send(get("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_endpoint() {
    let app = TestApp::default_app();

    let response = app
        .send(json_request(
            "POST",
            "/api/v1/auth/register",
            json!({
                "email": "a@x.com",
                "username": "alice",
                "password": "secret1",
                "first_name": "Alice",
                "last_name": "L"
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let raw: Value = json_body(response).await;
    assert!(raw.get("password_hash").is_none());
    let view: UserView = serde_json::from_value(raw).unwrap();
    assert_eq!(view.full_name, "Alice L");
    assert_eq!(view.roles, vec!["user".to_string()]);

    let response = app
        .send(json_request(
            "POST",
            "/api/v1/auth/register",
            json!({ "email": "a@x.com", "username": "alice2", "password": "secret1" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = json_body(response).await;
    assert_eq!(body["error"]["code"], "AUTH_409");
}

#[tokio::test]
async fn test_register_validation() {
    let app = TestApp::default_app();

    assert_eq!(register(&app, "not-an-email", "alice", "secret1").await, StatusCode::BAD_REQUEST);
    assert_eq!(register(&app, "a@x.com", "al", "secret1").await, StatusCode::BAD_REQUEST);
    assert_eq!(register(&app, "a@x.com", "alice", "short").await, StatusCode::BAD_REQUEST);

    let response = app
        .send(json_request(
            "POST",
            "/api/v1/auth/register",
            json!({ "email": "a@x.com", "username": "al_ice", "password": "secret1" }),
        ))
        .await;
    let body: Value = json_body(response).await;
    assert_eq!(body["error"]["code"], "VAL_001");
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_login_and_identity_endpoints() {
    let app = TestApp::default_app();
    assert_eq!(register(&app, "a@x.com", "alice", "secret1").await, StatusCode::CREATED);

    let response = app
        .send(json_request(
            "POST",
            "/api/v1/auth/login",
            json!({ "email": "a@x.com", "password": "secret1" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = set_cookies(&response)
        .into_iter()
        .find(|c| c.starts_with("sid="))
        .unwrap();
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Max-Age=86400"));
    assert!(!cookie.contains("Secure"));

    let body: LoginResponse = json_body(response).await;
    assert_eq!(body.token_type, "Bearer");
    assert_eq!(body.expires_in, 24 * 60 * 60);
    let claims = app.state.issuer.validate(&body.access_token).unwrap();
    assert_eq!(claims.sub, body.user.id);

    let (_, sid) = login(&app, "a@x.com", "secret1").await;
    let response = app.send(get("/api/v1/auth/me", Some(&sid))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let me: MeResponse = json_body(response).await;
    assert_eq!(me.user.email, "a@x.com");
    assert_eq!(me.user.role, "user");

    let response = app
        .send(
            Request::builder()
                .uri("/api/v1/auth/token/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", body.access_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let me: MeResponse = json_body(response).await;
    assert_eq!(me.user.user_id, body.user.id);

    // the bearer route ignores session cookies and vice versa
    let response = app.send(get("/api/v1/auth/token/me", Some(&sid))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = app.send(get("/api/v1/auth/me", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rejects_bad_password() {
    let app = TestApp::default_app();
    register(&app, "a@x.com", "alice", "secret1").await;

    let response = app
        .send(json_request(
            "POST",
            "/api/v1/auth/login",
            json!({ "email": "a@x.com", "password": "wrong" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&response).is_empty());
    let body: Value = json_body(response).await;
    assert_eq!(body["error"]["code"], "AUTH_001");
}

#[tokio::test]
async fn test_logout() {
    let app = TestApp::default_app();
    register(&app, "a@x.com", "alice", "secret1").await;
    let (_, sid) = login(&app, "a@x.com", "secret1").await;

    let logout = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/logout")
        .header(header::COOKIE, &sid)
        .body(Body::empty())
        .unwrap();
    let response = app.send(logout).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cleared = set_cookies(&response);
    assert_eq!(cleared.len(), 1);
    assert!(cleared[0].starts_with("sid=;"));
    assert!(cleared[0].contains("Max-Age=0"));

    let response = app.send(get("/api/v1/auth/me", Some(&sid))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // without any session the clearing cookie is still sent
    let again = Request::builder()
        .method("POST")
        .uri("/api/v1/auth/logout")
        .body(Body::empty())
        .unwrap();
    let response = app.send(again).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(set_cookies(&response).len(), 1);
}

#[tokio::test]
async fn test_delete_user_requires_admin() {
    let app = TestApp::default_app();
    app.seed_user("root@x.com", "root", "rootpass", "admin").await;
    register(&app, "a@x.com", "alice", "secret1").await;

    let (alice, alice_sid) = login(&app, "a@x.com", "secret1").await;
    let (_, admin_sid) = login(&app, "root@x.com", "rootpass").await;
    let uri = format!("/api/v1/users/{}", alice.user.id);

    let delete = |cookie: Option<&str>| {
        let mut builder = Request::builder().method("DELETE").uri(&uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    };

    assert_eq!(app.send(delete(None)).await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.send(delete(Some(&alice_sid))).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.send(delete(Some(&admin_sid))).await.status(), StatusCode::NO_CONTENT);

    // already deleted
    let response = app.send(delete(Some(&admin_sid))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = json_body(response).await;
    assert_eq!(body["error"]["code"], "RES_404");

    let unknown = Request::builder()
        .method("DELETE")
        .uri("/api/v1/users/no-such-id")
        .header(header::COOKIE, &admin_sid)
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(unknown).await.status(), StatusCode::NOT_FOUND);

    let response = app
        .send(json_request(
            "POST",
            "/api/v1/auth/login",
            json!({ "email": "a@x.com", "password": "secret1" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = TestApp::default_app();
    let response = app.send(get("/api/v1/nothing", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
