// ==================================
// tests/integration/auth_flow_tests.rs
// ==================================
//! Password registration and login through the auth service.
use std::sync::Arc;
use std::time::Duration;

use keystone_backend::auth::{
    AuthService, DefaultAuth, RegisterInput, SessionStore, TokenIssuer,
};
use keystone_backend::error::AppError;
use keystone_backend::notify::LogNotifier;
use keystone_backend::store::{CredentialStore, MemoryStore};

fn service() -> (DefaultAuth<Arc<MemoryStore>>, Arc<MemoryStore>, TokenIssuer, SessionStore) {
    let store = Arc::new(MemoryStore::new());
    let issuer = TokenIssuer::new(b"flow-secret", Duration::from_secs(3600), "keystone");
    let sessions = SessionStore::new("sid", Duration::from_secs(3600), false);
    let auth = DefaultAuth::new(
        store.clone(),
        issuer.clone(),
        sessions.clone(),
        Arc::new(LogNotifier),
    );
    (auth, store, issuer, sessions)
}

fn input(email: &str, username: &str, password: &str) -> RegisterInput {
    RegisterInput {
        email: email.to_string(),
        username: username.to_string(),
        password: password.to_string(),
        first_name: "Alice".to_string(),
        last_name: "L".to_string(),
    }
}

#[tokio::test]
async fn test_register_then_login() {
    let (auth, store, issuer, sessions) = service();

    let created = auth.register(input("a@x.com", "alice", "secret1")).await.unwrap();
    assert_eq!(created.email, "a@x.com");
    assert_eq!(created.roles, vec!["user".to_string()]);
    assert!(created.is_active);
    let hash = created.password_hash.clone().unwrap();
    assert!(hash.starts_with("$scrypt$"));
    assert_ne!(hash, "secret1");

    let duplicate = auth.register(input("a@x.com", "alice2", "secret1")).await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));
    assert_eq!(store.len(), 1);

    let outcome = auth.login("a@x.com", "secret1").await.unwrap();
    let claims = issuer.validate(&outcome.access_token).unwrap();
    assert_eq!(claims.sub, created.id);
    assert_eq!(claims.iss.as_deref(), Some("keystone"));

    let identity = sessions.resolve(&outcome.session.id).await.unwrap();
    assert_eq!(identity.user_id, created.id);
    assert_eq!(outcome.cookie.name, "sid");
    assert_eq!(outcome.cookie.value, outcome.session.id);

    let wrong = auth.login("a@x.com", "wrong").await;
    assert!(matches!(wrong, Err(AppError::InvalidCredentials)));
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let (auth, store, _, _) = service();
    let created = auth.register(input("b@x.com", "bobby", "secret1")).await.unwrap();

    let unknown = auth.login("nobody@x.com", "secret1").await.unwrap_err();
    let mismatch = auth.login("b@x.com", "secret2").await.unwrap_err();
    assert_eq!(unknown.to_string(), mismatch.to_string());
    assert_eq!(unknown.status_code(), mismatch.status_code());

    store.soft_delete(&created.id).await.unwrap();
    let deleted = auth.login("b@x.com", "secret1").await;
    assert!(matches!(deleted, Err(AppError::InvalidCredentials)));
}

#[tokio::test]
async fn test_email_is_case_insensitive() {
    let (auth, _, _, _) = service();
    auth.register(input("Carol@X.com", "carol", "secret1")).await.unwrap();

    let duplicate = auth.register(input("carol@x.com", "carol2", "secret1")).await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    let outcome = auth.login("CAROL@x.com", "secret1").await.unwrap();
    assert_eq!(outcome.credential.email, "carol@x.com");
}

#[tokio::test]
async fn test_duplicate_username_conflicts() {
    let (auth, _, _, _) = service();
    auth.register(input("d@x.com", "dave", "secret1")).await.unwrap();

    let taken = auth.register(input("other@x.com", "dave", "secret1")).await;
    assert!(matches!(taken, Err(AppError::Conflict(_))));
}
