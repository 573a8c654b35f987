// =============
// crates/backend-lib/src/auth/service.rs
// =============
//! This module defines the `AuthService` trait used by the login and
//! registration handlers.
use std::time::Duration;

use async_trait::async_trait;

use super::{cookie::SetCookie, session::Session};
use crate::error::AppError;
use crate::store::Credential;

/// Registration input. Field formats are checked by the HTTP layer.
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Everything a successful login produces. Callers use the token, the
/// session cookie, or both.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub credential: Credential,
    pub access_token: String,
    pub token_ttl: Duration,
    pub session: Session,
    pub cookie: SetCookie,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Create a password credential. Fails with `Conflict` for a known email.
    async fn register(&self, input: RegisterInput) -> Result<Credential, AppError>;

    /// Check a password and issue a bearer token plus a session.
    /// Every credential failure is reported as `InvalidCredentials`.
    async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AppError>;
}
