// ================
// common/src/lib.rs
// ================
//! Common types shared between the `Keystone` auth server and its clients.
//! This module defines the request/response bodies of the auth endpoints and
//! the identity snapshot carried by sessions and tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role given to every newly created credential.
pub const DEFAULT_ROLE: &str = "user";

/// Point-in-time view of a credential's public attributes.
///
/// Sessions hold a copy of this, so later profile edits are only visible
/// after the user logs in again.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable credential identifier (token subject)
    pub user_id: String,
    pub email: String,
    /// Display name
    pub name: String,
    pub role: String,
    pub is_active: bool,
}

/// Body of `POST /auth/register`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Body of `POST /auth/login`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Public projection of a credential record. Never carries the password hash.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub username: String,
    pub full_name: String,
    pub roles: Vec<String>,
    pub is_active: bool,
    pub is_email_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Response of a successful login
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginResponse {
    pub user: UserView,
    pub access_token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Token lifetime in seconds
    pub expires_in: i64,
    pub session_expires_at: DateTime<Utc>,
}

/// Response of the `me` endpoints
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MeResponse {
    pub user: Identity,
}
