// ============================
// keystone-backend/src/auth/session.rs
// ============================
//! Cookie-keyed session store with lazy TTL expiry.
//!
//! A session moves `absent -> active -> (expired | destroyed)`; the TTL is
//! fixed at creation. Expired entries are dropped when a lookup trips over
//! them or when [`SessionStore::purge_expired`] is called. No background
//! task runs.
use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use keystone_common::Identity;
use metrics::{counter, gauge};
use tokio::sync::RwLock;

use super::cookie::{expiry_after, SetCookie};
use super::token_generator::generate_session_id;
use crate::config::Settings;
use crate::metrics::{SESSION_ACTIVE, SESSION_CREATED, SESSION_DESTROYED, SESSION_EXPIRED};

/// Session information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    /// Copy of the identity taken at login
    pub identity: Identity,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// In-memory session table shared by all request workers.
///
/// Every access goes through one `RwLock`; lookups take the read half and
/// clone the entry out so the lock is never held while a response is built.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    cookie_name: String,
    ttl: Duration,
    secure: bool,
}

impl SessionStore {
    pub fn new(cookie_name: impl Into<String>, ttl: Duration, secure: bool) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            cookie_name: cookie_name.into(),
            ttl,
            secure,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.session.cookie_name.clone(),
            settings.session.ttl(),
            settings.secure_cookies(),
        )
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store a new session for `identity` and return it with the cookie to set.
    pub async fn create(&self, identity: Identity) -> (Session, SetCookie) {
        let now = Utc::now();
        let expires_at = expiry_after(now, self.ttl);

        let session = {
            let mut sessions = self.sessions.write().await;
            let mut id = generate_session_id();
            while sessions.contains_key(&id) {
                id = generate_session_id();
            }
            let session = Session {
                id: id.clone(),
                identity,
                created_at: now,
                expires_at,
            };
            sessions.insert(id, session.clone());
            gauge!(SESSION_ACTIVE).set(sessions.len() as f64);
            session
        };
        counter!(SESSION_CREATED).increment(1);
        tracing::debug!(user_id = %session.identity.user_id, "session created");

        let cookie = SetCookie::expiring_at(&self.cookie_name, &session.id, self.ttl, expires_at, self.secure);
        (session, cookie)
    }

    /// Identity for a live session. Unknown and expired ids look the same.
    pub async fn resolve(&self, session_id: &str) -> Option<Identity> {
        self.get(session_id).await.map(|s| s.identity)
    }

    /// Full session record for a live session.
    pub async fn get(&self, session_id: &str) -> Option<Session> {
        if session_id.is_empty() {
            return None;
        }
        let session = self.sessions.read().await.get(session_id).cloned()?;
        if !session.is_expired_at(Utc::now()) {
            return Some(session);
        }

        let mut sessions = self.sessions.write().await;
        if sessions
            .get(session_id)
            .is_some_and(|s| s.is_expired_at(Utc::now()))
        {
            sessions.remove(session_id);
            counter!(SESSION_EXPIRED).increment(1);
            gauge!(SESSION_ACTIVE).set(sessions.len() as f64);
        }
        None
    }

    /// Remove the session if present. Always returns a clearing cookie.
    pub async fn destroy(&self, session_id: Option<&str>) -> SetCookie {
        if let Some(id) = session_id {
            let mut sessions = self.sessions.write().await;
            if sessions.remove(id).is_some() {
                counter!(SESSION_DESTROYED).increment(1);
                gauge!(SESSION_ACTIVE).set(sessions.len() as f64);
            }
        }
        SetCookie::clear(&self.cookie_name, self.secure)
    }

    /// Drop every expired entry, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        let removed = before - sessions.len();

        if removed > 0 {
            counter!(SESSION_EXPIRED).increment(removed as u64);
            gauge!(SESSION_ACTIVE).set(sessions.len() as f64);
        }
        removed
    }

    /// Number of stored entries, expired-but-unreclaimed ones included.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
