// ============================
// keystone-backend/src/lib.rs
// ============================
//! Core library for the `Keystone` credential and session server.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod notify;
pub mod router;
pub mod store;
pub mod validation;

use std::sync::Arc;

use crate::auth::{
    AuthService, DefaultAuth, GoogleProvider, IdentityProvider, OAuthController, ProviderError,
    SessionStore, TokenIssuer,
};
use crate::config::Settings;
use crate::notify::{LogNotifier, Notifier};
use crate::store::{CredentialStore, MemoryStore};

pub use router::create_router;

/// Credential store shared by every component
pub type SharedStore = Arc<dyn CredentialStore>;
/// Identity provider used by the OAuth handshake
pub type SharedProvider = Arc<dyn IdentityProvider>;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Loaded and validated settings
    pub settings: Arc<Settings>,
    /// Credential store backend
    pub store: SharedStore,
    /// Password registration and login
    pub auth: Arc<dyn AuthService>,
    /// Bearer token issuer and validator
    pub issuer: TokenIssuer,
    /// Server-side sessions
    pub sessions: SessionStore,
    /// OAuth handshake controller
    pub oauth: Arc<OAuthController<SharedStore, SharedProvider>>,
}

impl AppState {
    /// Wire every component from settings and the given backends.
    pub fn new(
        settings: Settings,
        store: SharedStore,
        provider: SharedProvider,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let issuer = TokenIssuer::from_settings(&settings);
        let sessions = SessionStore::from_settings(&settings);
        let auth = Arc::new(DefaultAuth::new(
            store.clone(),
            issuer.clone(),
            sessions.clone(),
            notifier,
        ));
        let oauth = Arc::new(OAuthController::new(
            store.clone(),
            provider,
            sessions.clone(),
            &settings,
        ));

        Self {
            settings: Arc::new(settings),
            store,
            auth,
            issuer,
            sessions,
            oauth,
        }
    }

    /// In-memory store, Google provider and log notifier.
    pub fn in_memory(settings: Settings) -> Result<Self, ProviderError> {
        let provider = Arc::new(GoogleProvider::from_settings(&settings)?);
        Ok(Self::new(
            settings,
            Arc::new(MemoryStore::new()),
            provider,
            Arc::new(LogNotifier),
        ))
    }
}
