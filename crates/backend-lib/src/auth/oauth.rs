// ============================
// keystone-backend/src/auth/oauth.rs
// ============================
//! OAuth2 authorization-code handshake.
//!
//! `start` binds a random CSRF state to the browser through a short-lived
//! cookie and sends it to the provider. `callback` requires the returned
//! `state` to equal that cookie before the code is exchanged, then finds or
//! creates the credential and opens a session.
use std::future::Future;
use std::time::Duration;

use metrics::counter;
use serde::Deserialize;

use super::cookie::SetCookie;
use super::provider::{IdentityProvider, ProviderError, ProviderIdentity};
use super::session::SessionStore;
use super::token_generator::{random_hex, CSRF_STATE_BYTES};
use crate::config::Settings;
use crate::error::AppError;
use crate::metrics::{OAUTH_CALLBACK, OAUTH_USERNAME_RETRY};
use crate::store::{Credential, CredentialStore, ProfileUpdate, StoreError, UniqueField};

pub const STATE_COOKIE: &str = "oauth_state";
pub const REDIRECT_COOKIE: &str = "post_login_redirect";
pub const STATE_COOKIE_TTL: Duration = Duration::from_secs(10 * 60);
pub const REDIRECT_COOKIE_TTL: Duration = Duration::from_secs(30 * 60);

/// Create attempts for a new credential before giving up on username collisions
pub const MAX_CREATE_ATTEMPTS: usize = 3;

/// Query string of the provider callback
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub state: Option<String>,
    pub code: Option<String>,
    pub redirect: Option<String>,
}

/// A redirect response with the cookies to set alongside it.
#[derive(Debug, Clone)]
pub struct OAuthRedirect {
    pub location: String,
    pub cookies: Vec<SetCookie>,
}

pub struct OAuthController<S, P> {
    store: S,
    provider: P,
    sessions: SessionStore,
    configured: bool,
    frontend_url: String,
    timeout: Duration,
    secure: bool,
}

impl<S: CredentialStore, P: IdentityProvider> OAuthController<S, P> {
    pub fn new(store: S, provider: P, sessions: SessionStore, settings: &Settings) -> Self {
        Self {
            store,
            provider,
            sessions,
            configured: settings.oauth.is_configured(),
            frontend_url: settings.oauth.frontend_app_url.trim_end_matches('/').to_string(),
            timeout: settings.oauth.timeout(),
            secure: settings.secure_cookies(),
        }
    }

    fn ensure_configured(&self) -> Result<(), AppError> {
        if self.configured {
            Ok(())
        } else {
            Err(AppError::ServiceUnavailable("OAuth login is not configured".to_string()))
        }
    }

    /// Begin the handshake: set the state and redirect cookies and point the
    /// browser at the provider's consent page.
    pub fn start(&self, redirect: Option<&str>) -> Result<OAuthRedirect, AppError> {
        self.ensure_configured()?;

        let state = random_hex(CSRF_STATE_BYTES);
        let post_login = redirect.filter(|r| !r.is_empty()).unwrap_or("/");
        let post_login = if is_cookie_safe(post_login) { post_login } else { "/" };

        let location = self
            .provider
            .authorize_url(&state)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(OAuthRedirect {
            location,
            cookies: vec![
                SetCookie::new(STATE_COOKIE, &state, STATE_COOKIE_TTL, self.secure),
                SetCookie::new(REDIRECT_COOKIE, post_login, REDIRECT_COOKIE_TTL, self.secure),
            ],
        })
    }

    /// Finish the handshake. The state check runs before any provider call.
    pub async fn callback(
        &self,
        params: CallbackParams,
        state_cookie: Option<&str>,
        redirect_cookie: Option<&str>,
    ) -> Result<OAuthRedirect, AppError> {
        self.ensure_configured()?;

        match (params.state.as_deref(), state_cookie) {
            (Some(query), Some(cookie)) if !cookie.is_empty() && query == cookie => {}
            _ => return Err(AppError::BadRequest("Invalid OAuth state".to_string())),
        }
        let code = params
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AppError::BadRequest("Missing code".to_string()))?;

        let token = self
            .bounded("token exchange", self.provider.exchange_code(code))
            .await?;
        let info = self
            .bounded("userinfo fetch", self.provider.fetch_identity(&token))
            .await?;
        if info.email.trim().is_empty() {
            return Err(AppError::Gateway("provider returned no email".to_string()));
        }

        let credential = self.find_or_create(&info).await?;
        if !credential.is_active {
            return Err(AppError::Forbidden("Account is disabled".to_string()));
        }
        let (_, session_cookie) = self.sessions.create(credential.identity()).await;
        counter!(OAUTH_CALLBACK).increment(1);
        tracing::info!(user_id = %credential.id, provider = self.provider.name(), "oauth login succeeded");

        let path = redirect_cookie
            .filter(|p| !p.is_empty())
            .or(params.redirect.as_deref().filter(|p| !p.is_empty()))
            .unwrap_or("/");

        Ok(OAuthRedirect {
            location: format!("{}{}", self.frontend_url, normalize_path(path)),
            cookies: vec![
                session_cookie,
                SetCookie::clear(STATE_COOKIE, self.secure),
                SetCookie::clear(REDIRECT_COOKIE, self.secure),
            ],
        })
    }

    async fn bounded<T>(
        &self,
        what: &str,
        call: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, AppError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(AppError::Gateway(format!("{what} failed: {err}"))),
            Err(_) => Err(AppError::Gateway(format!("{what} timed out"))),
        }
    }

    /// Existing credential for the asserted email, or a new one.
    async fn find_or_create(&self, info: &ProviderIdentity) -> Result<Credential, AppError> {
        let email = info.email.trim().to_lowercase();
        if let Some(existing) = self.store.find_by_email(&email).await? {
            return self.backfill_profile(existing, info).await;
        }

        let base = derive_username(&email, &info.name);
        let mut candidate = Credential::new(&email, &base);
        candidate.first_name = first_name_from(&info.name);
        candidate.last_name = last_name_from(&info.name);
        candidate.full_name = info.name.trim().to_string();
        candidate.profile_pic = info.picture.clone();
        candidate.provider = Some(self.provider.name().to_string());
        candidate.provider_id = Some(info.subject.clone());
        candidate.is_email_verified = info.email_verified;

        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            match self.store.create(candidate.clone()).await {
                Ok(created) => return Ok(created),
                Err(StoreError::DuplicateKey { field: UniqueField::Username }) => {
                    counter!(OAUTH_USERNAME_RETRY).increment(1);
                    tracing::debug!(attempt, username = %candidate.username, "username taken");
                    candidate.username = format!("{base}_{}", random_hex(4));
                }
                Err(StoreError::DuplicateKey { field: UniqueField::Email }) => {
                    // a concurrent callback for the same account won the insert
                    return self
                        .store
                        .find_by_email(&email)
                        .await?
                        .ok_or_else(|| AppError::Forbidden("Account is not available".to_string()));
                }
                Err(other) => return Err(other.into()),
            }
        }
        Err(AppError::Internal(format!(
            "no free username after {MAX_CREATE_ATTEMPTS} attempts"
        )))
    }

    /// Copy provider-asserted facts the record is missing.
    async fn backfill_profile(&self, existing: Credential, info: &ProviderIdentity) -> Result<Credential, AppError> {
        let update = ProfileUpdate {
            is_email_verified: (info.email_verified && !existing.is_email_verified).then_some(true),
            profile_pic: info.picture.clone().filter(|_| existing.profile_pic.is_none()),
            ..Default::default()
        };
        if update.is_email_verified.is_none() && update.profile_pic.is_none() {
            return Ok(existing);
        }
        Ok(self.store.update_fields(&existing.id, update).await?)
    }
}

/// Username from the email local part (or the display name), restricted to
/// `[a-z0-9_.-]`. Falls back to `user_<hex>` when nothing usable is left.
pub fn derive_username(email: &str, name: &str) -> String {
    let source = if !email.is_empty() {
        email.to_lowercase().split('@').next().unwrap_or_default().to_string()
    } else {
        name.to_lowercase().replace(' ', "_")
    };
    sanitize_username(&source)
}

fn sanitize_username(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-'))
        .collect();
    if cleaned.is_empty() {
        format!("user_{}", random_hex(4))
    } else {
        cleaned
    }
}

fn first_name_from(full: &str) -> String {
    full.split_whitespace().next().unwrap_or_default().to_string()
}

fn last_name_from(full: &str) -> String {
    full.split_whitespace().skip(1).collect::<Vec<_>>().join(" ")
}

/// Ensure a redirect path starts with `/`.
pub fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Characters that would break a `Set-Cookie` header value
fn is_cookie_safe(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_graphic() && !matches!(c, ';' | ',' | '"' | '\\'))
}
