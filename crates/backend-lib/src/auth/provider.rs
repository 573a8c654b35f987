// ============================
// keystone-backend/src/auth/provider.rs
// ============================
//! External OAuth2 identity provider (authorization-code flow).
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;

use crate::config::Settings;

/// Scopes requested on every consent redirect
pub const DEFAULT_SCOPES: [&str; 3] = ["openid", "email", "profile"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Transport(String),

    #[error("provider returned status {0}")]
    Status(u16),

    #[error("invalid provider response: {0}")]
    Decode(String),

    #[error("provider configuration invalid: {0}")]
    Config(String),
}

/// Access token returned by the code exchange
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ProviderToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Subset of the OIDC userinfo document
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
pub struct ProviderIdentity {
    #[serde(rename = "sub")]
    pub subject: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Stored as the credential's `provider`
    fn name(&self) -> &str;

    /// Consent URL carrying `state` and the default scopes.
    fn authorize_url(&self, state: &str) -> Result<String, ProviderError>;

    async fn exchange_code(&self, code: &str) -> Result<ProviderToken, ProviderError>;

    async fn fetch_identity(&self, token: &ProviderToken) -> Result<ProviderIdentity, ProviderError>;
}

#[async_trait]
impl<T: IdentityProvider + ?Sized> IdentityProvider for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn authorize_url(&self, state: &str) -> Result<String, ProviderError> {
        (**self).authorize_url(state)
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderToken, ProviderError> {
        (**self).exchange_code(code).await
    }

    async fn fetch_identity(&self, token: &ProviderToken) -> Result<ProviderIdentity, ProviderError> {
        (**self).fetch_identity(token).await
    }
}

/// Google OAuth2 / OpenID Connect client.
#[derive(Clone)]
pub struct GoogleProvider {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_url: String,
    auth_url: String,
    token_url: String,
    userinfo_url: String,
}

impl GoogleProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self, ProviderError> {
        let oauth = &settings.oauth;
        let client = reqwest::Client::builder()
            .timeout(oauth.timeout())
            .build()
            .map_err(|e| ProviderError::Config(e.to_string()))?;

        Ok(Self {
            client,
            client_id: oauth.google_client_id.clone().unwrap_or_default(),
            client_secret: oauth.google_client_secret.clone().unwrap_or_default(),
            redirect_url: settings.oauth_redirect_url(),
            auth_url: oauth.auth_url.clone(),
            token_url: oauth.token_url.clone(),
            userinfo_url: oauth.userinfo_url.clone(),
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn authorize_url(&self, state: &str) -> Result<String, ProviderError> {
        let scope = DEFAULT_SCOPES.join(" ");
        let url = Url::parse_with_params(
            &self.auth_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("state", state),
                ("access_type", "online"),
            ],
        )
        .map_err(|e| ProviderError::Config(e.to_string()))?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderToken, ProviderError> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_url.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }
        let token: ProviderToken = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        if token.access_token.is_empty() {
            return Err(ProviderError::Decode("empty access token".to_string()));
        }
        Ok(token)
    }

    async fn fetch_identity(&self, token: &ProviderToken) -> Result<ProviderIdentity, ProviderError> {
        let response = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }
        response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}
