// ============================
// keystone-backend/src/config.rs
// ============================
//! Configuration management.
//!
//! Layering order: compiled defaults, then a TOML file, then `KEYSTONE_`
//! environment variables (`__` separates nested keys, e.g.
//! `KEYSTONE_JWT__SECRET`). The resulting [`Settings`] is passed explicitly
//! to every component that needs it.
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Secret shipped in the defaults. Refused in production.
pub const DEV_JWT_SECRET: &str = "keystone-dev-secret";

/// Longest accepted session lifetime (one year)
pub const MAX_SESSION_TTL_SECS: u64 = 365 * 24 * 60 * 60;
/// Longest accepted access token lifetime (one year)
pub const MAX_ACCESS_TTL_MINUTES: u64 = 365 * 24 * 60;
/// Longest accepted provider call
pub const MAX_OAUTH_TIMEOUT_SECS: u64 = 5 * 60;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Deployment mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Development,
    Production,
    Testing,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Log level used when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    pub mode: Mode,
    /// Default token issuer
    pub service_name: String,
    pub jwt: JwtSettings,
    pub session: SessionSettings,
    pub oauth: OAuthSettings,
}

/// Bearer token settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtSettings {
    /// HMAC signing secret
    pub secret: String,
    /// Access token lifetime in minutes
    pub access_ttl_minutes: u64,
}

/// Session cookie settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub cookie_name: String,
    /// Session lifetime in seconds
    pub ttl_secs: u64,
}

/// Google OAuth2 settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSettings {
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    /// Callback URL registered with the provider
    pub redirect_url: Option<String>,
    /// Where the browser lands after a successful login
    pub frontend_app_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    /// Upper bound for each provider call
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            log_level: "info".to_string(),
            log_json: false,
            mode: Mode::Development,
            service_name: "keystone".to_string(),
            jwt: JwtSettings::default(),
            session: SessionSettings::default(),
            oauth: OAuthSettings::default(),
        }
    }
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret: DEV_JWT_SECRET.to_string(),
            access_ttl_minutes: 24 * 60,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_name: "sid".to_string(),
            ttl_secs: 24 * 60 * 60,
        }
    }
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            google_client_id: None,
            google_client_secret: None,
            redirect_url: None,
            frontend_app_url: "http://localhost:3000".to_string(),
            auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
            timeout_secs: 10,
        }
    }
}

impl JwtSettings {
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_minutes.saturating_mul(60))
    }
}

impl SessionSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl OAuthSettings {
    /// Both client id and secret are present and non-empty.
    pub fn is_configured(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.google_client_id) && present(&self.google_client_secret)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Settings {
    /// Load from `config.toml` in the working directory plus the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config.toml")
    }

    /// Load from the given TOML file (missing file is not an error) plus the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("KEYSTONE_").split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!("unknown log level `{}`", self.log_level)));
        }
        if self.jwt.secret.is_empty() {
            return Err(ConfigError::Invalid("jwt.secret must not be empty".into()));
        }
        if self.is_production() && self.jwt.secret == DEV_JWT_SECRET {
            return Err(ConfigError::Invalid("jwt.secret must be set in production".into()));
        }
        if !(1..=MAX_ACCESS_TTL_MINUTES).contains(&self.jwt.access_ttl_minutes) {
            return Err(ConfigError::Invalid(format!(
                "jwt.access_ttl_minutes must be between 1 and {MAX_ACCESS_TTL_MINUTES}"
            )));
        }
        if !(1..=MAX_SESSION_TTL_SECS).contains(&self.session.ttl_secs) {
            return Err(ConfigError::Invalid(format!(
                "session.ttl_secs must be between 1 and {MAX_SESSION_TTL_SECS}"
            )));
        }
        if self.session.cookie_name.trim().is_empty() {
            return Err(ConfigError::Invalid("session.cookie_name must not be empty".into()));
        }
        if !(1..=MAX_OAUTH_TIMEOUT_SECS).contains(&self.oauth.timeout_secs) {
            return Err(ConfigError::Invalid(format!(
                "oauth.timeout_secs must be between 1 and {MAX_OAUTH_TIMEOUT_SECS}"
            )));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.mode == Mode::Production
    }

    /// Cookies carry the `Secure` attribute only in production.
    pub fn secure_cookies(&self) -> bool {
        self.is_production()
    }

    /// Configured OAuth callback URL, or the local default for `bind_addr`.
    pub fn oauth_redirect_url(&self) -> String {
        match self.oauth.redirect_url.as_deref() {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => format!(
                "http://localhost:{}/api/v1/auth/google/callback",
                self.bind_addr.port()
            ),
        }
    }
}
