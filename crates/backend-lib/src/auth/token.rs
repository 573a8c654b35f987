// ============================
// keystone-backend/src/auth/token.rs
// ============================
//! Bearer token issuing and validation (HS256 JWT).
//!
//! Tokens are stateless: nothing is recorded after issuance, and rotating the
//! signing secret invalidates every outstanding token.
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use keystone_common::{Identity, DEFAULT_ROLE};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::Settings;
use crate::store::Credential;

const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,

    #[error("unexpected signing algorithm")]
    InvalidAlgorithm,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

/// Token claims.
///
/// Registered claims are optional so callers can pre-set any of them; the
/// issuer only fills the ones left empty. Unknown claims round-trip through
/// `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Claims {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    pub email: String,
    pub username: String,
    pub name: String,
    pub roles: Vec<String>,
    pub is_active: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Claims {
    /// Application payload for a credential; registered claims left empty.
    pub fn for_credential(credential: &Credential) -> Self {
        Self {
            sub: credential.id.clone(),
            email: credential.email.clone(),
            username: credential.username.clone(),
            name: credential.full_name.clone(),
            roles: credential.roles.clone(),
            is_active: credential.is_active,
            ..Default::default()
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.sub.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            role: self
                .roles
                .first()
                .cloned()
                .unwrap_or_else(|| DEFAULT_ROLE.to_string()),
            is_active: self.is_active,
        }
    }
}

/// Per-call overrides of the issuer defaults
#[derive(Debug, Clone, Default)]
pub struct TokenOptions {
    pub ttl: Option<Duration>,
    pub issuer: Option<String>,
}

/// Signs and validates bearer tokens with a process-wide symmetric key.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    default_ttl: Duration,
    default_issuer: String,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], default_ttl: Duration, default_issuer: impl Into<String>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            default_ttl,
            default_issuer: default_issuer.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.jwt.secret.as_bytes(),
            settings.jwt.access_ttl(),
            settings.service_name.clone(),
        )
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Fill missing registered claims and sign.
    ///
    /// Claims already set by the caller are kept verbatim; `options` only
    /// changes the defaults used for the missing ones.
    pub fn issue(&self, mut claims: Claims, options: TokenOptions) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let ttl = options.ttl.unwrap_or(self.default_ttl);
        let issuer = options
            .issuer
            .filter(|i| !i.is_empty())
            .unwrap_or_else(|| self.default_issuer.clone());

        claims.iss.get_or_insert(issuer);
        claims.jti.get_or_insert_with(|| Uuid::new_v4().to_string());
        claims.iat.get_or_insert(now);
        claims.nbf.get_or_insert(now);
        if claims.exp.is_none() {
            let exp = i64::try_from(ttl.as_secs())
                .ok()
                .and_then(|secs| now.checked_add(secs))
                .ok_or_else(|| TokenError::Signing("token lifetime out of range".to_string()))?;
            claims.exp = Some(exp);
        }

        encode(&Header::new(ALGORITHM), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature, algorithm and time window, and return the claims.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "iss"]);

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::ImmatureSignature => TokenError::NotYetValid,
                ErrorKind::InvalidAlgorithm => TokenError::InvalidAlgorithm,
                _ => TokenError::Invalid(e.to_string()),
            })?;

        if claims.jti.is_none() || claims.iat.is_none() {
            return Err(TokenError::Invalid("missing registered claim".to_string()));
        }
        Ok(claims)
    }
}
