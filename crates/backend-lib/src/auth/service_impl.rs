use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use serde_json::json;

use super::password::{dummy_hash, hash_password, verify_password};
use super::service::{AuthService, LoginOutcome, RegisterInput};
use super::session::SessionStore;
use super::token::{Claims, TokenIssuer, TokenOptions};
use crate::error::AppError;
use crate::metrics::{LOGIN_FAILED, LOGIN_SUCCEEDED, USER_REGISTERED};
use crate::notify::{dispatch, Notifier, TemplatedMessage};
use crate::store::{full_name, Credential, CredentialStore};

/// Password-based auth on top of a [`CredentialStore`].
pub struct DefaultAuth<S> {
    store: S,
    issuer: TokenIssuer,
    sessions: SessionStore,
    notifier: Arc<dyn Notifier>,
}

impl<S: CredentialStore> DefaultAuth<S> {
    pub fn new(store: S, issuer: TokenIssuer, sessions: SessionStore, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            issuer,
            sessions,
            notifier,
        }
    }

    async fn hash(password: String) -> Result<String, AppError> {
        tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
            .map_err(|e| AppError::Internal(e.to_string()))
    }

    async fn verify(hash: String, password: String) -> bool {
        tokio::task::spawn_blocking(move || verify_password(&hash, &password))
            .await
            .unwrap_or(false)
    }

    /// Spend one verification on a placeholder hash when there is nothing real
    /// to check, so rejected logins cost the same for known and unknown emails.
    async fn verify_dummy(password: String) {
        let _ = tokio::task::spawn_blocking(move || {
            if let Some(hash) = dummy_hash() {
                verify_password(hash, &password);
            }
        })
        .await;
    }

    fn rejected(reason: &'static str) -> AppError {
        counter!(LOGIN_FAILED).increment(1);
        tracing::debug!(reason, "login rejected");
        AppError::InvalidCredentials
    }
}

#[async_trait]
impl<S: CredentialStore> AuthService for DefaultAuth<S> {
    async fn register(&self, input: RegisterInput) -> Result<Credential, AppError> {
        let email = input.email.trim().to_lowercase();

        if self.store.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("User already registered".to_string()));
        }

        let mut credential = Credential::new(&email, &input.username);
        credential.password_hash = Some(Self::hash(input.password).await?);
        credential.full_name = full_name(&input.first_name, &input.last_name);
        credential.first_name = input.first_name;
        credential.last_name = input.last_name;

        // Username uniqueness is the store's unique index
        let created = self.store.create(credential).await?;
        counter!(USER_REGISTERED).increment(1);
        tracing::info!(user_id = %created.id, "user registered");

        dispatch(
            self.notifier.as_ref(),
            TemplatedMessage {
                to: vec![created.email.clone()],
                subject: "Welcome".to_string(),
                template: "welcome".to_string(),
                data: json!({ "Name": created.full_name, "Email": created.email }),
            },
        )
        .await;

        Ok(created)
    }

    async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AppError> {
        let email = email.trim().to_lowercase();

        let Some(credential) = self.store.find_by_email(&email).await? else {
            Self::verify_dummy(password.to_string()).await;
            return Err(Self::rejected("unknown email"));
        };
        let Some(hash) = credential.password_hash.clone() else {
            Self::verify_dummy(password.to_string()).await;
            return Err(Self::rejected("no password set"));
        };
        if !Self::verify(hash, password.to_string()).await {
            return Err(Self::rejected("password mismatch"));
        }
        if !credential.is_active {
            return Err(Self::rejected("inactive account"));
        }

        let access_token = self
            .issuer
            .issue(Claims::for_credential(&credential), TokenOptions::default())?;
        let (session, cookie) = self.sessions.create(credential.identity()).await;

        counter!(LOGIN_SUCCEEDED).increment(1);
        tracing::info!(user_id = %credential.id, "login succeeded");

        Ok(LoginOutcome {
            credential,
            access_token,
            token_ttl: self.issuer.default_ttl(),
            session,
            cookie,
        })
    }
}
