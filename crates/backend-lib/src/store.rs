// ============================
// keystone-backend/src/store.rs
// ============================
//! Credential store contract with an in-memory implementation.
//!
//! The auth core only talks to user records through [`CredentialStore`].
//! Unique-index violations surface as [`StoreError::DuplicateKey`] so callers
//! can branch on the violated field instead of parsing driver messages.
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use keystone_common::{Identity, UserView, DEFAULT_ROLE};
use thiserror::Error;
use uuid::Uuid;

/// Field protected by a unique index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Username,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniqueField::Email => f.write_str("email"),
            UniqueField::Username => f.write_str("username"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("duplicate key on {field}")]
    DuplicateKey { field: UniqueField },

    #[error("record not found")]
    NotFound,

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// A user credential record as owned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Assigned by the store on create
    pub id: String,
    pub email: String,
    pub username: String,
    /// `None` for accounts created through an identity provider
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub profile_pic: Option<String>,
    pub provider: Option<String>,
    pub provider_id: Option<String>,
    pub is_email_verified: bool,
    pub is_active: bool,
    /// Present for schema compatibility; never enforced by the auth core.
    pub two_factor_enabled: bool,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Blank active credential with the default role, timestamps set to now.
    pub fn new(email: &str, username: &str) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            email: email.to_lowercase(),
            username: username.to_string(),
            password_hash: None,
            first_name: String::new(),
            last_name: String::new(),
            full_name: String::new(),
            profile_pic: None,
            provider: None,
            provider_id: None,
            is_email_verified: false,
            is_active: true,
            two_factor_enabled: false,
            roles: vec![DEFAULT_ROLE.to_string()],
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// First role, or the default role when none is assigned.
    pub fn primary_role(&self) -> &str {
        self.roles.first().map(String::as_str).unwrap_or(DEFAULT_ROLE)
    }

    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.id.clone(),
            email: self.email.clone(),
            name: self.full_name.clone(),
            role: self.primary_role().to_string(),
            is_active: self.is_active,
        }
    }

    pub fn view(&self) -> UserView {
        UserView {
            id: self.id.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            roles: self.roles.clone(),
            is_active: self.is_active,
            is_email_verified: self.is_email_verified,
            provider: self.provider.clone(),
            created_at: self.created_at,
        }
    }
}

/// Partial update of editable profile fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_pic: Option<String>,
    pub is_email_verified: Option<bool>,
}

/// Trait for credential store backends
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new credential, returning it with its assigned id.
    async fn create(&self, credential: Credential) -> Result<Credential, StoreError>;

    /// Look up a live (not soft-deleted) credential by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, StoreError>;

    /// Look up a live credential by id.
    async fn find_by_id(&self, id: &str) -> Result<Option<Credential>, StoreError>;

    /// Apply a partial profile update and bump `updated_at`.
    async fn update_fields(&self, id: &str, update: ProfileUpdate) -> Result<Credential, StoreError>;

    /// Mark a credential deleted and inactive.
    async fn soft_delete(&self, id: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: CredentialStore + ?Sized> CredentialStore for Arc<T> {
    async fn create(&self, credential: Credential) -> Result<Credential, StoreError> {
        (**self).create(credential).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, StoreError> {
        (**self).find_by_email(email).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Credential>, StoreError> {
        (**self).find_by_id(id).await
    }

    async fn update_fields(&self, id: &str, update: ProfileUpdate) -> Result<Credential, StoreError> {
        (**self).update_fields(id, update).await
    }

    async fn soft_delete(&self, id: &str) -> Result<(), StoreError> {
        (**self).soft_delete(id).await
    }
}

/// In-memory store. Unique indexes live in their own maps and are reserved
/// through the map entry API, so two racing creates can never both win.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<DashMap<String, Credential>>,
    by_email: Arc<DashMap<String, String>>,
    by_username: Arc<DashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, soft-deleted ones included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn create(&self, mut credential: Credential) -> Result<Credential, StoreError> {
        let id = Uuid::new_v4().to_string();
        credential.email = credential.email.to_lowercase();

        // Slots stay locked until the record is visible, so a losing create
        // always re-reads a complete record through the email index.
        let email_slot = match self.by_email.entry(credential.email.clone()) {
            Entry::Occupied(_) => return Err(StoreError::DuplicateKey { field: UniqueField::Email }),
            Entry::Vacant(slot) => slot,
        };
        let username_slot = match self.by_username.entry(credential.username.clone()) {
            Entry::Occupied(_) => return Err(StoreError::DuplicateKey { field: UniqueField::Username }),
            Entry::Vacant(slot) => slot,
        };

        credential.id = id.clone();
        credential.updated_at = credential.created_at;
        self.records.insert(id.clone(), credential.clone());
        username_slot.insert(id.clone());
        email_slot.insert(id);
        Ok(credential)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, StoreError> {
        let Some(id) = self.by_email.get(&email.to_lowercase()).map(|r| r.value().clone()) else {
            return Ok(None);
        };
        self.find_by_id(&id).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Credential>, StoreError> {
        Ok(self
            .records
            .get(id)
            .filter(|r| r.deleted_at.is_none())
            .map(|r| r.value().clone()))
    }

    async fn update_fields(&self, id: &str, update: ProfileUpdate) -> Result<Credential, StoreError> {
        let mut record = self
            .records
            .get_mut(id)
            .filter(|r| r.deleted_at.is_none())
            .ok_or(StoreError::NotFound)?;

        if let Some(first) = update.first_name {
            record.first_name = first;
        }
        if let Some(last) = update.last_name {
            record.last_name = last;
        }
        if update.profile_pic.is_some() {
            record.profile_pic = update.profile_pic;
        }
        if let Some(verified) = update.is_email_verified {
            record.is_email_verified = verified;
        }
        record.full_name = full_name(&record.first_name, &record.last_name);
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn soft_delete(&self, id: &str) -> Result<(), StoreError> {
        let mut record = self
            .records
            .get_mut(id)
            .filter(|r| r.deleted_at.is_none())
            .ok_or(StoreError::NotFound)?;
        let now = Utc::now();
        record.deleted_at = Some(now);
        record.is_active = false;
        record.updated_at = now;
        Ok(())
    }
}

/// Join first and last name, skipping empty parts.
pub fn full_name(first: &str, last: &str) -> String {
    match (first.trim(), last.trim()) {
        ("", "") => String::new(),
        (f, "") => f.to_string(),
        ("", l) => l.to_string(),
        (f, l) => format!("{f} {l}"),
    }
}
