// ============================
// keystone-backend/src/auth/password.rs
// ============================
//! Password hashing and verification.
use scrypt::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Params, Scrypt,
};
use std::sync::LazyLock;

use thiserror::Error;

/// scrypt CPU/memory cost as log2(N). Fixed for every hash this service produces.
pub const SCRYPT_LOG_N: u8 = 15;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;
const SCRYPT_OUTPUT_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum HashError {
    #[error("password hashing failed: {0}")]
    HashFailed(String),
}

/// Hash a password using scrypt with a fresh random salt.
///
/// Returns a PHC string (`$scrypt$ln=15,r=8,p=1$<salt>$<hash>`).
pub fn hash_password(plain: &str) -> Result<String, HashError> {
    let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, SCRYPT_OUTPUT_LEN)
        .map_err(|e| HashError::HashFailed(e.to_string()))?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Scrypt
        .hash_password_customized(plain.as_bytes(), None, None, params, &salt)
        .map_err(|e| HashError::HashFailed(e.to_string()))?
        .to_string();
    Ok(hash)
}

/// Verify a password against a hash.
///
/// Malformed hashes, foreign algorithms and unusable parameters all count as a
/// mismatch. Comparison of the derived key is constant-time.
pub fn verify_password(hash: &str, plain: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Scrypt.verify_password(plain.as_bytes(), &parsed_hash).is_ok()
}

static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("keystone-unmatched-placeholder").ok());

/// Hash with production parameters that no submitted password is checked
/// against for real. Login verifies against it when there is no stored hash,
/// keeping the cost of a rejected attempt independent of account existence.
pub fn dummy_hash() -> Option<&'static str> {
    DUMMY_HASH.as_deref()
}
