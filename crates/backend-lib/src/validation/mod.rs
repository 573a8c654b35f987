// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Request body validation for the auth endpoints.

use keystone_common::{LoginRequest, RegisterRequest};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

// Common validation constants
const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 30;
const MIN_PASSWORD_LENGTH: usize = 6;
const MAX_PASSWORD_LENGTH: usize = 72;
const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit
const MAX_NAME_LENGTH: usize = 100;

// Regex patterns for validation
static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());
static USERNAME_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]+$").unwrap());

/// Possible validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate an email address
pub fn validate_email(email: &str) -> ValidationResult<&str> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::InvalidEmail("Email must not be empty".to_string()));
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidEmail(format!(
            "Email must be at most {MAX_EMAIL_LENGTH} characters"
        )));
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail("Email format is invalid".to_string()));
    }
    Ok(email)
}

/// Validate a username
pub fn validate_username(username: &str) -> ValidationResult<&str> {
    let len = username.chars().count();
    if !(MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&len) {
        return Err(ValidationError::InvalidUsername(format!(
            "Username must be between {MIN_USERNAME_LENGTH} and {MAX_USERNAME_LENGTH} characters"
        )));
    }
    if !USERNAME_REGEX.is_match(username) {
        return Err(ValidationError::InvalidUsername(
            "Username must contain only letters and digits".to_string(),
        ));
    }
    Ok(username)
}

/// Validate a password
pub fn validate_password(password: &str) -> ValidationResult<&str> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::InvalidPassword(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(password)
}

fn validate_name(name: &str) -> ValidationResult<&str> {
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::InvalidName(format!(
            "Name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(name)
}

/// Validate a full registration body
pub fn validate_register(req: &RegisterRequest) -> ValidationResult<()> {
    validate_email(&req.email)?;
    validate_username(&req.username)?;
    validate_password(&req.password)?;
    validate_name(&req.first_name)?;
    validate_name(&req.last_name)?;
    Ok(())
}

/// Validate a login body. Only presence is checked; a malformed email simply
/// fails as invalid credentials.
pub fn validate_login(req: &LoginRequest) -> ValidationResult<()> {
    if req.email.trim().is_empty() {
        return Err(ValidationError::InvalidEmail("Email must not be empty".to_string()));
    }
    if req.password.is_empty() {
        return Err(ValidationError::InvalidPassword("Password must not be empty".to_string()));
    }
    Ok(())
}
