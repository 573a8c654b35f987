// ============================
// keystone-backend/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod cookie;
pub mod oauth;
pub mod password;
pub mod provider;
pub mod session;
pub mod token;
pub mod token_generator;
mod service;
mod service_impl;

pub use cookie::{cookie_value, SetCookie};
pub use oauth::{CallbackParams, OAuthController, OAuthRedirect};
pub use password::{hash_password, verify_password, HashError};
pub use provider::{GoogleProvider, IdentityProvider, ProviderError, ProviderIdentity, ProviderToken};
pub use service::{AuthService, LoginOutcome, RegisterInput};
pub use service_impl::DefaultAuth;
pub use session::{Session, SessionStore};
pub use token::{Claims, TokenError, TokenIssuer, TokenOptions};
