// crates/backend-lib/src/middleware/mod.rs

//! Middleware for the `Keystone` auth server.

pub mod identity;

pub use identity::{
    bearer_token, current_identity, require_bearer, require_roles, require_session, AuthUser,
    RequiredRoles,
};
