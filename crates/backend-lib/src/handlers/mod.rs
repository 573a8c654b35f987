// ============================
// crates/backend-lib/src/handlers/mod.rs
// ============================
//! HTTP handlers.

pub mod auth;

pub use auth::{
    delete_user, google_callback, google_login, health, login, logout, me, register,
};
