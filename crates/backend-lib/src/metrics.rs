// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const SESSION_CREATED: &str = "session.created";
pub const SESSION_DESTROYED: &str = "session.destroyed";
pub const SESSION_EXPIRED: &str = "session.expired";
pub const SESSION_ACTIVE: &str = "session.active";
pub const LOGIN_SUCCEEDED: &str = "login.succeeded";
pub const LOGIN_FAILED: &str = "login.failed";
pub const USER_REGISTERED: &str = "user.registered";
pub const OAUTH_CALLBACK: &str = "oauth.callback";
pub const OAUTH_USERNAME_RETRY: &str = "oauth.username_retry";
