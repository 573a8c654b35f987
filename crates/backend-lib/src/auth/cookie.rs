// ============================
// keystone-backend/src/auth/cookie.rs
// ============================
//! `Set-Cookie` instructions and request cookie lookup.
use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderValue};
use chrono::{DateTime, TimeZone, Utc};

/// An instruction for the client to store (or clear) a cookie.
///
/// All cookies issued by this service are `HttpOnly`, `SameSite=Lax` and
/// scoped to `/`; `Secure` follows the deployment mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    /// Seconds; negative clears the cookie
    pub max_age: i64,
    pub expires: DateTime<Utc>,
    pub secure: bool,
}

impl SetCookie {
    /// Cookie living for `ttl` from now.
    pub fn new(name: &str, value: &str, ttl: Duration, secure: bool) -> Self {
        let expires = expiry_after(Utc::now(), ttl);
        Self::expiring_at(name, value, ttl, expires, secure)
    }

    /// Cookie whose `Expires` matches an already computed deadline.
    pub fn expiring_at(name: &str, value: &str, ttl: Duration, expires: DateTime<Utc>, secure: bool) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            max_age: i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX),
            expires,
            secure,
        }
    }

    /// Instruction that makes the client drop the cookie immediately.
    pub fn clear(name: &str, secure: bool) -> Self {
        Self {
            name: name.to_string(),
            value: String::new(),
            max_age: -1,
            expires: Utc.timestamp_opt(0, 0).single().unwrap_or_default(),
            secure,
        }
    }

    pub fn is_removal(&self) -> bool {
        self.max_age < 0
    }

    /// Render as a `Set-Cookie` header value.
    pub fn header_value(&self) -> String {
        // Max-Age=0 is the wire form of "delete now"
        let max_age = self.max_age.max(0);
        let secure = if self.secure { "; Secure" } else { "" };
        format!(
            "{name}={value}; Path=/; Expires={expires}; Max-Age={max_age}; HttpOnly; SameSite=Lax{secure}",
            name = self.name,
            value = self.value,
            expires = self.expires.format("%a, %d %b %Y %H:%M:%S GMT"),
        )
    }

    /// Append this instruction to a response header map.
    pub fn apply(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.header_value()) {
            headers.append(header::SET_COOKIE, value);
        }
    }
}

/// `now + ttl`, clamped to the latest representable instant.
pub(crate) fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Value of the named cookie in the request `Cookie` header(s).
pub fn cookie_value(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|raw| raw.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|part| part.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}
