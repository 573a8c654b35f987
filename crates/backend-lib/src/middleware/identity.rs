//! Per-request identity resolution.
//!
//! Two resolvers exist, bearer token and session cookie. Both store the
//! result as an [`AuthUser`] request extension, which handlers read through
//! the `AuthUser` extractor without caring which resolver ran.
use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, Extensions, HeaderMap},
    middleware::Next,
    response::Response,
};
use keystone_common::Identity;

use crate::auth::{cookie_value, SessionStore, TokenIssuer};
use crate::error::AppError;

/// Identity resolved for the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub Identity);

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_identity(&parts.extensions)
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized("Unauthorized".to_string()))
    }
}

/// Identity injected by whichever resolver authenticated the request.
pub fn current_identity(extensions: &Extensions) -> Option<&Identity> {
    extensions.get::<AuthUser>().map(|user| &user.0)
}

/// Token from `Authorization: Bearer <token>`; the scheme is case-insensitive.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = raw.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Require a valid bearer token. Decoded claims are also attached.
pub async fn require_bearer(
    State(issuer): State<TokenIssuer>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = {
        let token = bearer_token(request.headers())
            .ok_or_else(|| AppError::Unauthorized("Missing or invalid Authorization header".to_string()))?;
        issuer.validate(token)?
    };

    let identity = claims.identity();
    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(AuthUser(identity));
    Ok(next.run(request).await)
}

/// Require a live session cookie.
pub async fn require_session(
    State(sessions): State<SessionStore>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session_id = cookie_value(request.headers(), sessions.cookie_name())
        .ok_or_else(|| AppError::Unauthorized("Missing session".to_string()))?;
    let identity = sessions
        .resolve(&session_id)
        .await
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired session".to_string()))?;

    request.extensions_mut().insert(AuthUser(identity));
    Ok(next.run(request).await)
}

/// Role set accepted by [`require_roles`]
#[derive(Debug, Clone)]
pub struct RequiredRoles(Arc<HashSet<String>>);

impl RequiredRoles {
    pub fn new<I, T>(roles: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self(Arc::new(roles.into_iter().map(Into::into).collect()))
    }

    pub fn allows(&self, role: &str) -> bool {
        self.0.contains(role)
    }
}

/// Reject requests whose identity role is outside the required set.
/// Must run after `require_bearer` or `require_session`.
pub async fn require_roles(
    State(required): State<RequiredRoles>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let allowed = match current_identity(request.extensions()) {
        Some(identity) => required.allows(&identity.role),
        None => return Err(AppError::Unauthorized("Unauthorized".to_string())),
    };
    if !allowed {
        return Err(AppError::Forbidden("Insufficient permissions".to_string()));
    }
    Ok(next.run(request).await)
}
