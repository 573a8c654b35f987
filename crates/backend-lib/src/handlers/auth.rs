// ============================
// crates/backend-lib/src/handlers/auth.rs
// ============================
//! Auth endpoint handlers.
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use keystone_common::{LoginRequest, LoginResponse, MeResponse, RegisterRequest, UserView};
use serde::Deserialize;

use crate::auth::oauth::{REDIRECT_COOKIE, STATE_COOKIE};
use crate::auth::{cookie_value, CallbackParams, OAuthRedirect, RegisterInput, SetCookie};
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::validation::{validate_login, validate_register};
use crate::AppState;

type AppStateRef = State<Arc<AppState>>;

fn with_cookies(mut response: Response, cookies: &[SetCookie]) -> Response {
    for cookie in cookies {
        cookie.apply(response.headers_mut());
    }
    response
}

fn redirect(target: OAuthRedirect) -> Response {
    let response = (StatusCode::FOUND, [(header::LOCATION, target.location)]).into_response();
    with_cookies(response, &target.cookies)
}

/// `POST /auth/register`
pub async fn register(
    State(state): AppStateRef,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserView>), AppError> {
    validate_register(&req)?;

    let created = state
        .auth
        .register(RegisterInput {
            email: req.email,
            username: req.username,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created.view())))
}

/// `POST /auth/login`. Returns the bearer token and sets the session cookie.
pub async fn login(
    State(state): AppStateRef,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    validate_login(&req)?;

    let outcome = state.auth.login(&req.email, &req.password).await?;
    let body = LoginResponse {
        user: outcome.credential.view(),
        access_token: outcome.access_token,
        token_type: "Bearer".to_string(),
        expires_in: i64::try_from(outcome.token_ttl.as_secs()).unwrap_or(i64::MAX),
        session_expires_at: outcome.session.expires_at,
    };
    Ok(with_cookies(Json(body).into_response(), &[outcome.cookie]))
}

/// `GET /auth/me` and `GET /auth/token/me`
pub async fn me(AuthUser(identity): AuthUser) -> Json<MeResponse> {
    Json(MeResponse { user: identity })
}

/// `POST /auth/logout`. Always clears the cookie, known session or not.
pub async fn logout(State(state): AppStateRef, headers: HeaderMap) -> Response {
    let session_id = cookie_value(&headers, state.sessions.cookie_name());
    let cookie = state.sessions.destroy(session_id.as_deref()).await;
    with_cookies(StatusCode::NO_CONTENT.into_response(), &[cookie])
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginStartParams {
    pub redirect: Option<String>,
}

/// `GET /auth/google/login`
pub async fn google_login(
    State(state): AppStateRef,
    Query(params): Query<LoginStartParams>,
) -> Result<Response, AppError> {
    let target = state.oauth.start(params.redirect.as_deref())?;
    Ok(redirect(target))
}

/// `GET /auth/google/callback`
pub async fn google_callback(
    State(state): AppStateRef,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let state_cookie = cookie_value(&headers, STATE_COOKIE);
    let redirect_cookie = cookie_value(&headers, REDIRECT_COOKIE);

    let target = state
        .oauth
        .callback(params, state_cookie.as_deref(), redirect_cookie.as_deref())
        .await?;
    Ok(redirect(target))
}

/// `DELETE /users/{id}`. Admin only; the record is soft-deleted.
pub async fn delete_user(
    State(state): AppStateRef,
    AuthUser(actor): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.store.soft_delete(&id).await?;
    tracing::info!(user_id = %id, actor = %actor.user_id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health() -> &'static str {
    "ok"
}
