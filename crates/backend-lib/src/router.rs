// ============================
// keystone-backend/src/router.rs
// ============================
//! HTTP routing.
use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers;
use crate::middleware::{require_bearer, require_roles, require_session, RequiredRoles};
use crate::AppState;

/// Role allowed to manage other users
pub const ADMIN_ROLE: &str = "admin";

/// Create the application router. Everything but `/health` lives under `/api/v1`.
pub fn create_router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/google/login", get(handlers::google_login))
        .route("/auth/google/callback", get(handlers::google_callback));

    let session = Router::new()
        .route("/auth/me", get(handlers::me))
        .route_layer(from_fn_with_state(state.sessions.clone(), require_session));

    let bearer = Router::new()
        .route("/auth/token/me", get(handlers::me))
        .route_layer(from_fn_with_state(state.issuer.clone(), require_bearer));

    // layers run bottom-up: session first, then the role gate
    let admin = Router::new()
        .route("/users/{id}", delete(handlers::delete_user))
        .route_layer(from_fn_with_state(RequiredRoles::new([ADMIN_ROLE]), require_roles))
        .route_layer(from_fn_with_state(state.sessions.clone(), require_session));

    let api = public.merge(session).merge(bearer).merge(admin);

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(handlers::health))
        .layer(cors_layer(&state.settings.oauth.frontend_app_url))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Credentialed CORS for the configured frontend origin only.
fn cors_layer(frontend_url: &str) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    match HeaderValue::from_str(frontend_url.trim_end_matches('/')) {
        Ok(origin) => base.allow_origin(origin),
        Err(err) => {
            tracing::warn!(%err, frontend_url, "frontend url is not a valid origin, CORS disabled");
            base
        }
    }
}
