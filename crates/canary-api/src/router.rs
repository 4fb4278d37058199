use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};
use crate::canaries;
use crate::middleware::require_auth;
use crate::triggers;

/// Every route of the API, mounted under `base_path` ("/api" by default).
pub fn router(state: AppState, base_path: &str) -> Router {
    let public_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/trigger/{id}", get(triggers::trigger))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/reset", post(auth::reset_password))
        .route("/user", delete(auth::delete_user))
        .route(
            "/canary",
            get(canaries::get_canaries).delete(canaries::delete_canaries_by_name),
        )
        .route("/canary/new", post(canaries::new_canary))
        .route("/canary/update", post(canaries::update_canary))
        .route(
            "/canary/{id}",
            get(canaries::get_canary).delete(canaries::delete_canary),
        )
        .route("/canary/{id}/history", get(canaries::get_history))
        .route("/canary/{id}/wipe", post(canaries::wipe_canary))
        .layer(middleware::from_fn(require_auth))
        .with_state(state);

    let api = Router::new().merge(public_routes).merge(protected_routes);

    let base = base_path.trim_matches('/');
    let app = if base.is_empty() {
        api
    } else {
        Router::new().nest(&format!("/{}", base), api)
    };

    app.layer(TraceLayer::new_for_http())
}
