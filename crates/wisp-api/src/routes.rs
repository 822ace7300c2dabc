//! API route definitions.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers::{health, licenses};
use crate::middleware::{cors_layer, request_id, suspension_gate};
use crate::state::AppState;

/// Create the licensing API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    create_router_with(state, Router::new())
}

/// Create the router with additional platform routes merged in, all behind
/// the same suspension gate. The surrounding application mounts its CRUD
/// surface through this.
pub fn create_router_with(state: Arc<AppState>, platform: Router<Arc<AppState>>) -> Router {
    Router::new()
        .nest("/api/system-licenses", license_routes())
        .route(
            "/licenses/force-validation",
            post(licenses::force_validation),
        )
        .merge(platform)
        .route("/health", get(health::health))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            suspension_gate,
        ))
        .layer(middleware::from_fn(request_id))
        .layer(cors_layer())
        .with_state(state)
}

fn license_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/current", get(licenses::current))
        .route("/activate", post(licenses::activate))
        .route("/verify", post(licenses::verify))
}
