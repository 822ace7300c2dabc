//! HTTP middleware for the API server.

use axum::{
    body::Body,
    extract::State,
    http::{header, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;
use uuid::Uuid;

use crate::state::AppState;
use wisp_licensing::GateDecision;

/// Create CORS middleware layer.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .allow_origin(Any)
}

/// Inject request ID into each request.
pub async fn request_id(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    request
        .headers_mut()
        .insert("x-request-id", request_id.parse().unwrap());

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert("x-request-id", request_id.parse().unwrap());

    response
}

/// Block resource-creating requests while the license is suspended.
///
/// Only POSTs outside the exempt prefix list are gated; reads and updates
/// always pass, and so do the payment/invoice paths a suspended customer
/// needs to reactivate.
pub async fn suspension_gate(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() != Method::POST {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    if state.gate.is_exempt(&path) {
        return next.run(request).await;
    }

    match state.gate.check(&feature_from_path(&path)).await {
        Ok(GateDecision::Allowed) => next.run(request).await,
        Ok(GateDecision::Blocked {
            feature,
            reason,
            allowed_actions,
        }) => {
            let body = Json(json!({
                "success": false,
                "error": "LICENSE_SUSPENDED",
                "message": format!(
                    "Cannot create {feature}: {reason}. Existing data remains readable and editable, and payments stay available."
                ),
                "allowedActions": allowed_actions,
            }));
            (StatusCode::PAYMENT_REQUIRED, body).into_response()
        }
        Err(e) => {
            // Enforcement must not take the installation down with it.
            error!(error = %e, "Suspension check failed, letting request through");
            next.run(request).await
        }
    }
}

/// Feature name derived from a create path, e.g. `/api/clients` -> `clients`.
fn feature_from_path(path: &str) -> String {
    path.trim_start_matches("/api/")
        .split('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("resource")
        .to_string()
}
