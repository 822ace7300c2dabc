//! License endpoint handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use std::sync::Arc;
use wisp_core::authority::{HeartbeatOutcome, InstallationContact, ValidationOutcome};
use wisp_licensing::LicenseSummary;

use super::error_response;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateRequest {
    pub license_key: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub server_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub license_key: String,
}

pub async fn current(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LicenseSummary>, (StatusCode, String)> {
    let summary = state
        .service
        .current_summary()
        .await
        .map_err(error_response)?;
    Ok(Json(summary))
}

pub async fn activate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ActivateRequest>,
) -> Result<(StatusCode, Json<LicenseSummary>), (StatusCode, String)> {
    let contact = InstallationContact {
        company_name: request.company_name,
        email: request.email,
        country: request.country,
        server_url: request.server_url,
    };

    let summary = state
        .service
        .activate(&request.license_key, contact)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn verify(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<ValidationOutcome>, (StatusCode, String)> {
    let outcome = state
        .service
        .verify(&request.license_key)
        .await
        .map_err(error_response)?;
    Ok(Json(outcome))
}

pub async fn force_validation(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HeartbeatOutcome>, (StatusCode, String)> {
    let outcome = state
        .service
        .force_validation()
        .await
        .map_err(error_response)?;
    Ok(Json(outcome))
}
