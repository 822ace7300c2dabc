//! Application state shared across handlers.

use std::sync::Arc;
use wisp_licensing::{LicenseService, SuspensionGate};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LicenseService>,
    pub gate: Arc<SuspensionGate>,
}

impl AppState {
    pub fn new(service: Arc<LicenseService>, gate: Arc<SuspensionGate>) -> Self {
        Self { service, gate }
    }
}
