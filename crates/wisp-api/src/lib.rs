//! HTTP API surface for Wisp licensing.

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::{create_router, create_router_with};
pub use state::AppState;
