//! Request handlers.

pub mod health;
pub mod licenses;

use axum::http::StatusCode;
use wisp_core::Error;

/// Map a domain error onto an HTTP response.
pub(crate) fn error_response(e: Error) -> (StatusCode, String) {
    let status = match &e {
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::LicenseNotFound => StatusCode::NOT_FOUND,
        Error::AuthorityRejected(_) | Error::LicenseInvalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::LicenseSuspended { .. } => StatusCode::PAYMENT_REQUIRED,
        Error::AuthorityUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}
