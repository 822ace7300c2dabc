//! Error types for Wisp licensing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // License errors
    #[error("License not found")]
    LicenseNotFound,

    #[error("License invalid: {0}")]
    LicenseInvalid(String),

    #[error("License expired")]
    LicenseExpired,

    #[error("License suspended: {reason}")]
    LicenseSuspended { reason: String },

    #[error("License quota exceeded: {resource} ({used}/{limit})")]
    LicenseQuotaExceeded {
        resource: String,
        used: u64,
        limit: u64,
    },

    #[error("License is bound to a different machine")]
    HardwareMismatch,

    // Authority errors
    #[error("Authority rejected request: {0}")]
    AuthorityRejected(String),

    #[error("All authority endpoints unreachable: {0}")]
    AuthorityUnreachable(String),

    // Command errors
    #[error("Unsupported remote command: {0}")]
    UnsupportedCommand(String),

    // Input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Infrastructure errors
    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
