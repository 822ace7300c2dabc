//! Repository implementations.

mod license;
mod usage;

pub use license::PgLicenseRepository;
pub use usage::PgUsageProvider;
