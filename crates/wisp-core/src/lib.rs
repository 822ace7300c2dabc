//! Wisp Licensing Core
//!
//! Core domain types, traits, and error handling for the Wisp license
//! enforcement subsystem. This crate has minimal dependencies and defines
//! the shared vocabulary used across all other crates.

pub mod authority;
pub mod error;
pub mod license;
pub mod ports;

pub use error::{Error, Result};
pub use license::{LicenseRecord, LicenseStatus, PlanLimits, PlanType};
