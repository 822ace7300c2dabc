//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the licensing core and
//! external adapters: persistence, the remote authority, the surrounding
//! application's usage counters, and the wall clock.

use crate::authority::{
    CommandResult, HardwareInfo, HeartbeatOutcome, HeartbeatPayload, InstallationContact,
    RegistrationOutcome, RemoteCommand, UsageCounts, ValidationOutcome,
};
use crate::license::LicenseRecord;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Repository for license records.
///
/// Records are never hard-deleted; superseded rows are kept with
/// `active = false`.
#[async_trait]
pub trait LicenseRepository: Send + Sync {
    /// The installation's current license: most recently created active row.
    async fn current(&self) -> Result<Option<LicenseRecord>>;

    /// Look up a record by its license key.
    async fn find_by_key(&self, license_key: &str) -> Result<Option<LicenseRecord>>;

    /// Insert a new record, deactivating any previous current row.
    async fn insert(&self, record: &LicenseRecord) -> Result<()>;

    /// Update an existing record in place.
    async fn update(&self, record: &LicenseRecord) -> Result<()>;
}

/// Client-side contract with the remote licensing authority.
#[async_trait]
pub trait AuthorityApi: Send + Sync {
    /// Validate a license key against the authority.
    async fn validate(
        &self,
        license_key: &str,
        hardware_id: &str,
        hardware: &HardwareInfo,
    ) -> Result<ValidationOutcome>;

    /// Register this installation for a key (activation).
    async fn register(
        &self,
        license_key: &str,
        hardware_id: &str,
        hardware: &HardwareInfo,
        contact: &InstallationContact,
    ) -> Result<RegistrationOutcome>;

    /// Report a heartbeat payload.
    async fn heartbeat(&self, payload: &HeartbeatPayload) -> Result<HeartbeatOutcome>;

    /// Fetch pending administrative commands for a key.
    async fn pending_commands(&self, license_key: &str) -> Result<Vec<RemoteCommand>>;

    /// Acknowledge a command execution result.
    async fn report_command_result(&self, command_id: &str, result: &CommandResult) -> Result<()>;
}

/// Resource usage counters supplied by the surrounding application.
#[async_trait]
pub trait UsageProvider: Send + Sync {
    async fn usage_counts(&self) -> Result<UsageCounts>;
}

/// Wall clock, injectable so tamper and grace logic is testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
