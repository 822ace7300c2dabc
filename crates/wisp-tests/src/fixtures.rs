//! Test fixtures: in-memory repository, scripted authority, fixed clock.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use wisp_core::authority::{
    CommandResult, HardwareInfo, HeartbeatOutcome, HeartbeatPayload, InstallationContact,
    RegistrationOutcome, RemoteCommand, UsageCounts, ValidationOutcome,
};
use wisp_core::license::{LicenseRecord, PlanType};
use wisp_core::ports::{AuthorityApi, Clock, LicenseRepository, UsageProvider};
use wisp_core::{Error, Result};

/// Factory for sample license records.
pub struct LicenseFixture;

impl LicenseFixture {
    /// An active premium license with a healthy heartbeat, bound to the
    /// host running the tests.
    pub fn premium(now: DateTime<Utc>) -> LicenseRecord {
        let hardware_id = wisp_licensing::HardwareIdentity::current().1;
        let mut record = LicenseRecord::new("WISP-PREM-12345", hardware_id);
        record.plan_type = PlanType::Premium;
        record.limits = PlanType::Premium.default_limits();
        record.activated_at = now - Duration::days(90);
        record.created_at = now - Duration::days(90);
        record.expires_at = Some(now + Duration::days(275));
        record.last_validated = Some(now - Duration::hours(2));
        record.last_heartbeat = Some(now - Duration::hours(1));
        record.metadata.last_known_date = Some(now - Duration::hours(1));
        record
    }

    /// A suspended license with a reason.
    pub fn suspended(now: DateTime<Utc>) -> LicenseRecord {
        let mut record = Self::premium(now);
        record.suspend("Payment overdue");
        record
    }
}

/// In-memory license repository; counts `current()` calls so tests can
/// assert cache behavior.
#[derive(Default)]
pub struct MemoryLicenseRepository {
    records: Mutex<Vec<LicenseRecord>>,
    current_calls: AtomicUsize,
}

impl MemoryLicenseRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: LicenseRecord) -> Self {
        let repo = Self::new();
        repo.records.lock().unwrap().push(record);
        repo
    }

    /// Number of `current()` lookups performed so far.
    pub fn current_calls(&self) -> usize {
        self.current_calls.load(Ordering::SeqCst)
    }

    /// Snapshot of the current record, bypassing the call counter.
    pub fn snapshot(&self) -> Option<LicenseRecord> {
        let records = self.records.lock().unwrap();
        records
            .iter()
            .filter(|r| r.active)
            .max_by_key(|r| r.created_at)
            .cloned()
    }
}

#[async_trait]
impl LicenseRepository for MemoryLicenseRepository {
    async fn current(&self) -> Result<Option<LicenseRecord>> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot())
    }

    async fn find_by_key(&self, license_key: &str) -> Result<Option<LicenseRecord>> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| r.license_key == license_key)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn insert(&self, record: &LicenseRecord) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        for existing in records.iter_mut() {
            existing.active = false;
        }
        records.push(record.clone());
        Ok(())
    }

    async fn update(&self, record: &LicenseRecord) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(Error::LicenseNotFound),
        }
    }
}

/// Controllable clock for tamper and TTL tests.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Static usage counts.
pub struct StaticUsage(pub UsageCounts);

#[async_trait]
impl UsageProvider for StaticUsage {
    async fn usage_counts(&self) -> Result<UsageCounts> {
        Ok(self.0)
    }
}

/// Scripted authority double.
///
/// Mirrors the HTTP client's policy surface: with `fail_transport` set,
/// validation and heartbeats return synthetic offline outcomes while the
/// command endpoints error, exactly as the real client behaves when every
/// endpoint is down.
pub struct MockAuthority {
    pub validate_outcome: Mutex<ValidationOutcome>,
    pub registration_outcome: Mutex<RegistrationOutcome>,
    pub heartbeat_outcome: Mutex<HeartbeatOutcome>,
    pub pending: Mutex<Vec<RemoteCommand>>,
    pub acks: Mutex<Vec<(String, CommandResult)>>,
    pub heartbeats: Mutex<Vec<HeartbeatPayload>>,
    pub fail_transport: AtomicBool,
    validate_calls: AtomicUsize,
}

impl Default for MockAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAuthority {
    pub fn new() -> Self {
        Self {
            validate_outcome: Mutex::new(ValidationOutcome {
                valid: true,
                offline: false,
                status: None,
                plan_type: Some(PlanType::Premium),
                expires_at: None,
                features: Default::default(),
                limits: Some(PlanType::Premium.default_limits()),
                suspended: false,
                suspension_reason: None,
                error: None,
            }),
            registration_outcome: Mutex::new(RegistrationOutcome {
                success: true,
                plan_type: Some(PlanType::Premium),
                expires_at: None,
                limits: Some(PlanType::Premium.default_limits()),
                error: None,
            }),
            heartbeat_outcome: Mutex::new(HeartbeatOutcome {
                success: true,
                offline: false,
                suspended: false,
                suspension_reason: None,
            }),
            pending: Mutex::new(vec![]),
            acks: Mutex::new(vec![]),
            heartbeats: Mutex::new(vec![]),
            fail_transport: AtomicBool::new(false),
            validate_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.fail_transport.store(offline, Ordering::SeqCst);
    }

    pub fn push_command(&self, id: &str, command: &str, parameters: serde_json::Value) {
        self.pending.lock().unwrap().push(RemoteCommand {
            id: id.to_string(),
            command: command.to_string(),
            parameters,
        });
    }

    pub fn order_suspension(&self, reason: &str) {
        *self.heartbeat_outcome.lock().unwrap() = HeartbeatOutcome {
            success: true,
            offline: false,
            suspended: true,
            suspension_reason: Some(reason.to_string()),
        };
    }

    pub fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    pub fn last_heartbeat(&self) -> Option<HeartbeatPayload> {
        self.heartbeats.lock().unwrap().last().cloned()
    }

    fn offline(&self) -> bool {
        self.fail_transport.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthorityApi for MockAuthority {
    async fn validate(
        &self,
        _license_key: &str,
        _hardware_id: &str,
        _hardware: &HardwareInfo,
    ) -> Result<ValidationOutcome> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        if self.offline() {
            return Ok(ValidationOutcome::offline());
        }
        Ok(self.validate_outcome.lock().unwrap().clone())
    }

    async fn register(
        &self,
        _license_key: &str,
        _hardware_id: &str,
        _hardware: &HardwareInfo,
        _contact: &InstallationContact,
    ) -> Result<RegistrationOutcome> {
        if self.offline() {
            return Err(Error::AuthorityUnreachable("connection refused".to_string()));
        }
        Ok(self.registration_outcome.lock().unwrap().clone())
    }

    async fn heartbeat(&self, payload: &HeartbeatPayload) -> Result<HeartbeatOutcome> {
        self.heartbeats.lock().unwrap().push(payload.clone());
        if self.offline() {
            return Ok(HeartbeatOutcome {
                success: false,
                offline: true,
                suspended: false,
                suspension_reason: None,
            });
        }
        Ok(self.heartbeat_outcome.lock().unwrap().clone())
    }

    async fn pending_commands(&self, _license_key: &str) -> Result<Vec<RemoteCommand>> {
        if self.offline() {
            return Err(Error::AuthorityUnreachable("connection refused".to_string()));
        }
        Ok(std::mem::take(&mut *self.pending.lock().unwrap()))
    }

    async fn report_command_result(&self, command_id: &str, result: &CommandResult) -> Result<()> {
        if self.offline() {
            return Err(Error::AuthorityUnreachable("connection refused".to_string()));
        }
        self.acks
            .lock()
            .unwrap()
            .push((command_id.to_string(), result.clone()));
        Ok(())
    }
}
