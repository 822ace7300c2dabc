//! Activation/verification facade used by the HTTP layer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use wisp_core::authority::{HeartbeatOutcome, InstallationContact, ValidationOutcome};
use wisp_core::license::{LicenseRecord, LicenseStatus, PlanLimits, PlanType};
use wisp_core::ports::{AuthorityApi, Clock, LicenseRepository};
use wisp_core::{Error, Result};

use crate::gate::SuspensionCache;
use crate::hardware::HardwareIdentity;
use crate::heartbeat::HeartbeatService;
use crate::master::MasterOverride;
use crate::tamper::{ExpirationStatus, TamperGuard};

/// License state as presented to operators and the admin console.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseSummary {
    pub license_key: String,
    pub plan_type: PlanType,
    pub status: LicenseStatus,
    pub limits: PlanLimits,
    pub features_enabled: HashMap<String, bool>,
    pub activated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_validated: Option<DateTime<Utc>>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub suspension_reason: Option<String>,
    /// Derived validity code: valid/no_expiration/expired/
    /// offline_grace_period_exceeded/date_manipulation.
    pub validity: String,
    pub days_remaining: Option<i64>,
}

/// Orchestrates activation, on-demand verification, and summaries.
///
/// Input validation happens here; malformed requests never reach the
/// authority client.
pub struct LicenseService {
    repo: Arc<dyn LicenseRepository>,
    authority: Arc<dyn AuthorityApi>,
    clock: Arc<dyn Clock>,
    guard: TamperGuard,
    master: Arc<MasterOverride>,
    cache: Arc<SuspensionCache>,
    heartbeat: Arc<HeartbeatService>,
}

impl LicenseService {
    pub fn new(
        repo: Arc<dyn LicenseRepository>,
        authority: Arc<dyn AuthorityApi>,
        clock: Arc<dyn Clock>,
        guard: TamperGuard,
        master: Arc<MasterOverride>,
        cache: Arc<SuspensionCache>,
        heartbeat: Arc<HeartbeatService>,
    ) -> Self {
        Self {
            repo,
            authority,
            clock,
            guard,
            master,
            cache,
            heartbeat,
        }
    }

    /// Summary of the current license, including derived expiration status.
    pub async fn current_summary(&self) -> Result<LicenseSummary> {
        let mut record = self.repo.current().await?.ok_or(Error::LicenseNotFound)?;

        if record.plan_type == PlanType::Master {
            return Ok(summarize(
                &record,
                ExpirationStatus::Valid {
                    days_remaining: None,
                },
            ));
        }

        let now = self.clock.now();
        let before_status = record.status;
        let before_watermark = record.metadata.last_known_date;
        let status = self.guard.evaluate(&mut record, now);
        if record.status != before_status || record.metadata.last_known_date != before_watermark {
            self.repo.update(&record).await?;
            if record.is_suspended() && before_status != LicenseStatus::Suspended {
                self.cache.invalidate().await;
            }
        }

        Ok(summarize(&record, status))
    }

    /// Activate this installation for a license key.
    pub async fn activate(
        &self,
        license_key: &str,
        contact: InstallationContact,
    ) -> Result<LicenseSummary> {
        let license_key = license_key.trim();
        if license_key.is_empty() {
            return Err(Error::InvalidInput("License key is required".to_string()));
        }

        let now = self.clock.now();
        let (hardware, hardware_id) = HardwareIdentity::current();

        // Master key: local, unlimited, host-independent. No remote call.
        if self.master.matches(license_key) {
            info!("Activating with master override key");
            let mut record = LicenseRecord::new(self.master.key(), hardware_id);
            record.plan_type = PlanType::Master;
            record.limits = PlanLimits::unlimited();
            record.activated_at = now;
            record.created_at = now;
            self.repo.insert(&record).await?;
            self.cache.invalidate().await;
            return Ok(summarize(
                &record,
                ExpirationStatus::Valid {
                    days_remaining: None,
                },
            ));
        }

        let outcome = self
            .authority
            .register(license_key, &hardware_id, &hardware, &contact)
            .await?;

        if !outcome.success {
            let reason = outcome
                .error
                .unwrap_or_else(|| "Registration rejected".to_string());
            warn!(reason = %reason, "License activation rejected by authority");
            return Err(Error::AuthorityRejected(reason));
        }

        let plan_type = outcome.plan_type.unwrap_or(PlanType::Freemium);
        let mut record = LicenseRecord::new(license_key, hardware_id);
        record.plan_type = plan_type;
        record.limits = outcome.limits.unwrap_or_else(|| plan_type.default_limits());
        record.expires_at = outcome.expires_at;
        record.activated_at = now;
        record.created_at = now;
        record.last_validated = Some(now);
        record.metadata.last_known_date = Some(now);

        self.repo.insert(&record).await?;
        self.cache.invalidate().await;
        info!(plan = plan_type.as_str(), "License activated");

        let status = ExpirationStatus::Valid {
            days_remaining: record.expires_at.map(|e| (e - now).num_days()),
        };
        Ok(summarize(&record, status))
    }

    /// On-demand validation of a presented key.
    pub async fn verify(&self, license_key: &str) -> Result<ValidationOutcome> {
        let license_key = license_key.trim();
        if license_key.is_empty() {
            return Err(Error::InvalidInput("License key is required".to_string()));
        }

        // The master key validates without any remote call, even with the
        // authority completely unreachable.
        if self.master.matches(license_key) {
            let mut outcome = ValidationOutcome::offline();
            outcome.offline = false;
            outcome.status = Some(LicenseStatus::Active);
            outcome.plan_type = Some(PlanType::Master);
            outcome.limits = Some(PlanLimits::unlimited());
            return Ok(outcome);
        }

        let now = self.clock.now();
        let (hardware, hardware_id) = HardwareIdentity::current();
        let stored = self.repo.find_by_key(license_key).await?;

        // Hardware binding: a stored license is only valid on the host it
        // was activated on.
        if let Some(record) = &stored {
            if record.hardware_id != hardware_id {
                warn!("Verification failed: fingerprint mismatch");
                return Ok(ValidationOutcome::rejected(
                    "License is bound to a different machine",
                ));
            }
        }

        let mut outcome = self
            .authority
            .validate(license_key, &hardware_id, &hardware)
            .await?;

        if let Some(mut record) = stored {
            if outcome.offline {
                // Fail closed for suspension: connectivity loss never lifts
                // a stored suspension instruction.
                if record.is_suspended() {
                    outcome.suspended = true;
                    outcome.suspension_reason = record.metadata.suspension_reason.clone();
                }
                return Ok(outcome);
            }

            if outcome.suspended {
                let reason = outcome
                    .suspension_reason
                    .clone()
                    .unwrap_or_else(|| "Suspended by licensing authority".to_string());
                record.suspend(reason);
                self.cache.invalidate().await;
            } else if outcome.valid {
                if let Some(plan_type) = outcome.plan_type {
                    record.plan_type = plan_type;
                    record.limits = outcome
                        .limits
                        .unwrap_or_else(|| plan_type.default_limits());
                }
                if !outcome.features.is_empty() {
                    record.features_enabled = outcome.features.clone();
                }
                record.expires_at = outcome.expires_at;
                record.last_validated = Some(now);
            }
            self.repo.update(&record).await?;
        }

        Ok(outcome)
    }

    /// Immediate forced heartbeat, exposed as `POST /licenses/force-validation`.
    pub async fn force_validation(&self) -> Result<HeartbeatOutcome> {
        self.heartbeat.force_heartbeat().await
    }
}

fn summarize(record: &LicenseRecord, status: ExpirationStatus) -> LicenseSummary {
    let days_remaining = match status {
        ExpirationStatus::Valid { days_remaining } => days_remaining,
        _ => None,
    };
    LicenseSummary {
        license_key: record.license_key.clone(),
        plan_type: record.plan_type,
        status: record.status,
        limits: record.limits,
        features_enabled: record.features_enabled.clone(),
        activated_at: record.activated_at,
        expires_at: record.expires_at,
        last_validated: record.last_validated,
        last_heartbeat: record.last_heartbeat,
        suspension_reason: record.metadata.suspension_reason.clone(),
        validity: status.reason().to_string(),
        days_remaining,
    }
}
