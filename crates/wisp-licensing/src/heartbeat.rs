//! Periodic reporting to the licensing authority.

use std::sync::Arc;
use tracing::{debug, info, warn};
use wisp_core::authority::{HeartbeatOutcome, HeartbeatPayload, InstallationContact, UsageCounts};
use wisp_core::license::{LicenseStatus, PlanType};
use wisp_core::ports::{AuthorityApi, Clock, LicenseRepository, UsageProvider};
use wisp_core::{Error, Result};

use crate::authority::limit_checks;
use crate::gate::SuspensionCache;
use crate::hardware::HardwareIdentity;
use crate::tamper::TamperGuard;

/// Sends usage, limits, and tamper state to the authority and applies
/// authority-issued suspension instructions.
///
/// Three cadences share this service: the hourly heartbeat, the daily usage
/// report, and the weekly deep re-validation. A forced heartbeat runs the
/// same path synchronously ahead of quota-sensitive mutations.
pub struct HeartbeatService {
    repo: Arc<dyn LicenseRepository>,
    authority: Arc<dyn AuthorityApi>,
    usage: Arc<dyn UsageProvider>,
    clock: Arc<dyn Clock>,
    guard: TamperGuard,
    cache: Arc<SuspensionCache>,
    contact: Option<InstallationContact>,
}

impl HeartbeatService {
    pub fn new(
        repo: Arc<dyn LicenseRepository>,
        authority: Arc<dyn AuthorityApi>,
        usage: Arc<dyn UsageProvider>,
        clock: Arc<dyn Clock>,
        guard: TamperGuard,
        cache: Arc<SuspensionCache>,
    ) -> Self {
        Self {
            repo,
            authority,
            usage,
            clock,
            guard,
            cache,
            contact: None,
        }
    }

    /// Attach installation contact details included in heartbeat payloads.
    pub fn with_contact(mut self, contact: InstallationContact) -> Self {
        self.contact = Some(contact);
        self
    }

    /// Scheduled hourly heartbeat.
    pub async fn run_heartbeat(&self) -> Result<HeartbeatOutcome> {
        self.send_report(false).await
    }

    /// Synchronous heartbeat ahead of a quota-sensitive operation.
    pub async fn force_heartbeat(&self) -> Result<HeartbeatOutcome> {
        self.send_report(true).await
    }

    /// Daily usage-metrics report; same payload shape, scheduled cadence.
    pub async fn run_metrics_report(&self) -> Result<HeartbeatOutcome> {
        debug!("Running daily usage metrics report");
        self.send_report(false).await
    }

    async fn send_report(&self, forced: bool) -> Result<HeartbeatOutcome> {
        let Some(mut record) = self.repo.current().await? else {
            return Err(Error::LicenseNotFound);
        };

        // Master installations never talk to the authority.
        if record.plan_type == PlanType::Master {
            return Ok(HeartbeatOutcome {
                success: true,
                offline: false,
                suspended: false,
                suspension_reason: None,
            });
        }

        let now = self.clock.now();
        let (hardware, hardware_id) = HardwareIdentity::current();

        let usage = match self.usage.usage_counts().await {
            Ok(counts) => counts,
            Err(e) => {
                warn!(error = %e, "Usage counts unavailable, reporting zeros");
                UsageCounts::default()
            }
        };

        // Local tamper check; a detected rollback suspends immediately and
        // is still reported to the authority in the same payload. A clean
        // watermark advance is persisted right away: rollback detection
        // must keep its footing through an offline stretch.
        let before_watermark = record.metadata.last_known_date;
        let clock_check = self.guard.check_clock(&mut record, now);
        if clock_check.is_manipulated() {
            record.suspend(wisp_core::license::TAMPER_SUSPENSION_REASON);
            self.repo.update(&record).await?;
            self.cache.invalidate().await;
        } else if record.metadata.last_known_date != before_watermark {
            self.repo.update(&record).await?;
        }

        let payload = HeartbeatPayload {
            license_key: record.license_key.clone(),
            hardware_id,
            hardware,
            location: self.contact.clone(),
            metrics: usage,
            limits_validation: limit_checks(&record.limits, &usage),
            date_manipulation: record.metadata.manipulation.clone(),
            timestamp: now,
            forced,
        };

        let outcome = self.authority.heartbeat(&payload).await?;

        if outcome.offline {
            // Not reaching the authority changes nothing beyond the
            // watermark persisted above: the grace clock keeps running and
            // a stored suspension holds.
            debug!("Heartbeat offline, license state held");
            return Ok(outcome);
        }

        if outcome.success {
            record.last_heartbeat = Some(now);
        }

        if outcome.suspended {
            let reason = outcome
                .suspension_reason
                .clone()
                .unwrap_or_else(|| "Suspended by licensing authority".to_string());
            info!(reason = %reason, "Authority ordered suspension");
            record.suspend(reason);
            self.cache.invalidate().await;
        }

        self.repo.update(&record).await?;
        Ok(outcome)
    }

    /// Weekly deep re-validation with hardware refresh.
    pub async fn run_deep_validation(&self) -> Result<()> {
        let Some(mut record) = self.repo.current().await? else {
            return Err(Error::LicenseNotFound);
        };

        if record.plan_type == PlanType::Master {
            return Ok(());
        }

        let now = self.clock.now();
        let (hardware, hardware_id) = HardwareIdentity::current();
        if hardware_id != record.hardware_id {
            warn!(
                stored = %record.hardware_id,
                computed = %hardware_id,
                "Host fingerprint differs from license binding"
            );
        }

        let outcome = self
            .authority
            .validate(&record.license_key, &hardware_id, &hardware)
            .await?;

        if outcome.offline {
            debug!("Deep validation offline, keeping cached license state");
            return Ok(());
        }

        if outcome.suspended {
            let reason = outcome
                .suspension_reason
                .clone()
                .unwrap_or_else(|| "Suspended by licensing authority".to_string());
            record.suspend(reason);
            self.cache.invalidate().await;
        } else if !outcome.valid {
            warn!(
                error = outcome.error.as_deref().unwrap_or("unspecified"),
                "Authority reports license invalid"
            );
            record.status = LicenseStatus::Inactive;
        } else {
            if let Some(plan_type) = outcome.plan_type {
                record.plan_type = plan_type;
                record.limits = outcome.limits.unwrap_or_else(|| plan_type.default_limits());
            } else if let Some(limits) = outcome.limits {
                record.limits = limits;
            }
            if !outcome.features.is_empty() {
                record.features_enabled = outcome.features.clone();
            }
            record.expires_at = outcome.expires_at;
            record.last_validated = Some(now);
        }

        self.repo.update(&record).await?;
        Ok(())
    }
}
