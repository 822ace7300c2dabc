//! License domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Reason string recorded when a clock rollback forces a local suspension.
pub const TAMPER_SUSPENSION_REASON: &str = "System date manipulation detected";

/// Plan tier driving resource limits and enabled features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Freemium,
    Basic,
    Premium,
    Enterprise,
    /// Locally derived override plan; never issued by the authority.
    Master,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Freemium => "freemium",
            PlanType::Basic => "basic",
            PlanType::Premium => "premium",
            PlanType::Enterprise => "enterprise",
            PlanType::Master => "master",
        }
    }

    pub fn parse(s: &str) -> PlanType {
        match s {
            "basic" => PlanType::Basic,
            "premium" => PlanType::Premium,
            "enterprise" => PlanType::Enterprise,
            "master" => PlanType::Master,
            _ => PlanType::Freemium,
        }
    }

    /// Default limits applied when the authority omits them.
    pub fn default_limits(&self) -> PlanLimits {
        match self {
            PlanType::Freemium => PlanLimits::new(100, 2, 3),
            PlanType::Basic => PlanLimits::new(500, 5, 10),
            PlanType::Premium => PlanLimits::new(2000, 15, 25),
            PlanType::Enterprise | PlanType::Master => PlanLimits::unlimited(),
        }
    }
}

/// Resource limits for a plan. `-1` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanLimits {
    pub client_limit: i64,
    pub user_limit: i64,
    pub plugin_limit: i64,
}

impl PlanLimits {
    /// Sentinel value denoting "no limit".
    pub const UNLIMITED: i64 = -1;

    pub fn new(client_limit: i64, user_limit: i64, plugin_limit: i64) -> Self {
        Self {
            client_limit,
            user_limit,
            plugin_limit,
        }
    }

    pub fn unlimited() -> Self {
        Self::new(Self::UNLIMITED, Self::UNLIMITED, Self::UNLIMITED)
    }

    /// Whether `used` fits within `limit`, honoring the unlimited sentinel.
    pub fn within(limit: i64, used: u64) -> bool {
        limit == Self::UNLIMITED || used <= limit as u64
    }
}

/// License status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseStatus {
    Active,
    Suspended,
    Inactive,
}

/// Details recorded when a clock rollback is observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManipulationDetails {
    /// When the rollback was detected (post-rollback wall clock).
    pub detected_at: DateTime<Utc>,
    /// The watermark the clock fell behind.
    pub watermark: DateTime<Utc>,
    /// Magnitude of the rollback in whole days.
    pub rollback_days: i64,
}

/// Free-form license metadata, including the tamper-detection watermark.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LicenseMetadata {
    /// Monotonic wall-clock watermark; a decrease is the tamper signal.
    pub last_known_date: Option<DateTime<Utc>>,
    pub suspension_reason: Option<String>,
    pub manipulation: Option<ManipulationDetails>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Persisted record of the installation's current license.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseRecord {
    pub id: Uuid,
    /// Opaque key issued by the authority; unique.
    pub license_key: String,
    /// Host fingerprint the license is bound to.
    pub hardware_id: String,
    pub plan_type: PlanType,
    pub limits: PlanLimits,
    #[serde(default)]
    pub features_enabled: HashMap<String, bool>,
    pub status: LicenseStatus,
    /// Superseded records are kept with `active = false`.
    pub active: bool,
    pub activated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_validated: Option<DateTime<Utc>>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: LicenseMetadata,
    pub created_at: DateTime<Utc>,
}

impl LicenseRecord {
    /// Create a fresh active record for a newly validated key.
    pub fn new(license_key: impl Into<String>, hardware_id: impl Into<String>) -> Self {
        let now = Utc::now();
        let plan_type = PlanType::Freemium;
        Self {
            id: Uuid::new_v4(),
            license_key: license_key.into(),
            hardware_id: hardware_id.into(),
            plan_type,
            limits: plan_type.default_limits(),
            features_enabled: HashMap::new(),
            status: LicenseStatus::Active,
            active: true,
            activated_at: now,
            expires_at: None,
            last_validated: None,
            last_heartbeat: None,
            metadata: LicenseMetadata::default(),
            created_at: now,
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.status == LicenseStatus::Suspended
    }

    /// Mark the record suspended. A suspended record always carries a reason.
    pub fn suspend(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        debug_assert!(!reason.is_empty());
        self.status = LicenseStatus::Suspended;
        self.metadata.suspension_reason = Some(reason);
    }

    /// Clear a suspension and return to active status.
    pub fn reactivate(&mut self) {
        self.status = LicenseStatus::Active;
        self.metadata.suspension_reason = None;
        self.metadata.manipulation = None;
    }

    pub fn has_feature(&self, name: &str) -> bool {
        self.features_enabled.get(name).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_type_roundtrip() {
        for plan in [
            PlanType::Freemium,
            PlanType::Basic,
            PlanType::Premium,
            PlanType::Enterprise,
            PlanType::Master,
        ] {
            assert_eq!(PlanType::parse(plan.as_str()), plan);
        }
        assert_eq!(PlanType::parse("bogus"), PlanType::Freemium);
    }

    #[test]
    fn test_limits_unlimited_sentinel() {
        assert!(PlanLimits::within(PlanLimits::UNLIMITED, u64::MAX));
        assert!(PlanLimits::within(10, 10));
        assert!(!PlanLimits::within(10, 11));
    }

    #[test]
    fn test_suspend_and_reactivate() {
        let mut record = LicenseRecord::new("WISP-TEST", "hw");
        record.suspend("payment overdue");
        assert!(record.is_suspended());
        assert_eq!(
            record.metadata.suspension_reason.as_deref(),
            Some("payment overdue")
        );

        record.reactivate();
        assert_eq!(record.status, LicenseStatus::Active);
        assert!(record.metadata.suspension_reason.is_none());
    }
}
