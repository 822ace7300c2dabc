//! Wire vocabulary for the licensing authority contract.
//!
//! These types mirror the Store's HTTP payloads. The client implementation
//! lives in `wisp-licensing`; the shapes live here so schedulers, the gate,
//! and tests share one vocabulary.

use crate::license::{LicenseStatus, ManipulationDetails, PlanLimits, PlanType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable host attributes reported alongside every authority call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareInfo {
    pub hostname: String,
    pub platform: String,
    pub arch: String,
    pub cpu_model: String,
    pub mac_address: String,
}

/// Result of `POST /licenses/validate`.
///
/// When every endpoint fails at the transport level the client synthesizes a
/// permissive outcome with `offline = true`; an explicit rejection never does.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub valid: bool,
    /// True when no endpoint could be reached and the result is synthetic.
    pub offline: bool,
    pub status: Option<LicenseStatus>,
    pub plan_type: Option<PlanType>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub features: HashMap<String, bool>,
    pub limits: Option<PlanLimits>,
    #[serde(default)]
    pub suspended: bool,
    pub suspension_reason: Option<String>,
    pub error: Option<String>,
}

impl ValidationOutcome {
    /// Synthetic permissive result used when every endpoint is unreachable.
    pub fn offline() -> Self {
        Self {
            valid: true,
            offline: true,
            status: None,
            plan_type: None,
            expires_at: None,
            features: HashMap::new(),
            limits: None,
            suspended: false,
            suspension_reason: None,
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            offline: false,
            status: None,
            plan_type: None,
            expires_at: None,
            features: HashMap::new(),
            limits: None,
            suspended: false,
            suspension_reason: None,
            error: Some(error.into()),
        }
    }
}

/// Installation contact/location details sent on registration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationContact {
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub server_url: Option<String>,
}

/// Result of `POST /licenses/register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationOutcome {
    pub success: bool,
    pub plan_type: Option<PlanType>,
    pub expires_at: Option<DateTime<Utc>>,
    pub limits: Option<PlanLimits>,
    pub error: Option<String>,
}

/// Resource usage counts gathered from the surrounding application.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageCounts {
    pub clients: u64,
    pub users: u64,
    pub plugins: u64,
}

/// Comparison of one usage count against its plan limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitCheck {
    pub resource: String,
    pub used: u64,
    pub limit: i64,
    pub exceeded: bool,
}

impl LimitCheck {
    pub fn evaluate(resource: impl Into<String>, used: u64, limit: i64) -> Self {
        Self {
            resource: resource.into(),
            used,
            limit,
            exceeded: !PlanLimits::within(limit, used),
        }
    }
}

/// Body of `POST /licenses/heartbeat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatPayload {
    pub license_key: String,
    pub hardware_id: String,
    pub hardware: HardwareInfo,
    pub location: Option<InstallationContact>,
    pub metrics: UsageCounts,
    pub limits_validation: Vec<LimitCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_manipulation: Option<ManipulationDetails>,
    pub timestamp: DateTime<Utc>,
    pub forced: bool,
}

/// Authority response to a heartbeat.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatOutcome {
    pub success: bool,
    /// True when no endpoint could be reached.
    pub offline: bool,
    #[serde(default)]
    pub suspended: bool,
    pub suspension_reason: Option<String>,
}

/// A pending administrative command issued by the authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCommand {
    pub id: String,
    pub command: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// Execution result acknowledged back to the authority, keyed by command id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub response: Option<String>,
    pub error: Option<String>,
}

impl CommandResult {
    pub fn ok(response: impl Into<String>) -> Self {
        Self {
            success: true,
            response: Some(response.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            response: None,
            error: Some(error.into()),
        }
    }

    pub fn unsupported(command: &str) -> Self {
        Self {
            success: false,
            response: None,
            error: Some(format!("Command not supported: {command}")),
        }
    }
}
