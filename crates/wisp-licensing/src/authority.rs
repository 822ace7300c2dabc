//! HTTP client for the remote licensing authority.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use wisp_core::authority::{
    CommandResult, HardwareInfo, HeartbeatOutcome, HeartbeatPayload, InstallationContact,
    RegistrationOutcome, RemoteCommand, UsageCounts, ValidationOutcome,
};
use wisp_core::license::{LicenseStatus, PlanLimits, PlanType};
use wisp_core::ports::AuthorityApi;
use wisp_core::{Error, Result};

use crate::config::LicensingConfig;

/// Authority client with an ordered endpoint list and bounded timeouts.
///
/// Every call tries the primary endpoint first and falls back only on
/// transport-level failures (connect/timeout/DNS and gateway 5xx). Explicit
/// 4xx rejections stop immediately. `validate` fails open when every
/// endpoint is unreachable; nothing here ever clears a stored suspension.
pub struct HttpAuthorityClient {
    endpoints: Vec<String>,
    client: reqwest::Client,
    system_version: String,
}

/// How one endpoint attempt ended.
enum Attempt {
    /// 2xx with a parsed body.
    Ok(serde_json::Value),
    /// Worth trying the next endpoint.
    Transport(String),
    /// Explicit rejection; do not retry against the fallback.
    Rejected(StatusCode, String),
}

impl HttpAuthorityClient {
    pub fn new(config: &LicensingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoints: config.endpoints(),
            client,
            system_version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// Whether an HTTP status counts as a transport-level failure.
    fn is_gateway_error(status: StatusCode) -> bool {
        matches!(status.as_u16(), 500 | 502 | 503 | 504)
    }

    async fn attempt(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Attempt {
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Attempt::Transport(e.to_string()),
        };

        let status = response.status();
        if status.is_success() {
            return match response.json().await {
                Ok(json) => Attempt::Ok(json),
                Err(e) => Attempt::Rejected(status, format!("Malformed response body: {e}")),
            };
        }

        let text = response.text().await.unwrap_or_default();
        if Self::is_gateway_error(status) {
            Attempt::Transport(format!("{status}: {text}"))
        } else {
            Attempt::Rejected(status, text)
        }
    }

    /// Try each endpoint in order. Transport failures advance to the next
    /// endpoint; rejections and successes end the sequence.
    async fn call(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let mut last_transport_error = String::new();

        for endpoint in &self.endpoints {
            let url = format!("{}{}", endpoint.trim_end_matches('/'), path);
            match self.attempt(method.clone(), &url, body.as_ref()).await {
                Attempt::Ok(json) => {
                    debug!(url = %url, "Authority call succeeded");
                    return Ok(json);
                }
                Attempt::Transport(err) => {
                    warn!(url = %url, error = %err, "Authority endpoint unreachable, trying next");
                    last_transport_error = err;
                }
                Attempt::Rejected(status, text) => {
                    warn!(url = %url, status = %status, "Authority rejected request");
                    return Err(Error::AuthorityRejected(format!("{status}: {text}")));
                }
            }
        }

        Err(Error::AuthorityUnreachable(last_transport_error))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateRequest<'a> {
    license_key: &'a str,
    hardware_id: &'a str,
    hardware: &'a HardwareInfo,
    system_version: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateResponse {
    valid: bool,
    status: Option<String>,
    plan_type: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    features: HashMap<String, bool>,
    limits: Option<WireLimits>,
    #[serde(default)]
    suspended: bool,
    suspension_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireLimits {
    client_limit: i64,
    user_limit: i64,
    plugin_limit: i64,
}

impl From<WireLimits> for PlanLimits {
    fn from(w: WireLimits) -> Self {
        PlanLimits::new(w.client_limit, w.user_limit, w.plugin_limit)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest<'a> {
    license_key: &'a str,
    hardware_id: &'a str,
    hardware: &'a HardwareInfo,
    location: &'a InstallationContact,
    system_version: &'a str,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    success: bool,
    data: Option<RegisterData>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterData {
    plan_type: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    limits: Option<WireLimits>,
}

#[derive(Debug, Deserialize)]
struct HeartbeatResponse {
    success: bool,
    data: Option<HeartbeatData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeartbeatData {
    #[serde(default)]
    suspended: bool,
    suspension_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PendingCommandsResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    commands: Vec<RemoteCommand>,
}

/// Leading characters of an opaque key for log fields. Keys are not
/// guaranteed ASCII, so this must never split a character.
fn key_prefix(key: &str) -> String {
    key.chars().take(8).collect()
}

fn parse_status(s: &str) -> LicenseStatus {
    match s {
        "suspended" => LicenseStatus::Suspended,
        "inactive" => LicenseStatus::Inactive,
        _ => LicenseStatus::Active,
    }
}

#[async_trait]
impl AuthorityApi for HttpAuthorityClient {
    async fn validate(
        &self,
        license_key: &str,
        hardware_id: &str,
        hardware: &HardwareInfo,
    ) -> Result<ValidationOutcome> {
        info!(
            key_prefix = %key_prefix(license_key),
            "Validating license against authority"
        );

        let body = serde_json::to_value(ValidateRequest {
            license_key,
            hardware_id,
            hardware,
            system_version: &self.system_version,
        })?;

        let json = match self
            .call(reqwest::Method::POST, "/licenses/validate", Some(body))
            .await
        {
            Ok(json) => json,
            Err(Error::AuthorityUnreachable(err)) => {
                // Fail open for validation: connectivity loss must not brick
                // an otherwise healthy installation.
                warn!(error = %err, "All authority endpoints unreachable, validating offline");
                return Ok(ValidationOutcome::offline());
            }
            Err(Error::AuthorityRejected(err)) => {
                return Ok(ValidationOutcome::rejected(err));
            }
            Err(e) => return Err(e),
        };

        let response: ValidateResponse = serde_json::from_value(json)?;
        Ok(ValidationOutcome {
            valid: response.valid,
            offline: false,
            status: response.status.as_deref().map(parse_status),
            plan_type: response.plan_type.as_deref().map(PlanType::parse),
            expires_at: response.expires_at,
            features: response.features,
            limits: response.limits.map(PlanLimits::from),
            suspended: response.suspended,
            suspension_reason: response.suspension_reason,
            error: None,
        })
    }

    async fn register(
        &self,
        license_key: &str,
        hardware_id: &str,
        hardware: &HardwareInfo,
        contact: &InstallationContact,
    ) -> Result<RegistrationOutcome> {
        let body = serde_json::to_value(RegisterRequest {
            license_key,
            hardware_id,
            hardware,
            location: contact,
            system_version: &self.system_version,
        })?;

        let json = match self
            .call(reqwest::Method::POST, "/licenses/register", Some(body))
            .await
        {
            Ok(json) => json,
            Err(Error::AuthorityRejected(err)) => {
                return Ok(RegistrationOutcome {
                    success: false,
                    plan_type: None,
                    expires_at: None,
                    limits: None,
                    error: Some(err),
                });
            }
            Err(e) => return Err(e),
        };

        let response: RegisterResponse = serde_json::from_value(json)?;
        let data = response.data.unwrap_or(RegisterData {
            plan_type: None,
            expires_at: None,
            limits: None,
        });
        Ok(RegistrationOutcome {
            success: response.success,
            plan_type: data.plan_type.as_deref().map(PlanType::parse),
            expires_at: data.expires_at,
            limits: data.limits.map(PlanLimits::from),
            error: response.error,
        })
    }

    async fn heartbeat(&self, payload: &HeartbeatPayload) -> Result<HeartbeatOutcome> {
        let body = serde_json::to_value(payload)?;

        let json = match self
            .call(reqwest::Method::POST, "/licenses/heartbeat", Some(body))
            .await
        {
            Ok(json) => json,
            Err(Error::AuthorityUnreachable(err)) => {
                debug!(error = %err, "Heartbeat skipped, authority unreachable");
                return Ok(HeartbeatOutcome {
                    success: false,
                    offline: true,
                    suspended: false,
                    suspension_reason: None,
                });
            }
            Err(e) => return Err(e),
        };

        let response: HeartbeatResponse = serde_json::from_value(json)?;
        let data = response.data.unwrap_or(HeartbeatData {
            suspended: false,
            suspension_reason: None,
        });
        Ok(HeartbeatOutcome {
            success: response.success,
            offline: false,
            suspended: data.suspended,
            suspension_reason: data.suspension_reason,
        })
    }

    async fn pending_commands(&self, license_key: &str) -> Result<Vec<RemoteCommand>> {
        let path = format!("/licenses/{license_key}/pending-commands");
        let json = self.call(reqwest::Method::GET, &path, None).await?;
        let response: PendingCommandsResponse = serde_json::from_value(json)?;
        if !response.success {
            return Ok(vec![]);
        }
        Ok(response.commands)
    }

    async fn report_command_result(&self, command_id: &str, result: &CommandResult) -> Result<()> {
        let path = format!("/commands/{command_id}/result");
        let body = serde_json::to_value(result)?;
        self.call(reqwest::Method::POST, &path, Some(body)).await?;
        Ok(())
    }
}

/// Build the limit comparisons included in heartbeat payloads.
pub fn limit_checks(
    limits: &PlanLimits,
    usage: &UsageCounts,
) -> Vec<wisp_core::authority::LimitCheck> {
    use wisp_core::authority::LimitCheck;
    vec![
        LimitCheck::evaluate("clients", usage.clients, limits.client_limit),
        LimitCheck::evaluate("users", usage.users, limits.user_limit),
        LimitCheck::evaluate("plugins", usage.plugins, limits.plugin_limit),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_classification() {
        for code in [500u16, 502, 503, 504] {
            assert!(HttpAuthorityClient::is_gateway_error(
                StatusCode::from_u16(code).unwrap()
            ));
        }
        for code in [400u16, 401, 403, 404, 422, 501] {
            assert!(!HttpAuthorityClient::is_gateway_error(
                StatusCode::from_u16(code).unwrap()
            ));
        }
    }

    #[test]
    fn test_key_prefix_respects_char_boundaries() {
        // The 8th byte of this key sits inside a multibyte character.
        assert_eq!(key_prefix("abcdefg\u{e9}xyz"), "abcdefg\u{e9}");
        assert_eq!(key_prefix("short"), "short");
        assert_eq!(key_prefix("WISP-PREM-12345"), "WISP-PRE");
    }

    #[test]
    fn test_limit_checks_flag_violations() {
        let limits = PlanLimits::new(100, PlanLimits::UNLIMITED, 3);
        let usage = UsageCounts {
            clients: 150,
            users: 9_000,
            plugins: 3,
        };
        let checks = limit_checks(&limits, &usage);
        assert!(checks[0].exceeded);
        assert!(!checks[1].exceeded);
        assert!(!checks[2].exceeded);
    }

    #[test]
    fn test_validate_response_parsing() {
        let json = serde_json::json!({
            "valid": true,
            "status": "active",
            "planType": "premium",
            "expiresAt": "2027-01-01T00:00:00Z",
            "features": { "ticketing": true },
            "limits": { "clientLimit": 2000, "userLimit": 15, "pluginLimit": 25 },
            "suspended": false
        });
        let response: ValidateResponse = serde_json::from_value(json).unwrap();
        assert!(response.valid);
        assert_eq!(response.plan_type.as_deref(), Some("premium"));
        assert_eq!(response.limits.unwrap().client_limit, 2000);
    }
}
