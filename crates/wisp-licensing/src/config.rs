//! Licensing subsystem configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the license enforcement subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicensingConfig {
    /// Primary authority endpoint.
    #[serde(default = "default_primary_url")]
    pub primary_url: String,
    /// Fallback endpoint, tried only on transport-level failures.
    #[serde(default = "default_fallback_url")]
    pub fallback_url: Option<String>,
    /// Per-call HTTP timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Maximum days the installation may run without reaching the authority.
    #[serde(default = "default_grace_days")]
    pub offline_grace_days: i64,
    /// TTL of the suspension gate's process-local cache, in seconds.
    #[serde(default = "default_gate_ttl")]
    pub gate_ttl_secs: u64,
    /// Path prefixes that bypass the suspension gate entirely.
    #[serde(default = "default_exempt_prefixes")]
    pub exempt_path_prefixes: Vec<String>,
    /// Hourly heartbeat cadence.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
    /// Daily usage-metrics cadence.
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
    /// Weekly deep re-validation cadence.
    #[serde(default = "default_deep_validation_interval")]
    pub deep_validation_interval_secs: u64,
    /// Remote command poll cadence.
    #[serde(default = "default_command_poll_interval")]
    pub command_poll_interval_secs: u64,
}

fn default_primary_url() -> String {
    "https://store.wisp-isp.io/api".to_string()
}

fn default_fallback_url() -> Option<String> {
    Some("https://store-fallback.wisp-isp.io/api".to_string())
}

fn default_request_timeout() -> u64 {
    10
}

fn default_grace_days() -> i64 {
    30
}

fn default_gate_ttl() -> u64 {
    3600
}

fn default_exempt_prefixes() -> Vec<String> {
    vec![
        "/api/auth".to_string(),
        "/api/payments".to_string(),
        "/api/invoices".to_string(),
        "/api/system-licenses".to_string(),
        "/licenses".to_string(),
    ]
}

fn default_heartbeat_interval() -> u64 {
    3600
}

fn default_metrics_interval() -> u64 {
    86_400
}

fn default_deep_validation_interval() -> u64 {
    604_800
}

fn default_command_poll_interval() -> u64 {
    300
}

impl Default for LicensingConfig {
    fn default() -> Self {
        Self {
            primary_url: default_primary_url(),
            fallback_url: default_fallback_url(),
            request_timeout_secs: default_request_timeout(),
            offline_grace_days: default_grace_days(),
            gate_ttl_secs: default_gate_ttl(),
            exempt_path_prefixes: default_exempt_prefixes(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            metrics_interval_secs: default_metrics_interval(),
            deep_validation_interval_secs: default_deep_validation_interval(),
            command_poll_interval_secs: default_command_poll_interval(),
        }
    }
}

impl LicensingConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Ordered endpoint list: primary first, then fallback if configured.
    pub fn endpoints(&self) -> Vec<String> {
        let mut endpoints = vec![self.primary_url.clone()];
        if let Some(fallback) = &self.fallback_url {
            endpoints.push(fallback.clone());
        }
        endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LicensingConfig::default();
        assert_eq!(config.offline_grace_days, 30);
        assert_eq!(config.gate_ttl_secs, 3600);
        assert_eq!(config.endpoints().len(), 2);
    }

    #[test]
    fn test_partial_yaml() {
        let config: LicensingConfig =
            serde_yaml::from_str("primary_url: http://localhost:9000\nfallback_url: null").unwrap();
        assert_eq!(config.primary_url, "http://localhost:9000");
        assert_eq!(config.endpoints(), vec!["http://localhost:9000"]);
        assert_eq!(config.request_timeout_secs, 10);
    }
}
