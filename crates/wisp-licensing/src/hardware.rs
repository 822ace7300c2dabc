//! Stable host fingerprint for node-locked licenses.

use sha2::{Digest, Sha256};
use sysinfo::{CpuRefreshKind, Networks, RefreshKind, System};
use wisp_core::authority::HardwareInfo;

/// Derives a stable fingerprint for the host machine.
///
/// The fingerprint hashes hostname, platform, architecture, CPU model, and
/// the MAC address of the first non-loopback interface. Each attribute falls
/// back to a placeholder when unavailable, so derivation never fails.
pub struct HardwareIdentity;

impl HardwareIdentity {
    /// Gather the host attributes reported to the authority.
    pub fn collect() -> HardwareInfo {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let sys = System::new_with_specifics(
            RefreshKind::nothing().with_cpu(CpuRefreshKind::everything()),
        );
        let cpu_model = sys
            .cpus()
            .first()
            .map(|c| c.brand().trim().to_string())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| "unknown-cpu".to_string());

        HardwareInfo {
            hostname,
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpu_model,
            mac_address: Self::primary_mac(),
        }
    }

    /// Compute the fingerprint for a set of host attributes.
    pub fn fingerprint(info: &HardwareInfo) -> String {
        let mut hasher = Sha256::new();
        hasher.update(info.hostname.as_bytes());
        hasher.update(b"|");
        hasher.update(info.platform.as_bytes());
        hasher.update(b"|");
        hasher.update(info.arch.as_bytes());
        hasher.update(b"|");
        hasher.update(info.cpu_model.as_bytes());
        hasher.update(b"|");
        hasher.update(info.mac_address.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Gather attributes and fingerprint in one call.
    pub fn current() -> (HardwareInfo, String) {
        let info = Self::collect();
        let id = Self::fingerprint(&info);
        (info, id)
    }

    /// MAC address of the first non-loopback interface with a non-zero
    /// address, or a placeholder when none exists.
    fn primary_mac() -> String {
        let networks = Networks::new_with_refreshed_list();
        let mut candidates: Vec<(&String, String)> = networks
            .iter()
            .filter(|(name, data)| {
                !name.starts_with("lo") && data.mac_address().0.iter().any(|b| *b != 0)
            })
            .map(|(name, data)| (name, data.mac_address().to_string()))
            .collect();
        // Interface enumeration order is not stable across boots.
        candidates.sort_by(|a, b| a.0.cmp(b.0));
        candidates
            .into_iter()
            .next()
            .map(|(_, mac)| mac)
            .unwrap_or_else(|| "00:00:00:00:00:00".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_info() -> HardwareInfo {
        HardwareInfo {
            hostname: "isp-core-01".to_string(),
            platform: "linux".to_string(),
            arch: "x86_64".to_string(),
            cpu_model: "Xeon E5-2650".to_string(),
            mac_address: "aa:bb:cc:dd:ee:ff".to_string(),
        }
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let info = sample_info();
        let first = HardwareIdentity::fingerprint(&info);
        let second = HardwareIdentity::fingerprint(&info);
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_sensitive_to_attributes() {
        let info = sample_info();
        let mut moved = sample_info();
        moved.mac_address = "11:22:33:44:55:66".to_string();
        assert_ne!(
            HardwareIdentity::fingerprint(&info),
            HardwareIdentity::fingerprint(&moved)
        );
    }

    #[test]
    fn test_current_never_fails() {
        let (info, id) = HardwareIdentity::current();
        assert!(!info.hostname.is_empty());
        assert_eq!(id.len(), 64);
        assert_eq!(id, HardwareIdentity::fingerprint(&info));
    }
}
