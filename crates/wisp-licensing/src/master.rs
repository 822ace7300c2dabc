//! Master override key for controlled environments.

use sha2::{Digest, Sha256};

/// Seed for the locally derivable master key. Never sent over the network.
const MASTER_SEED: &str = "wisp-master-override-2019";

/// A deterministic, locally computable bypass key.
///
/// Any presented key equal to the derived value is treated as always-valid,
/// unlimited, and host-independent, bypassing the authority, the tamper
/// guard, and the suspension gate. Computed once at construction.
#[derive(Debug, Clone)]
pub struct MasterOverride {
    key: String,
}

impl Default for MasterOverride {
    fn default() -> Self {
        Self::new()
    }
}

impl MasterOverride {
    pub fn new() -> Self {
        Self {
            key: derive_master_key(MASTER_SEED),
        }
    }

    /// The derived master key in presentable form.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether a presented key is the master key.
    pub fn matches(&self, presented: &str) -> bool {
        presented.trim().eq_ignore_ascii_case(&self.key)
    }
}

/// Hash the seed and group the truncated digest into a human-presentable
/// key: five groups of five uppercase hex characters.
fn derive_master_key(seed: &str) -> String {
    let digest = hex::encode(Sha256::digest(seed.as_bytes())).to_uppercase();
    digest.as_bytes()[..25]
        .chunks(5)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("-")
}
