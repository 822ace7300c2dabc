//! Request-time suspension enforcement.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use wisp_core::license::PlanType;
use wisp_core::ports::{Clock, LicenseRepository};
use wisp_core::Result;

use crate::tamper::TamperGuard;

/// Operations that remain available while suspended.
pub const ALLOWED_ACTIONS: [&str; 5] = [
    "read",
    "update",
    "authentication",
    "payments",
    "invoices",
];

/// Cached suspension verdict.
#[derive(Debug, Clone)]
pub struct CachedStatus {
    pub suspended: bool,
    pub reason: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// Process-local, time-bounded cache of "is this installation suspended".
///
/// A single mutable value with a recorded check time: many request flows
/// read it, the schedulers and the command channel invalidate it when an
/// external signal changes the suspension state.
pub struct SuspensionCache {
    ttl: Duration,
    state: RwLock<Option<CachedStatus>>,
}

impl SuspensionCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs as i64),
            state: RwLock::new(None),
        }
    }

    /// The cached verdict, if it is still within its TTL.
    pub async fn get(&self, now: DateTime<Utc>) -> Option<CachedStatus> {
        let state = self.state.read().await;
        state
            .as_ref()
            .filter(|cached| now - cached.checked_at < self.ttl)
            .cloned()
    }

    pub async fn set(&self, status: CachedStatus) {
        *self.state.write().await = Some(status);
    }

    /// Drop the cached verdict so the next check refreshes immediately.
    pub async fn invalidate(&self) {
        *self.state.write().await = None;
    }
}

/// Outcome of a gate check for one create request.
#[derive(Debug, Clone)]
pub enum GateDecision {
    Allowed,
    Blocked {
        feature: String,
        reason: String,
        allowed_actions: Vec<String>,
    },
}

impl GateDecision {
    pub fn is_blocked(&self) -> bool {
        matches!(self, GateDecision::Blocked { .. })
    }
}

/// Blocks resource-creating operations while the installation is suspended.
///
/// Consulted once per relevant inbound request; the underlying license
/// lookup happens at most once per cache TTL. Exempt paths (authentication,
/// payments, invoices) always pass so a suspended customer can still pay.
pub struct SuspensionGate {
    repo: Arc<dyn LicenseRepository>,
    guard: TamperGuard,
    clock: Arc<dyn Clock>,
    cache: Arc<SuspensionCache>,
    exempt_prefixes: Vec<String>,
}

impl SuspensionGate {
    pub fn new(
        repo: Arc<dyn LicenseRepository>,
        guard: TamperGuard,
        clock: Arc<dyn Clock>,
        cache: Arc<SuspensionCache>,
        exempt_prefixes: Vec<String>,
    ) -> Self {
        Self {
            repo,
            guard,
            clock,
            cache,
            exempt_prefixes,
        }
    }

    pub fn cache(&self) -> Arc<SuspensionCache> {
        self.cache.clone()
    }

    /// Whether a request path bypasses the gate unconditionally.
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Decide whether a create operation on `feature` may proceed.
    pub async fn check(&self, feature: &str) -> Result<GateDecision> {
        let now = self.clock.now();

        let status = match self.cache.get(now).await {
            Some(cached) => cached,
            None => {
                let refreshed = self.refresh(now).await?;
                self.cache.set(refreshed.clone()).await;
                refreshed
            }
        };

        if !status.suspended {
            return Ok(GateDecision::Allowed);
        }

        info!(feature = %feature, "Create operation blocked: license suspended");
        Ok(GateDecision::Blocked {
            feature: feature.to_string(),
            reason: status
                .reason
                .unwrap_or_else(|| "License suspended".to_string()),
            allowed_actions: ALLOWED_ACTIONS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Re-derive the suspension verdict from the license store.
    async fn refresh(&self, now: DateTime<Utc>) -> Result<CachedStatus> {
        debug!("Refreshing suspension cache");

        let Some(mut record) = self.repo.current().await? else {
            // No license yet: nothing to enforce against.
            return Ok(CachedStatus {
                suspended: false,
                reason: None,
                checked_at: now,
            });
        };

        if record.plan_type == PlanType::Master {
            return Ok(CachedStatus {
                suspended: false,
                reason: None,
                checked_at: now,
            });
        }

        // Tamper evaluation can flip the record to suspended; persist any
        // watermark or status movement it caused.
        let before_status = record.status;
        let before_watermark = record.metadata.last_known_date;
        self.guard.evaluate(&mut record, now);
        if record.status != before_status || record.metadata.last_known_date != before_watermark {
            self.repo.update(&record).await?;
        }

        Ok(CachedStatus {
            suspended: record.is_suspended(),
            reason: record.metadata.suspension_reason.clone(),
            checked_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_cache_ttl_window() {
        let cache = SuspensionCache::new(3600);
        let now = Utc::now();
        cache
            .set(CachedStatus {
                suspended: true,
                reason: Some("overdue".to_string()),
                checked_at: now,
            })
            .await;

        // 10 minutes later: still fresh.
        assert!(cache.get(now + Duration::minutes(10)).await.is_some());
        // Past the TTL: stale.
        assert!(cache.get(now + Duration::minutes(61)).await.is_none());
    }

    #[tokio::test]
    async fn test_cache_invalidate() {
        let cache = SuspensionCache::new(3600);
        let now = Utc::now();
        cache
            .set(CachedStatus {
                suspended: false,
                reason: None,
                checked_at: now,
            })
            .await;
        cache.invalidate().await;
        assert!(cache.get(now).await.is_none());
    }
}
