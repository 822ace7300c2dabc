//! Clock-rollback detection and expiration evaluation.

use chrono::{DateTime, Utc};
use tracing::warn;
use wisp_core::license::{LicenseRecord, ManipulationDetails, TAMPER_SUSPENSION_REASON};

/// Outcome of the clock-rollback check.
#[derive(Debug, Clone)]
pub enum ClockCheck {
    Clean,
    Manipulated(ManipulationDetails),
}

impl ClockCheck {
    pub fn is_manipulated(&self) -> bool {
        matches!(self, ClockCheck::Manipulated(_))
    }
}

/// Why a license is (or is not) currently usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpirationStatus {
    /// Usable. `days_remaining` is `None` for non-expiring licenses.
    Valid { days_remaining: Option<i64> },
    /// The local clock moved backward past the watermark.
    DateManipulation { rollback_days: i64 },
    /// Past `expires_at`.
    Expired { days_overdue: i64 },
    /// The authority has not been reached within the grace period.
    OfflineGraceExceeded { days_since_contact: i64 },
}

impl ExpirationStatus {
    pub fn is_expired(&self) -> bool {
        !matches!(self, ExpirationStatus::Valid { .. })
    }

    /// Stable reason code reported to operators and the authority.
    pub fn reason(&self) -> &'static str {
        match self {
            ExpirationStatus::Valid {
                days_remaining: None,
            } => "no_expiration",
            ExpirationStatus::Valid { .. } => "valid",
            ExpirationStatus::DateManipulation { .. } => "date_manipulation",
            ExpirationStatus::Expired { .. } => "expired",
            ExpirationStatus::OfflineGraceExceeded { .. } => "offline_grace_period_exceeded",
        }
    }
}

/// Detects backward clock movement and computes expiration status.
///
/// The watermark in `metadata.last_known_date` is a ratchet: it only moves
/// forward, and while the clock sits behind it every check keeps reporting
/// manipulation. Both checks run purely against the local record, so they
/// hold fully offline.
#[derive(Debug, Clone, Copy)]
pub struct TamperGuard {
    grace_days: i64,
}

impl TamperGuard {
    pub fn new(grace_days: i64) -> Self {
        Self { grace_days }
    }

    /// Compare `now` to the stored watermark, advancing it only forward.
    ///
    /// The caller is responsible for persisting the mutated record.
    pub fn check_clock(&self, record: &mut LicenseRecord, now: DateTime<Utc>) -> ClockCheck {
        match record.metadata.last_known_date {
            None => {
                record.metadata.last_known_date = Some(now);
                ClockCheck::Clean
            }
            Some(watermark) if now < watermark => {
                let details = ManipulationDetails {
                    detected_at: now,
                    watermark,
                    rollback_days: (watermark - now).num_days(),
                };
                warn!(
                    rollback_days = details.rollback_days,
                    watermark = %watermark,
                    observed = %now,
                    "System clock moved backward"
                );
                record.metadata.manipulation = Some(details.clone());
                ClockCheck::Manipulated(details)
            }
            Some(_) => {
                record.metadata.last_known_date = Some(now);
                record.metadata.manipulation = None;
                ClockCheck::Clean
            }
        }
    }

    /// Full usability decision for the current record.
    ///
    /// On detected manipulation the record is forced to suspended locally,
    /// independent of the authority. The caller persists the mutation.
    pub fn evaluate(&self, record: &mut LicenseRecord, now: DateTime<Utc>) -> ExpirationStatus {
        if let ClockCheck::Manipulated(details) = self.check_clock(record, now) {
            if !record.is_suspended() {
                record.suspend(TAMPER_SUSPENSION_REASON);
            } else {
                record.metadata.suspension_reason = Some(TAMPER_SUSPENSION_REASON.to_string());
            }
            return ExpirationStatus::DateManipulation {
                rollback_days: details.rollback_days,
            };
        }

        let expires_at = match record.expires_at {
            None => {
                return ExpirationStatus::Valid {
                    days_remaining: None,
                };
            }
            Some(expiry) => expiry,
        };

        if now > expires_at {
            return ExpirationStatus::Expired {
                days_overdue: (now - expires_at).num_days(),
            };
        }

        // Offline grace: a license that has not managed to reach the
        // authority within the threshold is treated as expired even though
        // its expiry date has not passed.
        let last_contact = record
            .last_heartbeat
            .or(record.last_validated)
            .unwrap_or(record.activated_at);
        let days_since_contact = (now - last_contact).num_days();
        if days_since_contact > self.grace_days {
            return ExpirationStatus::OfflineGraceExceeded { days_since_contact };
        }

        ExpirationStatus::Valid {
            days_remaining: Some((expires_at - now).num_days()),
        }
    }
}
