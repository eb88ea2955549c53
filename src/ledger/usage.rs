//! Per-identity daily / monthly usage quota
//!
//! Charging is a two-step protocol. [`UsageLedger::check`] runs before the
//! external call and hands out a [`QuotaPermit`]. The permit can only be
//! redeemed with a [`Narrative`], which exists only after a successful
//! generation. A failed call therefore never consumes quota.

use super::store::{normalize_email, PeriodType, Store, StoreError};
use crate::clock;
use crate::narrative::Narrative;
use chrono::{DateTime, FixedOffset};
use log::{debug, warn};
use serde::Serialize;

pub const DAILY_LIMIT: u32 = 5;
pub const MONTHLY_LIMIT: u32 = 100;

/// Call limits per identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaLimits {
    pub daily: u32,
    pub monthly: u32,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            daily: DAILY_LIMIT,
            monthly: MONTHLY_LIMIT,
        }
    }
}

/// Snapshot of an identity's usage in the current periods
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageStatus {
    pub daily: u32,
    pub monthly: u32,
    pub daily_limit: u32,
    pub monthly_limit: u32,
    pub daily_left: u32,
    pub monthly_left: u32,
    pub allowed: bool,
}

impl UsageStatus {
    fn new(daily: u32, monthly: u32, limits: QuotaLimits) -> Self {
        Self {
            daily,
            monthly,
            daily_limit: limits.daily,
            monthly_limit: limits.monthly,
            daily_left: limits.daily.saturating_sub(daily),
            monthly_left: limits.monthly.saturating_sub(monthly),
            allowed: daily < limits.daily && monthly < limits.monthly,
        }
    }
}

/// Quota exhausted; an expected stop, not a fault
#[derive(Debug, Clone, thiserror::Error)]
#[error("usage limit reached: {} left today, {} left this month", .0.daily_left, .0.monthly_left)]
pub struct QuotaExceeded(pub UsageStatus);

/// Proof that the quota check passed; redeem after a successful call
#[derive(Debug)]
#[must_use = "a permit must be charged once the narrative succeeds"]
pub struct QuotaPermit {
    email: String,
    exempt: bool,
}

impl QuotaPermit {
    pub fn is_exempt(&self) -> bool {
        self.exempt
    }

    /// Record one call against both periods. Exempt permits charge nothing.
    pub fn charge(self, ledger: &UsageLedger, proof: &Narrative) -> Result<(), StoreError> {
        self.charge_at(ledger, proof, &clock::now_local())
    }

    pub fn charge_at(
        self,
        ledger: &UsageLedger,
        _proof: &Narrative,
        now: &DateTime<FixedOffset>,
    ) -> Result<(), StoreError> {
        if self.exempt {
            debug!("usage charge skipped for exempt identity {}", self.email);
            return Ok(());
        }
        ledger.increment_at(&self.email, now)
    }
}

/// Usage counters backed by the store
#[derive(Clone)]
pub struct UsageLedger {
    store: Store,
    limits: QuotaLimits,
}

impl UsageLedger {
    pub fn new(store: Store) -> Self {
        Self::with_limits(store, QuotaLimits::default())
    }

    pub fn with_limits(store: Store, limits: QuotaLimits) -> Self {
        Self { store, limits }
    }

    pub fn limits(&self) -> QuotaLimits {
        self.limits
    }

    pub fn status(&self, email: &str) -> UsageStatus {
        self.status_at(email, &clock::now_local())
    }

    /// Read failures count as zero usage
    pub fn status_at(&self, email: &str, now: &DateTime<FixedOffset>) -> UsageStatus {
        let email = normalize_email(email);
        let (daily_key, monthly_key) = clock::period_keys(now);

        let read = |period: PeriodType, key: &str| {
            self.store.usage_get(&email, period, key).unwrap_or_else(|e| {
                warn!("usage read failed for {} ({}): {}", email, period.as_str(), e);
                0
            })
        };

        let daily = read(PeriodType::Daily, &daily_key);
        let monthly = read(PeriodType::Monthly, &monthly_key);
        UsageStatus::new(daily, monthly, self.limits)
    }

    pub fn check(&self, email: &str, exempt: bool) -> Result<QuotaPermit, QuotaExceeded> {
        self.check_at(email, exempt, &clock::now_local())
    }

    /// Step one: verify both quotas before any external call
    pub fn check_at(
        &self,
        email: &str,
        exempt: bool,
        now: &DateTime<FixedOffset>,
    ) -> Result<QuotaPermit, QuotaExceeded> {
        let email = normalize_email(email);
        if !exempt {
            let status = self.status_at(&email, now);
            if !status.allowed {
                return Err(QuotaExceeded(status));
            }
        }
        Ok(QuotaPermit { email, exempt })
    }

    /// Increment both periods. Each bucket update is one statement, so
    /// concurrent charges are never lost; the check itself can still be
    /// passed by two sessions at the last free slot.
    pub(crate) fn increment_at(&self, email: &str, now: &DateTime<FixedOffset>) -> Result<(), StoreError> {
        let (daily_key, monthly_key) = clock::period_keys(now);

        for (period, key) in [(PeriodType::Daily, daily_key), (PeriodType::Monthly, monthly_key)] {
            self.store.usage_increment(email, period, &key)?;
        }
        Ok(())
    }
}
