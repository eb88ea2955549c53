//! Persistence: users, usage counters and audit trail

pub mod audit;
mod store;
mod usage;

pub use audit::AuditTrail;
pub use store::{normalize_email, AuditEvent, PeriodType, Store, StoreError, User};
pub use usage::{
    QuotaExceeded, QuotaLimits, QuotaPermit, UsageLedger, UsageStatus, DAILY_LIMIT, MONTHLY_LIMIT,
};
