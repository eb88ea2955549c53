//! Business-calendar time (UTC+9) and quota period keys

use chrono::{DateTime, Datelike, FixedOffset, Offset, Utc};

/// Offset of the business calendar from UTC, in hours
pub const BUSINESS_UTC_OFFSET_HOURS: i32 = 9;

fn business_offset() -> FixedOffset {
    // 9 hours is always within the valid ±24h range
    FixedOffset::east_opt(BUSINESS_UTC_OFFSET_HOURS * 3600).unwrap_or_else(|| Utc.fix())
}

/// Current time on the business calendar
pub fn now_local() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&business_offset())
}

/// Convert any UTC instant to the business calendar
pub fn to_local(instant: DateTime<Utc>) -> DateTime<FixedOffset> {
    instant.with_timezone(&business_offset())
}

/// Daily (`%Y-%m-%d`) and monthly (`%Y-%m`) quota keys for `now`
pub fn period_keys(now: &DateTime<FixedOffset>) -> (String, String) {
    (
        now.format("%Y-%m-%d").to_string(),
        now.format("%Y-%m").to_string(),
    )
}

/// Calendar year of `now`
pub fn current_year(now: &DateTime<FixedOffset>) -> i32 {
    now.year()
}
