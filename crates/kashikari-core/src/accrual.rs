//! Interest math under the fixed-at-assignment policy.

use chrono::{DateTime, Duration, Utc};

/// A relationship accrues no interest during its first 30 elapsed days.
pub const FIRST_MONTH_GRACE_DAYS: i64 = 30;

/// Monthly interest from the initial principal and a percent rate.
///
/// The base is the principal captured at relationship creation, never the
/// fluctuating outstanding amount. A zero (unset) rate yields zero.
pub fn monthly_interest(initial_principal: f64, rate: f64) -> f64 {
    initial_principal * rate / 100.0
}

/// First-month suppression filter, evaluated at query/announcement time.
///
/// This is a display/aggregation rule only; it never alters a stored
/// interest figure.
pub fn accrues_interest(created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(created_at) >= Duration::days(FIRST_MONTH_GRACE_DAYS)
}
