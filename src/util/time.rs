use chrono::{DateTime, Duration, Utc};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Signed number of hours from `earlier` to `later`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn hours_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> f64 {
    (later - earlier).num_milliseconds() as f64 / MILLIS_PER_HOUR
}

/// Start of a trailing window ending at `now`.
///
/// Saturates at the earliest representable time instead of overflowing.
#[must_use]
pub fn cutoff_hours(now: DateTime<Utc>, hours: u32) -> DateTime<Utc> {
    saturating_sub(now, Duration::hours(i64::from(hours)))
}

#[must_use]
pub fn cutoff_days(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    saturating_sub(now, Duration::days(i64::from(days)))
}

fn saturating_sub(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC)
}
