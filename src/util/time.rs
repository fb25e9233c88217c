use chrono::{DateTime, Utc};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Elapsed days between a pull request being opened and being closed.
///
/// A close timestamp earlier than the open timestamp (clock skew on imported
/// data) counts as zero rather than a negative cycle.
pub fn cycle_days(created_at: &DateTime<Utc>, closed_at: &DateTime<Utc>) -> f64 {
    let seconds = closed_at.signed_duration_since(created_at).num_seconds();
    if seconds <= 0 {
        return 0.0;
    }
    seconds as f64 / SECONDS_PER_DAY
}

/// Round to one decimal place, the precision every dashboard figure uses.
pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
