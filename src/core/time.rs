//! Shared timestamp helpers. All persisted times are unix-epoch seconds.

use chrono::{DateTime, NaiveDate, Utc};
use ulid::Ulid;

pub const SECS_PER_DAY: i64 = 86_400;

/// Current unix-epoch seconds.
pub fn now_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Returns unix-epoch seconds with `Z` suffix (e.g. `1771220592Z`).
pub fn now_epoch_z() -> String {
    format!("{}Z", now_secs())
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// Start of the UTC day containing `ts`.
pub fn day_start(ts: i64) -> i64 {
    ts - ts.rem_euclid(SECS_PER_DAY)
}

/// Civil date (`YYYY-MM-DD`) for a unix timestamp, UTC.
pub fn format_date(ts: i64) -> String {
    utc(ts).format("%Y-%m-%d").to_string()
}

/// `YYYY-MM-DD HH:MM` UTC.
pub fn format_datetime(ts: i64) -> String {
    utc(ts).format("%Y-%m-%d %H:%M").to_string()
}

/// Parse `YYYY-MM-DD` to the unix timestamp of that day's UTC midnight.
pub fn parse_date(input: &str) -> Option<i64> {
    let date = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp())
}

// Out-of-range timestamps render as the epoch.
fn utc(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}
