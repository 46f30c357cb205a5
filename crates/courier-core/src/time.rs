//! Wall-clock helpers for envelope timestamps.
//!
//! Envelopes carry their issue time as fractional seconds since the Unix
//! epoch. [`Timestamp`] is that representation; the functions here compute
//! time-to-live deadlines against it.

use chrono::{DateTime, TimeZone, Utc};

/// Seconds since the Unix epoch, with sub-second precision.
pub type Timestamp = f64;

const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Returns the current wall-clock time as a [`Timestamp`].
pub fn now_seconds() -> Timestamp {
    to_seconds(Utc::now())
}

/// Converts a UTC datetime to a [`Timestamp`].
pub fn to_seconds(dt: DateTime<Utc>) -> Timestamp {
    dt.timestamp_micros() as f64 / MICROS_PER_SECOND
}

/// Converts a [`Timestamp`] back to a UTC datetime.
///
/// Returns `None` for values outside chrono's representable range
/// (including NaN and infinities).
pub fn from_seconds(ts: Timestamp) -> Option<DateTime<Utc>> {
    if !ts.is_finite() {
        return None;
    }
    let micros = (ts * MICROS_PER_SECOND).round();
    if micros < i64::MIN as f64 || micros > i64::MAX as f64 {
        return None;
    }
    Utc.timestamp_micros(micros as i64).single()
}

/// Returns the deadline of something issued at `issued_at` that lives for
/// `ttl` seconds, or `None` when it never expires.
pub fn expires_at(issued_at: Timestamp, ttl: Option<f64>) -> Option<Timestamp> {
    ttl.map(|ttl| issued_at + ttl)
}

/// Returns `true` once `now` is strictly past the deadline.
///
/// Without a `ttl` nothing ever expires.
pub fn is_expired(issued_at: Timestamp, ttl: Option<f64>, now: Timestamp) -> bool {
    match expires_at(issued_at, ttl) {
        Some(deadline) => now > deadline,
        None => false,
    }
}
