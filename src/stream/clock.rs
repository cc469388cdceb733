//! Event-Time Clock
//!
//! Epoch-millisecond event time and the watermark that drives window firing.
//! Nothing in the stream core reads system time; the only clock is the
//! watermark, computed from observed event timestamps and passed explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds since Unix epoch (1970-01-01 00:00:00 UTC).
pub type Millis = i64;

/// Conversion constants
pub const MILLIS_PER_SEC: i64 = 1_000;

/// Convert a whole number of seconds to milliseconds, saturating.
#[inline]
pub fn secs_to_millis(secs: u64) -> Millis {
    i64::try_from(secs)
        .unwrap_or(i64::MAX)
        .saturating_mul(MILLIS_PER_SEC)
}

/// Event-time watermark: a monotonic lower bound on event-time progress.
///
/// # Monotonicity Contract
/// - `Watermark::MIN` before any event has been observed
/// - `advance_to()` never moves backward; older values are ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Watermark(pub Millis);

impl Watermark {
    /// Initial watermark; no window can fire against it.
    pub const MIN: Watermark = Watermark(Millis::MIN);

    /// End-of-input watermark; every window fires and closes against it.
    pub const MAX: Watermark = Watermark(Millis::MAX);

    #[inline]
    pub const fn new(ms: Millis) -> Self {
        Self(ms)
    }

    #[inline]
    pub const fn as_millis(self) -> Millis {
        self.0
    }

    /// True once event time has progressed to or past `t`.
    #[inline]
    pub fn has_passed(self, t: Millis) -> bool {
        self.0 >= t
    }

    /// Move forward to `candidate` if it is ahead. Returns whether it moved.
    #[inline]
    pub fn advance_to(&mut self, candidate: Watermark) -> bool {
        if candidate > *self {
            *self = candidate;
            true
        } else {
            false
        }
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self::MIN
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Watermark::MIN => write!(f, "-inf"),
            Watermark::MAX => write!(f, "+inf"),
            Watermark(ms) => write!(f, "{}", format_millis(ms)),
        }
    }
}

/// Helper to convert chrono DateTime to Millis.
#[inline]
pub fn datetime_to_millis(dt: &chrono::DateTime<chrono::Utc>) -> Millis {
    dt.timestamp_millis()
}

/// Helper to convert Millis to chrono DateTime. `None` when out of chrono's range.
#[inline]
pub fn millis_to_datetime(ms: Millis) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::from_timestamp_millis(ms)
}

/// Render epoch millis as RFC 3339, falling back to the raw number.
pub fn format_millis(ms: Millis) -> String {
    match millis_to_datetime(ms) {
        Some(dt) => dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        None => format!("{}ms", ms),
    }
}

/// Parse an event timestamp.
///
/// Accepts RFC 3339 (`2022-07-01T12:00:00Z`) and naive ISO-8601 with optional
/// fractional seconds (`2022-07-01T12:00:00.123456`), which is taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<Millis> {
    let s = s.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    None
}
