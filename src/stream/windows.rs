//! Tumbling Window Semantics
//!
//! Single source of truth for window boundary computation. Windows are
//! fixed-size, non-overlapping and aligned to the Unix epoch.
//!
//! # Canonical Rule
//!
//! For any event time `t` (epoch milliseconds) and window size `W`:
//! - `window_index = floor_div(t, W)`
//! - `window_start = window_index * W`
//! - `window_end = window_start + W`
//!
//! The window is **half-open**: `[window_start, window_end)`.
//! - Events with `event_time == window_start` belong to this window.
//! - Events with `event_time == window_end` belong to the NEXT window.
//!
//! Floor division (`div_euclid`) keeps the rule valid for pre-epoch times.

use crate::stream::clock::{format_millis, Millis, Watermark};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured representation of window boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WindowBounds {
    /// Start of the window (inclusive).
    pub start: Millis,
    /// End of the window (exclusive).
    pub end: Millis,
}

impl WindowBounds {
    /// Check if a timestamp is within this window (half-open: [start, end)).
    #[inline]
    pub fn contains(&self, t: Millis) -> bool {
        t >= self.start && t < self.end
    }

    #[inline]
    pub fn duration(&self) -> Millis {
        self.end - self.start
    }

    /// Time after which the window is discarded: `end + allowed_lateness`.
    #[inline]
    pub fn cleanup_time(&self, allowed_lateness: Millis) -> Millis {
        self.end.saturating_add(allowed_lateness)
    }

    /// The window's on-time result is final once the watermark reaches `end`.
    #[inline]
    pub fn is_complete(&self, watermark: Watermark) -> bool {
        watermark.has_passed(self.end)
    }

    /// Past allowed lateness: no further contact is accepted for this window.
    #[inline]
    pub fn is_expired(&self, watermark: Watermark, allowed_lateness: Millis) -> bool {
        watermark.has_passed(self.cleanup_time(allowed_lateness))
    }
}

impl fmt::Display for WindowBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", format_millis(self.start), format_millis(self.end))
    }
}

/// Assigns event times to epoch-aligned tumbling windows of one size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TumblingWindows {
    size: Millis,
}

impl TumblingWindows {
    /// # Panics
    ///
    /// Panics if `size <= 0`. Configuration validation rejects a zero size
    /// before any window assigner is built.
    pub fn new(size: Millis) -> Self {
        assert!(size > 0, "TumblingWindows: size must be positive, got {}", size);
        Self { size }
    }

    #[inline]
    pub fn size(&self) -> Millis {
        self.size
    }

    /// Zero-based window index; window 0 covers `[0, W)`.
    #[inline]
    pub fn index(&self, t: Millis) -> i64 {
        t.div_euclid(self.size)
    }

    /// Compute the boundaries of the window containing `t`.
    #[inline]
    pub fn assign(&self, t: Millis) -> WindowBounds {
        let start = self.index(t).saturating_mul(self.size);
        WindowBounds {
            start,
            end: start.saturating_add(self.size),
        }
    }

    /// Check if two timestamps belong to different windows.
    #[inline]
    pub fn is_different_window(&self, t1: Millis, t2: Millis) -> bool {
        self.index(t1) != self.index(t2)
    }
}
