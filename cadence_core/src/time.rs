// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic microsecond time.
//!
//! [`HostTime`] is a point on the dispatcher's monotonic clock and
//! [`Duration`] a span on it, both in microseconds, which is the resolution
//! of the timer facility (see [`Dispatcher`](crate::timer::Dispatcher)).
//!
//! Budgets can go negative (a tick that overran its period), so signed
//! arithmetic is exposed separately via [`Duration::signed_diff`] rather than
//! by making [`Duration`] itself signed.

use core::fmt;
use core::ops::{Add, Sub};

/// A point in time, in microseconds on the dispatcher's monotonic clock.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HostTime(pub u64);

impl HostTime {
    /// Returns the raw microsecond value.
    #[inline]
    #[must_use]
    pub const fn micros(self) -> u64 {
        self.0
    }

    /// Returns the duration between `self` and an earlier time, or zero if
    /// `earlier` is after `self`.
    #[inline]
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }

    /// Checked addition of a duration.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, duration: Duration) -> Option<Self> {
        match self.0.checked_add(duration.0) {
            Some(t) => Some(Self(t)),
            None => None,
        }
    }

    /// Saturating subtraction of a duration.
    #[inline]
    #[must_use]
    pub const fn saturating_sub(self, duration: Duration) -> Self {
        Self(self.0.saturating_sub(duration.0))
    }
}

impl Add<Duration> for HostTime {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for HostTime {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Self) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

impl fmt::Debug for HostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostTime({}us)", self.0)
    }
}

/// A span of time in microseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(pub u64);

impl Duration {
    /// A zero-length duration. As a timer delay it means "as soon as possible".
    pub const ZERO: Self = Self(0);

    /// Creates a duration from microseconds.
    #[inline]
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Creates a duration from milliseconds.
    #[inline]
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * 1_000)
    }

    /// Returns the raw microsecond value.
    #[inline]
    #[must_use]
    pub const fn micros(self) -> u64 {
        self.0
    }

    /// Splits into whole seconds and the remaining microseconds, the shape
    /// most platform timer APIs take.
    #[inline]
    #[must_use]
    pub const fn as_secs_micros(self) -> (u64, u32) {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "remainder of a division by 1e6 always fits in u32"
        )]
        let rem = (self.0 % 1_000_000) as u32;
        (self.0 / 1_000_000, rem)
    }

    /// Returns `self - rhs` as signed microseconds, saturating at the `i64`
    /// bounds.
    #[inline]
    #[must_use]
    pub const fn signed_diff(self, rhs: Self) -> i64 {
        let a = if self.0 > i64::MAX as u64 {
            i64::MAX
        } else {
            self.0 as i64
        };
        let b = if rhs.0 > i64::MAX as u64 {
            i64::MAX
        } else {
            rhs.0 as i64
        };
        a.saturating_sub(b)
    }

    /// Creates a duration from signed microseconds, clamping negatives to
    /// zero.
    #[inline]
    #[must_use]
    pub const fn from_signed(micros: i64) -> Self {
        if micros <= 0 {
            Self::ZERO
        } else {
            Self(micros as u64)
        }
    }

    /// Saturating addition.
    #[inline]
    #[must_use]
    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Saturating subtraction.
    #[inline]
    #[must_use]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Add for Duration {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Duration {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duration({}us)", self.0)
    }
}

/// Session time with paused intervals removed.
///
/// Measured from the session origin. While paused, logical time stands
/// still; after [`resume`](Self::resume) it continues from where it stopped,
/// so pause length never counts against any budget.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogicalClock {
    origin: HostTime,
    paused_at: Option<HostTime>,
    paused_total: Duration,
}

impl LogicalClock {
    /// Restarts the clock at `now`.
    pub fn start(&mut self, now: HostTime) {
        *self = Self {
            origin: now,
            paused_at: None,
            paused_total: Duration::ZERO,
        };
    }

    /// Freezes logical time at `now`. Pausing twice is a no-op.
    pub fn pause(&mut self, now: HostTime) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    /// Lets logical time run again. Resuming when not paused is a no-op.
    pub fn resume(&mut self, now: HostTime) {
        if let Some(at) = self.paused_at.take() {
            self.paused_total = self
                .paused_total
                .saturating_add(now.saturating_duration_since(at));
        }
    }

    /// Returns whether the clock is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Converts dispatcher time into logical session time.
    #[must_use]
    pub fn logical(&self, now: HostTime) -> HostTime {
        let now = self.paused_at.map_or(now, |at| now.min(at));
        let elapsed = now
            .saturating_duration_since(self.origin)
            .saturating_sub(self.paused_total);
        HostTime(elapsed.micros())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secs_micros_split() {
        assert_eq!(Duration(2_500_000).as_secs_micros(), (2, 500_000));
        assert_eq!(Duration(16_000).as_secs_micros(), (0, 16_000));
        assert_eq!(Duration::ZERO.as_secs_micros(), (0, 0));
    }

    #[test]
    fn signed_diff_goes_negative() {
        assert_eq!(Duration(16_000).signed_diff(Duration(20_000)), -4_000);
        assert_eq!(Duration(16_000).signed_diff(Duration(6_000)), 10_000);
        assert_eq!(Duration::from_signed(-4_000), Duration::ZERO);
        assert_eq!(Duration::from_signed(4_000), Duration(4_000));
    }

    #[test]
    fn host_time_duration_ops() {
        let t = HostTime(1000);
        let d = Duration(200);
        assert_eq!((t + d).micros(), 1200);
        assert_eq!(t.saturating_sub(d).micros(), 800);
        assert_eq!(t.saturating_duration_since(HostTime(1500)), Duration::ZERO);
        assert_eq!(t.saturating_duration_since(HostTime(400)), Duration(600));
        assert_eq!(Duration::from_millis(16), Duration(16_000));
    }

    #[test]
    fn logical_clock_skips_pauses() {
        let mut clock = LogicalClock::default();
        clock.start(HostTime(1_000));
        assert_eq!(clock.logical(HostTime(3_000)), HostTime(2_000));
        clock.pause(HostTime(3_000));
        assert_eq!(clock.logical(HostTime(9_000)), HostTime(2_000));
        clock.resume(HostTime(10_000));
        assert_eq!(clock.logical(HostTime(10_500)), HostTime(2_500));
        clock.resume(HostTime(11_000));
        assert_eq!(clock.logical(HostTime(11_000)), HostTime(3_000));
    }
}
