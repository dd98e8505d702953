// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Grades, grade ranges, fade classification, and the per-tick context.
//!
//! A [`Grade`] is a discretized quality level: the higher the grade, the more
//! content a tick repaints. Every node of a [`SchedTree`](crate::tree::SchedTree)
//! owns a [`GradeRange`], and each tick carries a [`RunTime`] whose `current`
//! and `future` grades are classified against that range into a [`FadeKind`].
//!
//! ```text
//!                 low            high
//!   grade axis ----[==============]---->
//!   cur  fut
//!    x    x                               NoFade
//!    x         x                          FadeInLow
//!              x    x                     Sustain
//!                   x               x     FadeOutHigh
//! ```

use core::fmt;

use crate::time::{Duration, HostTime};

/// A discretized quality level.
pub type Grade = i32;

/// An inclusive `[low, high]` span of grades.
///
/// [`GradeRange::UNSET`] (`[-1, -1]`) marks a node that has nothing to
/// schedule yet, such as an empty multi-child node. Code doing arithmetic on a
/// range must check [`is_unset`](Self::is_unset) first.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GradeRange {
    /// Lowest grade, inclusive.
    pub low: Grade,
    /// Highest grade, inclusive.
    pub high: Grade,
}

impl GradeRange {
    /// The "no range" sentinel.
    pub const UNSET: Self = Self { low: -1, high: -1 };

    /// Creates a range. Reversed bounds are swapped.
    #[must_use]
    pub const fn new(low: Grade, high: Grade) -> Self {
        if low <= high {
            Self { low, high }
        } else {
            Self {
                low: high,
                high: low,
            }
        }
    }

    /// Creates a single-grade range.
    #[must_use]
    pub const fn single(grade: Grade) -> Self {
        Self {
            low: grade,
            high: grade,
        }
    }

    /// Returns whether this is the unset sentinel.
    #[must_use]
    pub const fn is_unset(self) -> bool {
        self.low < 0 && self.high < 0
    }

    /// Returns whether `grade` lies within the range. Always false when unset.
    #[must_use]
    pub const fn contains(self, grade: Grade) -> bool {
        !self.is_unset() && grade >= self.low && grade <= self.high
    }

    /// Number of grades covered, zero when unset.
    #[must_use]
    pub const fn span(self) -> i32 {
        if self.is_unset() {
            0
        } else {
            self.high - self.low + 1
        }
    }

    /// Smallest range covering both, ignoring unset operands.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        match (self.is_unset(), other.is_unset()) {
            (true, _) => other,
            (_, true) => self,
            _ => Self {
                low: self.low.min(other.low),
                high: self.high.max(other.high),
            },
        }
    }

    /// Clamps `grade` into the range. Returns `grade` unchanged when unset.
    #[must_use]
    pub fn clamp(self, grade: Grade) -> Grade {
        if self.is_unset() {
            grade
        } else {
            grade.clamp(self.low, self.high)
        }
    }
}

impl Default for GradeRange {
    fn default() -> Self {
        Self::UNSET
    }
}

impl fmt::Debug for GradeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unset() {
            f.write_str("GradeRange(unset)")
        } else {
            write!(f, "GradeRange[{}, {}]", self.low, self.high)
        }
    }
}

/// How a tick's `(current, future)` pair relates to one node's range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FadeKind {
    /// Neither grade touches the range; the node sits this tick out.
    NoFade,
    /// Both grades lie inside the range.
    Sustain,
    /// Entering the range from below.
    FadeInLow,
    /// Entering the range from above.
    FadeInHigh,
    /// Leaving the range downwards.
    FadeOutLow,
    /// Leaving the range upwards.
    FadeOutHigh,
}

impl FadeKind {
    /// Classifies `(current, future)` against `range`.
    ///
    /// A pair that jumps clean across the range (one grade below, the other
    /// above) is `NoFade`: the node is never live during that tick.
    #[must_use]
    pub const fn classify(current: Grade, future: Grade, range: GradeRange) -> Self {
        if range.is_unset() {
            return Self::NoFade;
        }
        match (range.contains(current), range.contains(future)) {
            (true, true) => Self::Sustain,
            (false, true) => {
                if current < range.low {
                    Self::FadeInLow
                } else {
                    Self::FadeInHigh
                }
            }
            (true, false) => {
                if future < range.low {
                    Self::FadeOutLow
                } else {
                    Self::FadeOutHigh
                }
            }
            (false, false) => Self::NoFade,
        }
    }

    /// Whether the node participates in this tick at all.
    #[must_use]
    pub const fn is_live(self) -> bool {
        !matches!(self, Self::NoFade)
    }

    /// Whether the node's content should be on screen after this tick.
    #[must_use]
    pub const fn shows(self) -> bool {
        matches!(self, Self::Sustain | Self::FadeInLow | Self::FadeInHigh)
    }

    /// Whether the node is being faded out this tick.
    #[must_use]
    pub const fn is_fade_out(self) -> bool {
        matches!(self, Self::FadeOutLow | Self::FadeOutHigh)
    }
}

/// Identifies one interactive session (one gesture).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SessionId(pub u32);

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

/// Per-tick context handed down one traversal of the scheduling tree.
///
/// Every node below the firing leaf sees the same snapshot. Grade-sharing
/// strategies that rescale grades derive a new value with
/// [`with_grades`](Self::with_grades) rather than mutating the one they got.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RunTime {
    /// Committed grade.
    pub current: Grade,
    /// Grade being faded toward; may be below, equal to, or above `current`.
    pub future: Grade,
    /// The session this tick belongs to.
    pub session: SessionId,
    /// Period of the leaf that fired.
    pub period: Duration,
    /// Logical session time of the tick (paused time excluded).
    pub timestamp: HostTime,
}

impl RunTime {
    /// Returns a copy with different grades.
    #[must_use]
    pub const fn with_grades(&self, current: Grade, future: Grade) -> Self {
        Self {
            current,
            future,
            session: self.session,
            period: self.period,
            timestamp: self.timestamp,
        }
    }

    /// Classifies this tick against `range`.
    #[must_use]
    pub const fn fade(&self, range: GradeRange) -> FadeKind {
        FadeKind::classify(self.current, self.future, range)
    }
}
