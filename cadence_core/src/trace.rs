// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the pacing loop.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! driver and the control policies call as a session unfolds. All method
//! bodies default to no-ops, so implementing only the events you care about
//! is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing. When **on**, each
//! method performs a single `Option` branch before dispatching.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).

use crate::grade::{Grade, GradeRange, SessionId};
use crate::keeper::Phase;
use crate::time::{Duration, HostTime};
use crate::timer::TimerToken;
use crate::tree::NodeId;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Whether a session began or ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionEdge {
    /// `start_all` primed the leaves.
    Started,
    /// `stop_all` tore the session down.
    Stopped,
}

/// What happened to a timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerAction {
    /// The timer was armed to fire after the given delay.
    Armed(Duration),
    /// The timer was cancelled before firing.
    Cancelled,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when a gesture session starts or stops.
#[derive(Clone, Copy, Debug)]
pub struct SessionEvent {
    /// Session identifier.
    pub session: SessionId,
    /// Start or stop.
    pub edge: SessionEdge,
    /// Number of periodic leaves driven by the session.
    pub leaves: u32,
    /// Grade range of the root at the time of the edge.
    pub range: GradeRange,
    /// Logical session time.
    pub timestamp: HostTime,
}

/// Emitted after one leaf tick has been played and measured.
#[derive(Clone, Copy, Debug)]
pub struct LeafPlayEvent {
    /// The leaf that fired.
    pub leaf: NodeId,
    /// Session the tick belongs to.
    pub session: SessionId,
    /// Committed grade during the tick.
    pub current: Grade,
    /// Grade faded toward during the tick.
    pub future: Grade,
    /// Logical time the timer fired.
    pub fired_at: HostTime,
    /// Wall-clock cost of the tick.
    pub cost: Duration,
    /// The leaf's period.
    pub period: Duration,
}

impl LeafPlayEvent {
    /// Budget left after the tick in signed microseconds; negative on
    /// overrun.
    #[must_use]
    pub fn budget_left(&self) -> i64 {
        self.period.signed_diff(self.cost)
    }
}

/// Emitted when a control policy moves the shared grade.
#[derive(Clone, Copy, Debug)]
pub struct GradeChangeEvent {
    /// Session identifier.
    pub session: SessionId,
    /// `(current, future)` before the change.
    pub from: (Grade, Grade),
    /// `(current, future)` after the change.
    pub to: (Grade, Grade),
    /// Phase entered.
    pub phase: Phase,
    /// Logical session time.
    pub timestamp: HostTime,
}

/// Emitted when a leaf or evaluation timer is armed or cancelled.
#[derive(Clone, Copy, Debug)]
pub struct TimerEvent {
    /// Which timer.
    pub token: TimerToken,
    /// Armed or cancelled.
    pub action: TimerAction,
    /// Logical session time.
    pub timestamp: HostTime,
}

/// Emitted when a periodic leaf changes its period.
#[derive(Clone, Copy, Debug)]
pub struct PeriodChangeEvent {
    /// The leaf.
    pub leaf: NodeId,
    /// Previous period.
    pub old: Duration,
    /// New period.
    pub new: Duration,
    /// Logical session time.
    pub timestamp: HostTime,
}

/// Emitted when the driver swaps its control policy.
#[derive(Clone, Copy, Debug)]
pub struct PolicyChangeEvent {
    /// Session the swap happened in.
    pub session: SessionId,
    /// Name of the outgoing policy.
    pub old: &'static str,
    /// Name of the incoming policy.
    pub new: &'static str,
    /// Logical session time.
    pub timestamp: HostTime,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the pacing loop.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a session starts or stops.
    fn on_session(&mut self, e: &SessionEvent) {
        _ = e;
    }

    /// Called after each measured leaf tick.
    fn on_leaf_play(&mut self, e: &LeafPlayEvent) {
        _ = e;
    }

    /// Called when the shared grade moves.
    fn on_grade_change(&mut self, e: &GradeChangeEvent) {
        _ = e;
    }

    /// Called when a timer is armed or cancelled.
    fn on_timer(&mut self, e: &TimerEvent) {
        _ = e;
    }

    /// Called when a leaf's period changes.
    fn on_period_change(&mut self, e: &PeriodChangeEvent) {
        _ = e;
    }

    /// Called when the control policy is swapped.
    fn on_policy_change(&mut self, e: &PolicyChangeEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Zero-cost wrapper around an optional trace sink.
///
/// When the `trace` feature is disabled, all methods are no-ops and the
/// `sink` field does not exist.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to `sink`.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer from an optional sink.
    #[inline]
    #[must_use]
    pub fn from_option(sink: Option<&'a mut dyn TraceSink>) -> Self {
        match sink {
            Some(s) => Self::new(s),
            None => Self::none(),
        }
    }

    /// Creates a tracer with no sink.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Reborrows for a shorter scope.
    #[inline]
    pub fn reborrow(&mut self) -> Tracer<'_> {
        #[cfg(feature = "trace")]
        {
            Tracer {
                sink: match &mut self.sink {
                    Some(s) => Some(&mut **s),
                    None => None,
                },
            }
        }
        #[cfg(not(feature = "trace"))]
        {
            Tracer {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Dispatches [`TraceSink::on_session`].
    #[inline]
    pub fn session(&mut self, e: &SessionEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_session(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Dispatches [`TraceSink::on_leaf_play`].
    #[inline]
    pub fn leaf_play(&mut self, e: &LeafPlayEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_leaf_play(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Dispatches [`TraceSink::on_grade_change`].
    #[inline]
    pub fn grade_change(&mut self, e: &GradeChangeEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_grade_change(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Dispatches [`TraceSink::on_timer`].
    #[inline]
    pub fn timer(&mut self, e: &TimerEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_timer(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Dispatches [`TraceSink::on_period_change`].
    #[inline]
    pub fn period_change(&mut self, e: &PeriodChangeEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_period_change(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Dispatches [`TraceSink::on_policy_change`].
    #[inline]
    pub fn policy_change(&mut self, e: &PolicyChangeEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_policy_change(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
