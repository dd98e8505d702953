// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One-shot timer contract and per-session timer bookkeeping.
//!
//! The host supplies a [`Dispatcher`]: a monotonic microsecond clock plus
//! one-shot timers. Instead of closures, every timer carries a
//! [`TimerToken`]; when it expires the host hands the token back to
//! [`PaceMaker::fire`](crate::driver::PaceMaker::fire), which routes it to the
//! leaf or to the evaluation tick.
//!
//! [`TimerSlots`] remembers which leaves are started and which timers are
//! pending, so that stopping is idempotent and a stopped leaf can never be
//! re-armed by a tick that was already in flight.

use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;

use crate::time::{Duration, HostTime};
use crate::tree::NodeId;

/// What a timer is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerToken {
    /// Next tick of a periodic leaf.
    Leaf(NodeId),
    /// The driver's re-evaluation tick.
    Evaluate,
}

/// Handle of a pending timer, assigned by the dispatcher.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimerHandle({})", self.0)
    }
}

/// Host timer facility: a monotonic clock and one-shot timers.
///
/// Timers have microsecond resolution; a zero delay fires as soon as the host
/// loop gets control back. Platform APIs taking `(sec, usec)` pairs can use
/// [`Duration::as_secs_micros`].
pub trait Dispatcher {
    /// Current time on the dispatcher's monotonic clock.
    fn now(&self) -> HostTime;

    /// Starts a one-shot timer that fires after `delay` with `token`.
    fn start_timer(&mut self, delay: Duration, token: TimerToken) -> TimerHandle;

    /// Cancels a pending timer. Cancelling an expired or unknown handle is a
    /// no-op.
    fn stop_timer(&mut self, handle: TimerHandle);
}

/// Timer bookkeeping for one driver.
#[derive(Debug, Default)]
pub struct TimerSlots {
    started: Vec<NodeId>,
    armed: HashMap<NodeId, TimerHandle>,
    eval: Option<TimerHandle>,
    /// Delay the evaluation tick was last armed with.
    eval_delay: Option<Duration>,
    paused: bool,
}

impl TimerSlots {
    /// Creates empty bookkeeping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Leaves currently started, in start order.
    #[must_use]
    pub fn started(&self) -> &[NodeId] {
        &self.started
    }

    /// Returns whether `leaf` is started.
    #[must_use]
    pub fn is_started(&self, leaf: NodeId) -> bool {
        self.started.contains(&leaf)
    }

    /// Returns whether `leaf` has a pending timer.
    #[must_use]
    pub fn is_armed(&self, leaf: NodeId) -> bool {
        self.armed.contains_key(&leaf)
    }

    /// Number of pending leaf timers.
    #[must_use]
    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }

    /// Returns whether the evaluation timer is pending.
    #[must_use]
    pub fn eval_armed(&self) -> bool {
        self.eval.is_some()
    }

    /// Delay the evaluation tick was last armed with, kept across pauses.
    #[must_use]
    pub fn eval_delay(&self) -> Option<Duration> {
        self.eval_delay
    }

    /// Returns whether timers are suspended.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub(crate) fn mark_started(&mut self, leaf: NodeId) -> bool {
        if self.is_started(leaf) {
            false
        } else {
            self.started.push(leaf);
            true
        }
    }

    pub(crate) fn mark_stopped(&mut self, leaf: NodeId) -> bool {
        let before = self.started.len();
        self.started.retain(|l| *l != leaf);
        before != self.started.len()
    }

    pub(crate) fn clear_started(&mut self) {
        self.started.clear();
        self.eval_delay = None;
    }

    pub(crate) fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Forgets the timer of `leaf` after it fired.
    pub(crate) fn expired(&mut self, leaf: NodeId) {
        self.armed.remove(&leaf);
    }

    /// Forgets the evaluation timer after it fired.
    pub(crate) fn eval_expired(&mut self) {
        self.eval = None;
    }
}

/// A dispatcher paired with the slots it arms, borrowed for one callback.
pub struct Arming<'a> {
    dispatcher: &'a mut dyn Dispatcher,
    slots: &'a mut TimerSlots,
}

impl fmt::Debug for Arming<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arming")
            .field("slots", &self.slots)
            .finish_non_exhaustive()
    }
}

impl<'a> Arming<'a> {
    /// Pairs a dispatcher with timer bookkeeping.
    pub fn new(dispatcher: &'a mut dyn Dispatcher, slots: &'a mut TimerSlots) -> Self {
        Self { dispatcher, slots }
    }

    /// Reborrows for a shorter scope.
    pub fn reborrow(&mut self) -> Arming<'_> {
        Arming {
            dispatcher: &mut *self.dispatcher,
            slots: &mut *self.slots,
        }
    }

    /// Current dispatcher time.
    #[must_use]
    pub fn now(&self) -> HostTime {
        self.dispatcher.now()
    }

    /// The bookkeeping being armed.
    #[must_use]
    pub fn slots(&self) -> &TimerSlots {
        self.slots
    }

    /// Arms the next tick of `leaf` after `delay`, replacing any pending one.
    ///
    /// Does nothing for leaves that are not started or while paused. Returns
    /// whether a timer was armed.
    pub fn continue_leaf(&mut self, leaf: NodeId, delay: Duration) -> bool {
        if self.slots.paused || !self.slots.is_started(leaf) {
            return false;
        }
        self.cancel_leaf(leaf);
        let handle = self.dispatcher.start_timer(delay, TimerToken::Leaf(leaf));
        self.slots.armed.insert(leaf, handle);
        true
    }

    /// Cancels the pending tick of `leaf`, if any.
    pub fn cancel_leaf(&mut self, leaf: NodeId) {
        if let Some(handle) = self.slots.armed.remove(&leaf) {
            self.dispatcher.stop_timer(handle);
        }
    }

    /// Arms every started leaf that has no pending tick to fire as soon as
    /// possible. Leaves that went dormant (their range fell out of the
    /// grades being played) come back this way after a grade change.
    pub fn wake(&mut self) {
        if self.slots.paused {
            return;
        }
        let idle: Vec<NodeId> = self
            .slots
            .started
            .iter()
            .copied()
            .filter(|leaf| !self.slots.armed.contains_key(leaf))
            .collect();
        for leaf in idle {
            let handle = self.dispatcher.start_timer(Duration::ZERO, TimerToken::Leaf(leaf));
            self.slots.armed.insert(leaf, handle);
        }
    }

    /// Re-arms the evaluation tick after `delay`.
    pub fn reevaluate(&mut self, delay: Duration) -> bool {
        if self.slots.paused {
            return false;
        }
        self.cancel_eval();
        self.slots.eval = Some(self.dispatcher.start_timer(delay, TimerToken::Evaluate));
        self.slots.eval_delay = Some(delay);
        true
    }

    /// Cancels the evaluation tick, if pending.
    pub fn cancel_eval(&mut self) {
        if let Some(handle) = self.slots.eval.take() {
            self.dispatcher.stop_timer(handle);
        }
    }

    /// Cancels every pending timer, leaf and evaluation alike.
    pub fn cancel_all(&mut self) {
        for (_, handle) in self.slots.armed.drain() {
            self.dispatcher.stop_timer(handle);
        }
        self.cancel_eval();
    }
}
