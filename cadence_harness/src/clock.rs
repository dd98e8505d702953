// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Virtual time and a hand-driven timer queue.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::Cell;

use cadence_core::time::{Duration, HostTime};
use cadence_core::timer::{Dispatcher, TimerHandle, TimerToken};

/// A shared microsecond clock that only moves when told to.
///
/// Clones observe the same time, so simulated graphics can charge their draw
/// cost to the clock the dispatcher reads.
#[derive(Clone, Debug, Default)]
pub struct VirtualClock(Rc<Cell<u64>>);

impl VirtualClock {
    /// Creates a clock at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time.
    #[must_use]
    pub fn now(&self) -> HostTime {
        HostTime(self.0.get())
    }

    /// Moves the clock forward by `d`.
    pub fn advance(&self, d: Duration) {
        self.0.set(self.0.get().saturating_add(d.micros()));
    }

    /// Moves the clock forward to `t`. Earlier times are ignored.
    pub fn advance_to(&self, t: HostTime) {
        if t.micros() > self.0.get() {
            self.0.set(t.micros());
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Pending {
    handle: TimerHandle,
    due: HostTime,
    token: TimerToken,
}

/// A [`Dispatcher`] over a [`VirtualClock`] whose timers fire only when the
/// host pops them.
#[derive(Debug)]
pub struct ManualDispatcher {
    clock: VirtualClock,
    next: u64,
    pending: Vec<Pending>,
    /// Fixed lateness added to every timer.
    latency: Duration,
}

impl ManualDispatcher {
    /// Creates a dispatcher reading `clock`.
    #[must_use]
    pub fn new(clock: VirtualClock) -> Self {
        Self {
            clock,
            next: 0,
            pending: Vec::new(),
            latency: Duration::ZERO,
        }
    }

    /// Delays every timer armed from now on by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// The clock this dispatcher reads.
    #[must_use]
    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    /// Number of armed timers.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Due time of the timer armed for `token`, if any.
    #[must_use]
    pub fn due_of(&self, token: TimerToken) -> Option<HostTime> {
        self.pending
            .iter()
            .find(|p| p.token == token)
            .map(|p| p.due)
    }

    /// Earliest due time among armed timers.
    #[must_use]
    pub fn next_due(&self) -> Option<HostTime> {
        self.pending.iter().map(|p| p.due).min()
    }

    /// Removes and returns the earliest timer due at or before `horizon`.
    /// Timers due at the same time fire in the order they were armed.
    pub fn pop_due(&mut self, horizon: HostTime) -> Option<(TimerToken, HostTime)> {
        let pos = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due <= horizon)
            .min_by_key(|(_, p)| (p.due, p.handle.0))
            .map(|(i, _)| i)?;
        let p = self.pending.remove(pos);
        Some((p.token, p.due))
    }
}

impl Dispatcher for ManualDispatcher {
    fn now(&self) -> HostTime {
        self.clock.now()
    }

    fn start_timer(&mut self, delay: Duration, token: TimerToken) -> TimerHandle {
        self.next += 1;
        let handle = TimerHandle(self.next);
        let due = self.clock.now() + delay + self.latency;
        self.pending.push(Pending { handle, due, token });
        handle
    }

    fn stop_timer(&mut self, handle: TimerHandle) {
        self.pending.retain(|p| p.handle != handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn clones_share_time() {
        let a = VirtualClock::new();
        let b = a.clone();
        a.advance(ms(3));
        assert_eq!(b.now(), HostTime(3_000));
        b.advance_to(HostTime(1_000));
        assert_eq!(a.now(), HostTime(3_000));
    }

    #[test]
    fn pops_in_due_then_arming_order() {
        let clock = VirtualClock::new();
        let mut d = ManualDispatcher::new(clock.clone());
        d.start_timer(ms(10), TimerToken::Evaluate);
        let late = d.start_timer(ms(20), TimerToken::Evaluate);
        clock.advance(ms(5));
        d.start_timer(ms(5), TimerToken::Evaluate);

        assert_eq!(d.next_due(), Some(HostTime(10_000)));
        assert_eq!(d.pop_due(HostTime(9_000)), None);
        assert_eq!(
            d.pop_due(HostTime(30_000)),
            Some((TimerToken::Evaluate, HostTime(10_000)))
        );
        assert_eq!(d.pending(), 2);
        d.stop_timer(late);
        assert_eq!(
            d.pop_due(HostTime(30_000)),
            Some((TimerToken::Evaluate, HostTime(10_000)))
        );
        assert_eq!(d.pending(), 0);
    }

    #[test]
    fn latency_delays_every_timer() {
        let mut d = ManualDispatcher::new(VirtualClock::new()).with_latency(ms(2));
        d.start_timer(Duration::ZERO, TimerToken::Evaluate);
        assert_eq!(d.due_of(TimerToken::Evaluate), Some(HostTime(2_000)));
    }
}
