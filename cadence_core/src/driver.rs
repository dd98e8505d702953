// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The session driver.
//!
//! A [`PaceMaker`] holds the one active [`PaceKeeper`], the host
//! [`Dispatcher`], and the timer bookkeeping of the running gesture. The host
//! owns it as a plain value and routes every expired [`TimerToken`] back to
//! [`fire`](PaceMaker::fire):
//!
//! ```rust,ignore
//! let mut pm = PaceMaker::new(dispatcher, Box::new(DampedKeeper::default()));
//! pm.start_all(&mut stage, root);
//! // host loop
//! while let Some((token, time)) = next_expired_timer() {
//!     pm.fire(&mut stage, token, time);
//! }
//! pm.stop_all(&mut stage);
//! ```
//!
//! Scene access is lent per call through a [`Stage`], so the driver never
//! holds the tree between callbacks.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use crate::grade::{GradeRange, SessionId};
use crate::keeper::{KeeperCx, PaceKeeper};
use crate::pointer::PointerEvent;
use crate::time::{Duration, HostTime, LogicalClock};
use crate::timer::{Arming, Dispatcher, TimerSlots, TimerToken};
use crate::trace::{
    PeriodChangeEvent, PolicyChangeEvent, SessionEdge, SessionEvent, TimerAction, TimerEvent,
    TraceSink, Tracer,
};
use crate::tree::{NodeId, Stage};

/// Driver settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaceMakerConfig {
    /// Fallback delay of the evaluation tick when the policy arms none.
    pub eval_period: Duration,
}

impl PaceMakerConfig {
    /// Re-evaluates at least ten times a second.
    #[must_use]
    pub const fn interactive() -> Self {
        Self {
            eval_period: Duration::from_millis(100),
        }
    }
}

impl Default for PaceMakerConfig {
    fn default() -> Self {
        Self::interactive()
    }
}

/// Drives one interactive session at a time.
pub struct PaceMaker<D> {
    dispatcher: D,
    slots: TimerSlots,
    keeper: Box<dyn PaceKeeper>,
    clock: LogicalClock,
    session: SessionId,
    active: bool,
    root: Option<NodeId>,
    adjusted: Vec<(NodeId, Duration)>,
    sink: Option<Box<dyn TraceSink>>,
    config: PaceMakerConfig,
}

impl<D: fmt::Debug> fmt::Debug for PaceMaker<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaceMaker")
            .field("dispatcher", &self.dispatcher)
            .field("slots", &self.slots)
            .field("keeper", &self.keeper)
            .field("clock", &self.clock)
            .field("session", &self.session)
            .field("active", &self.active)
            .field("root", &self.root)
            .field("adjusted", &self.adjusted)
            .field("sink", &self.sink.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl<D: Dispatcher> PaceMaker<D> {
    /// Creates an idle driver with the default settings.
    pub fn new(dispatcher: D, keeper: Box<dyn PaceKeeper>) -> Self {
        Self::with_config(dispatcher, keeper, PaceMakerConfig::default())
    }

    /// Creates an idle driver.
    pub fn with_config(
        dispatcher: D,
        keeper: Box<dyn PaceKeeper>,
        config: PaceMakerConfig,
    ) -> Self {
        Self {
            dispatcher,
            slots: TimerSlots::new(),
            keeper,
            clock: LogicalClock::default(),
            session: SessionId::default(),
            active: false,
            root: None,
            adjusted: Vec::new(),
            sink: None,
            config,
        }
    }

    // -- Accessors --

    /// The host dispatcher.
    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// Mutable access to the host dispatcher.
    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }

    /// Timer bookkeeping of the running session.
    pub fn slots(&self) -> &TimerSlots {
        &self.slots
    }

    /// Driver settings.
    pub fn config(&self) -> &PaceMakerConfig {
        &self.config
    }

    /// Whether a session is running.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the running session is paused.
    pub fn is_paused(&self) -> bool {
        self.active && self.clock.is_paused()
    }

    /// The most recent session.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Root of the running session.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Logical session time now.
    pub fn now(&self) -> HostTime {
        self.clock.logical(self.dispatcher.now())
    }

    /// The active policy.
    pub fn get_policy(&self) -> &dyn PaceKeeper {
        self.keeper.as_ref()
    }

    /// Installs a trace sink and returns the previous one.
    pub fn set_trace_sink(
        &mut self,
        sink: Option<Box<dyn TraceSink>>,
    ) -> Option<Box<dyn TraceSink>> {
        core::mem::replace(&mut self.sink, sink)
    }

    // -- Session --

    /// Starts a session over every periodic leaf under `root` and returns how
    /// many leaves were started. A running session is stopped first.
    ///
    /// The subtree is regraded here, so structural edits made since the last
    /// session are picked up.
    pub fn start_all(&mut self, stage: &mut Stage<'_>, root: NodeId) -> usize {
        if self.active {
            self.stop_all(stage);
        }
        let range = stage.tree.regrade(root);
        let mut leaves = Vec::new();
        stage.tree.collect_schedulers(root, &mut leaves);

        self.session = SessionId(self.session.0.wrapping_add(1));
        self.clock.start(self.dispatcher.now());
        self.slots.set_paused(false);
        for &leaf in &leaves {
            self.slots.mark_started(leaf);
        }
        self.active = true;
        self.root = Some(root);
        self.trace_session(SessionEdge::Started, range);

        self.dispatch(stage, |keeper, cx| keeper.start_all(range, cx));
        self.ensure_eval();
        self.flush_adjusted(stage);
        leaves.len()
    }

    /// Ends the session: every timer is cancelled and the policy forgets its
    /// telemetry. Stopping an idle driver is a no-op.
    pub fn stop_all(&mut self, stage: &mut Stage<'_>) {
        if !self.active {
            return;
        }
        let range = self.root.map_or(GradeRange::UNSET, |r| stage.tree.grades(r));
        self.trace_session(SessionEdge::Stopped, range);
        Arming::new(&mut self.dispatcher, &mut self.slots).cancel_all();
        self.slots.clear_started();
        self.slots.set_paused(false);
        self.dispatch(stage, |keeper, cx| keeper.stop_all(cx));
        self.active = false;
        self.root = None;
        self.adjusted.clear();
    }

    /// Adds a periodic leaf to the running session. Returns `false` if no
    /// session runs, `leaf` is not periodic, or it is already started.
    pub fn start(&mut self, stage: &mut Stage<'_>, leaf: NodeId) -> bool {
        if !self.active || !stage.tree.is_periodic(leaf) || !self.slots.mark_started(leaf) {
            return false;
        }
        stage.tree.regrade(leaf);
        self.dispatch(stage, |keeper, cx| keeper.start(leaf, cx));
        true
    }

    /// Removes a leaf from the running session and cancels its pending tick.
    /// Stopping a leaf that is not started is a no-op returning `false`.
    pub fn stop(&mut self, stage: &mut Stage<'_>, leaf: NodeId) -> bool {
        if self.slots.is_armed(leaf) {
            Arming::new(&mut self.dispatcher, &mut self.slots).cancel_leaf(leaf);
            self.trace_timer(TimerToken::Leaf(leaf), TimerAction::Cancelled);
        }
        if !self.slots.mark_stopped(leaf) {
            return false;
        }
        self.dispatch(stage, |keeper, cx| keeper.stop(leaf, cx));
        true
    }

    /// Swaps the active policy and returns the old one. A running session
    /// moves over: the old policy is stopped and the new one started on the
    /// same leaves.
    pub fn set_policy(
        &mut self,
        stage: &mut Stage<'_>,
        keeper: Box<dyn PaceKeeper>,
    ) -> Box<dyn PaceKeeper> {
        let timestamp = self.now();
        let (session, old_name, new_name) = (self.session, self.keeper.name(), keeper.name());
        self.tracer().policy_change(&PolicyChangeEvent {
            session,
            old: old_name,
            new: new_name,
            timestamp,
        });
        if !self.active {
            return core::mem::replace(&mut self.keeper, keeper);
        }
        Arming::new(&mut self.dispatcher, &mut self.slots).cancel_all();
        self.dispatch(stage, |old, cx| old.stop_all(cx));
        let old = core::mem::replace(&mut self.keeper, keeper);
        let range = self.root.map_or(GradeRange::UNSET, |r| stage.tree.grades(r));
        self.dispatch(stage, |new, cx| new.start_all(range, cx));
        self.ensure_eval();
        self.flush_adjusted(stage);
        old
    }

    // -- Timer callbacks --

    /// Routes an expired timer to its leaf or to evaluation.
    pub fn fire(&mut self, stage: &mut Stage<'_>, token: TimerToken, time: HostTime) {
        match token {
            TimerToken::Leaf(leaf) => self.play_callback(stage, leaf, time),
            TimerToken::Evaluate => self.evaluate(stage, time),
        }
    }

    /// A leaf's one-shot timer fired at dispatcher time `time`.
    ///
    /// Ticks of leaves stopped while the timer was in flight are dropped.
    pub fn play_callback(&mut self, stage: &mut Stage<'_>, leaf: NodeId, time: HostTime) {
        self.slots.expired(leaf);
        if !self.active || self.slots.is_paused() || !self.slots.is_started(leaf) {
            return;
        }
        let fired_at = self.clock.logical(time);
        self.dispatch(stage, |keeper, cx| keeper.play(leaf, fired_at, cx));
        self.flush_adjusted(stage);
    }

    /// The evaluation timer fired at dispatcher time `time`. If the policy
    /// arms no follow-up, the driver re-arms its fixed period.
    pub fn evaluate(&mut self, stage: &mut Stage<'_>, time: HostTime) {
        self.slots.eval_expired();
        if !self.active || self.slots.is_paused() {
            return;
        }
        let at = self.clock.logical(time);
        self.dispatch(stage, |keeper, cx| keeper.eval(at, cx));
        self.ensure_eval();
        self.flush_adjusted(stage);
    }

    /// Arms the next tick of `leaf` after `delay`; zero fires as soon as the
    /// host loop runs. Returns whether a timer was armed.
    pub fn continue_leaf(&mut self, leaf: NodeId, delay: Duration) -> bool {
        let armed = Arming::new(&mut self.dispatcher, &mut self.slots).continue_leaf(leaf, delay);
        if armed {
            self.trace_timer(TimerToken::Leaf(leaf), TimerAction::Armed(delay));
        }
        armed
    }

    /// Re-arms the evaluation tick after `delay`.
    pub fn reevaluate(&mut self, delay: Duration) -> bool {
        let armed = Arming::new(&mut self.dispatcher, &mut self.slots).reevaluate(delay);
        if armed {
            self.trace_timer(TimerToken::Evaluate, TimerAction::Armed(delay));
        }
        armed
    }

    /// Suspends every timer. Logical time stands still until
    /// [`resume`](Self::resume), so the pause counts against no budget.
    pub fn pause(&mut self) {
        if !self.active || self.clock.is_paused() {
            return;
        }
        self.clock.pause(self.dispatcher.now());
        Arming::new(&mut self.dispatcher, &mut self.slots).cancel_all();
        self.slots.set_paused(true);
    }

    /// Restarts every started leaf at once and re-arms evaluation with the
    /// delay the policy last asked for.
    pub fn resume(&mut self) {
        if !self.active || !self.clock.is_paused() {
            return;
        }
        self.clock.resume(self.dispatcher.now());
        self.slots.set_paused(false);
        Arming::new(&mut self.dispatcher, &mut self.slots).wake();
        let delay = self.slots.eval_delay().unwrap_or(self.config.eval_period);
        self.reevaluate(delay);
    }

    // -- Periods --

    /// Sets the period of a fixed-period leaf and tells the policy. Returns
    /// the old period.
    pub fn set_period(
        &mut self,
        stage: &mut Stage<'_>,
        leaf: NodeId,
        period: Duration,
    ) -> Option<Duration> {
        let old = stage.tree.set_period(leaf, period)?;
        self.period_changed(stage, leaf, old, period);
        Some(old)
    }

    /// Starts pointer tracking on a pointer-rate leaf; returns its period.
    pub fn begin_tracking(
        &mut self,
        stage: &mut Stage<'_>,
        leaf: NodeId,
        event: &PointerEvent,
    ) -> Option<Duration> {
        let old = stage.tree.period(leaf)?;
        let new = stage.tree.begin_tracking(leaf, event)?;
        self.period_changed(stage, leaf, old, new);
        Some(new)
    }

    /// Feeds a pointer sample to a tracking leaf; returns its period.
    ///
    /// A leaf whose period got shorter is re-armed at the new period at once.
    pub fn track(
        &mut self,
        stage: &mut Stage<'_>,
        leaf: NodeId,
        event: &PointerEvent,
    ) -> Option<Duration> {
        let old = stage.tree.period(leaf)?;
        let new = stage.tree.track(leaf, event)?;
        self.period_changed(stage, leaf, old, new);
        Some(new)
    }

    /// Stops pointer tracking; the leaf relaxes toward its slow period on
    /// later ticks.
    pub fn end_tracking(&mut self, stage: &mut Stage<'_>, leaf: NodeId) -> bool {
        stage.tree.end_tracking(leaf)
    }

    // -- Internals --

    fn period_changed(
        &mut self,
        stage: &mut Stage<'_>,
        leaf: NodeId,
        old: Duration,
        new: Duration,
    ) {
        if old == new {
            return;
        }
        let timestamp = self.now();
        self.tracer().period_change(&PeriodChangeEvent {
            leaf,
            old,
            new,
            timestamp,
        });
        if new < old && self.slots.is_armed(leaf) {
            self.continue_leaf(leaf, new);
        }
        if self.active {
            self.dispatch(stage, |keeper, cx| keeper.adjust(leaf, new, cx));
        }
    }

    /// Tells the policy about periods that changed while playing.
    fn flush_adjusted(&mut self, stage: &mut Stage<'_>) {
        while let Some((leaf, old)) = self.adjusted.pop() {
            let Some(new) = stage.tree.period(leaf) else {
                continue;
            };
            if new == old {
                continue;
            }
            let timestamp = self.now();
            self.tracer().period_change(&PeriodChangeEvent {
                leaf,
                old,
                new,
                timestamp,
            });
            self.dispatch(stage, |keeper, cx| keeper.adjust(leaf, new, cx));
        }
    }

    fn ensure_eval(&mut self) {
        if self.active && !self.slots.eval_armed() {
            self.reevaluate(self.config.eval_period);
        }
    }

    fn dispatch<R>(
        &mut self,
        stage: &mut Stage<'_>,
        f: impl FnOnce(&mut dyn PaceKeeper, &mut KeeperCx<'_, '_>) -> R,
    ) -> R {
        let Self {
            dispatcher,
            slots,
            keeper,
            clock,
            session,
            adjusted,
            sink,
            ..
        } = self;
        let tracer = match sink {
            Some(s) => Tracer::new(s.as_mut()),
            None => Tracer::none(),
        };
        let mut cx = KeeperCx::new(
            Arming::new(dispatcher, slots),
            stage,
            clock,
            *session,
            tracer,
            adjusted,
        );
        f(keeper.as_mut(), &mut cx)
    }

    fn tracer(&mut self) -> Tracer<'_> {
        match &mut self.sink {
            Some(s) => Tracer::new(s.as_mut()),
            None => Tracer::none(),
        }
    }

    fn trace_session(&mut self, edge: SessionEdge, range: GradeRange) {
        let leaves = u32::try_from(self.slots.started().len()).unwrap_or(u32::MAX);
        let timestamp = self.now();
        let session = self.session;
        self.tracer().session(&SessionEvent {
            session,
            edge,
            leaves,
            range,
            timestamp,
        });
    }

    fn trace_timer(&mut self, token: TimerToken, action: TimerAction) {
        let timestamp = self.now();
        self.tracer().timer(&TimerEvent {
            token,
            action,
            timestamp,
        });
    }
}
