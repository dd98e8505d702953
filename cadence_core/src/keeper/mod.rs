// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Adaptive control policies.
//!
//! A [`PaceKeeper`] decides *when* the shared grade of a session moves. It
//! sees every periodic leaf tick (and measures it), and it is asked to
//! re-evaluate on a separate timer. All policies share one state machine for
//! the pair `(current, future)`:
//!
//! ```text
//!             slack + gate admits           all trial budgets >= 0
//!   Sustain ----------------------> Trial ------------------------> Sustain (c + 1)
//!   (c, c)                        (c, c + 1)
//!     |                               | some trial budget < 0
//!     | deficit at c                  v
//!     +---------------------------> Transit ---- next eval -------> Sustain
//!                                 (c, c - 1) or (c + 1, c)
//! ```
//!
//! | policy | upgrade gate |
//! |---|---|
//! | [`Continuator`] | never adapts; plays at the lowest grade |
//! | [`EventKeeper`] | any slack |
//! | [`DampedKeeper`] | `required` consecutive slack cycles, additive increase/decrease |
//! | [`PCKeeper`] | like damped, with steps proportional to deficit and surplus |
//! | [`CoherenceKeeper`] | confidence-weighted one-step cost projection |
//!
//! Telemetry cells touched by a grade transition are reset before the next
//! evaluation is armed, so no measurement taken under the old grades is ever
//! judged under the new ones.

mod adaptive;
mod coherence;
mod continuator;
mod credit;
mod damped;
mod telemetry;

use alloc::vec::Vec;
use core::fmt;

use crate::grade::{FadeKind, Grade, GradeRange, RunTime, SessionId};
use crate::time::{Duration, HostTime, LogicalClock};
use crate::timer::{Arming, TimerToken};
use crate::trace::{GradeChangeEvent, LeafPlayEvent, TimerAction, TimerEvent, Tracer};
use crate::tree::{NodeId, PlayCx, Stage};

pub use adaptive::{AdaptiveKeeper, EventGate, Gate, LeafSample};
pub use coherence::{CoherenceConfig, CoherenceGate};
pub use continuator::Continuator;
pub use credit::{CreditConfig, PenaltyCreditGate};
pub use damped::{DampedGate, DampingConfig, Hysteresis};
pub use telemetry::{Cell, Telemetry};

/// Reacts to every measured tick; upgrades on any slack.
pub type EventKeeper = AdaptiveKeeper<EventGate>;
/// [`EventKeeper`] with per-grade hysteresis.
pub type DampedKeeper = AdaptiveKeeper<DampedGate>;
/// [`DampedKeeper`] with magnitude-proportional hysteresis steps.
pub type PCKeeper = AdaptiveKeeper<PenaltyCreditGate>;
/// [`EventKeeper`] with predictive admission.
pub type CoherenceKeeper = AdaptiveKeeper<CoherenceGate>;

/// Where the future grade stands relative to the committed one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    /// `future == current`; watching for deficit or slack.
    #[default]
    Sustain,
    /// Trying `future = current + 1`.
    Trial,
    /// Settling after a downgrade or a failed trial.
    Transit,
}

/// Timing constants shared by the adaptive policies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeeperConfig {
    /// Delay before re-checking after a commit or while sampling.
    pub sample_period: Duration,
    /// Delay before settling a downgrade or a failed trial.
    pub max_transit: Duration,
    /// Grade a session starts at, clamped into the session range. `None`
    /// starts at the lowest grade.
    pub initial_grade: Option<Grade>,
}

impl KeeperConfig {
    /// Defaults for interactive dragging.
    #[must_use]
    pub const fn interactive() -> Self {
        Self {
            sample_period: Duration::from_millis(50),
            max_transit: Duration::from_millis(500),
            initial_grade: None,
        }
    }

    /// Returns a copy starting sessions at `grade`.
    #[must_use]
    pub const fn starting_at(mut self, grade: Grade) -> Self {
        self.initial_grade = Some(grade);
        self
    }
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self::interactive()
    }
}

/// An adaptive control policy.
///
/// The driver calls these hooks; policies never hold on to the tree or the
/// dispatcher between calls.
pub trait PaceKeeper: fmt::Debug {
    /// Short policy name for diagnostics.
    fn name(&self) -> &'static str;

    /// A session starts over the started leaves of `cx` covering `range`.
    fn start_all(&mut self, range: GradeRange, cx: &mut KeeperCx<'_, '_>);

    /// The session ends. Timers are already cancelled.
    fn stop_all(&mut self, cx: &mut KeeperCx<'_, '_>);

    /// A leaf joined the running session.
    fn start(&mut self, leaf: NodeId, cx: &mut KeeperCx<'_, '_>);

    /// A leaf left the running session. Its timer is already cancelled.
    fn stop(&mut self, leaf: NodeId, cx: &mut KeeperCx<'_, '_>);

    /// The timer of `leaf` fired at logical time `fired_at`.
    fn play(&mut self, leaf: NodeId, fired_at: HostTime, cx: &mut KeeperCx<'_, '_>);

    /// Periodic re-evaluation at logical time `time`.
    fn eval(&mut self, time: HostTime, cx: &mut KeeperCx<'_, '_>);

    /// `leaf` changed its own period to `period`.
    fn adjust(&mut self, leaf: NodeId, period: Duration, cx: &mut KeeperCx<'_, '_>);

    /// Committed grade.
    fn current(&self) -> Grade;

    /// Grade being faded toward.
    fn future(&self) -> Grade;

    /// Current phase.
    fn phase(&self) -> Phase;

    /// Per-leaf timing cells, for policies that keep them.
    fn telemetry(&self) -> Option<&Telemetry> {
        None
    }
}

/// What a policy may touch during one driver callback.
pub struct KeeperCx<'a, 'b> {
    pub(crate) arming: Arming<'a>,
    pub(crate) stage: &'a mut Stage<'b>,
    pub(crate) clock: &'a LogicalClock,
    pub(crate) session: SessionId,
    pub(crate) tracer: Tracer<'a>,
    pub(crate) adjusted: &'a mut Vec<(NodeId, Duration)>,
}

impl fmt::Debug for KeeperCx<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeeperCx")
            .field("arming", &self.arming)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl<'a, 'b> KeeperCx<'a, 'b> {
    /// Bundles the collaborators of one callback.
    pub fn new(
        arming: Arming<'a>,
        stage: &'a mut Stage<'b>,
        clock: &'a LogicalClock,
        session: SessionId,
        tracer: Tracer<'a>,
        adjusted: &'a mut Vec<(NodeId, Duration)>,
    ) -> Self {
        Self {
            arming,
            stage,
            clock,
            session,
            tracer,
            adjusted,
        }
    }

    /// Logical session time now.
    #[must_use]
    pub fn now(&self) -> HostTime {
        self.clock.logical(self.arming.now())
    }

    /// The session being driven.
    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Started leaves, in start order.
    #[must_use]
    pub fn leaves(&self) -> Vec<NodeId> {
        self.arming.slots().started().to_vec()
    }

    /// Period of `leaf`, if it is a periodic leaf.
    #[must_use]
    pub fn period(&self, leaf: NodeId) -> Option<Duration> {
        self.stage.tree.period(leaf)
    }

    /// Cached grade range of `leaf`.
    #[must_use]
    pub fn range(&self, leaf: NodeId) -> GradeRange {
        self.stage.tree.grades(leaf)
    }

    /// Plays `leaf` at `(current, future)` and returns its wall-clock cost,
    /// or `None` if the leaf sits the tick out.
    pub fn play_leaf(
        &mut self,
        leaf: NodeId,
        current: Grade,
        future: Grade,
        fired_at: HostTime,
    ) -> Option<Duration> {
        if !FadeKind::classify(current, future, self.range(leaf)).is_live() {
            return None;
        }
        let period = self.period(leaf)?;
        let tick = RunTime {
            current,
            future,
            session: self.session,
            period,
            timestamp: fired_at,
        };
        let start = self.arming.now();
        {
            let Stage {
                tree,
                canvas,
                graphics,
            } = &mut *self.stage;
            let mut pcx = PlayCx::new(
                &mut **canvas,
                &mut **graphics,
                self.arming.reborrow(),
                &mut *self.adjusted,
            );
            tree.play(leaf, &tick, &mut pcx);
        }
        let cost = self.arming.now().saturating_duration_since(start);
        self.tracer.leaf_play(&LeafPlayEvent {
            leaf,
            session: self.session,
            current,
            future,
            fired_at,
            cost,
            period,
        });
        Some(cost)
    }

    /// Arms the next tick of `leaf` after `delay`.
    pub fn continue_leaf(&mut self, leaf: NodeId, delay: Duration) -> bool {
        let armed = self.arming.continue_leaf(leaf, delay);
        if armed {
            let timestamp = self.now();
            self.tracer.timer(&TimerEvent {
                token: TimerToken::Leaf(leaf),
                action: TimerAction::Armed(delay),
                timestamp,
            });
        }
        armed
    }

    /// Re-arms the evaluation tick after `delay`.
    pub fn reevaluate(&mut self, delay: Duration) -> bool {
        let armed = self.arming.reevaluate(delay);
        if armed {
            let timestamp = self.now();
            self.tracer.timer(&TimerEvent {
                token: TimerToken::Evaluate,
                action: TimerAction::Armed(delay),
                timestamp,
            });
        }
        armed
    }

    /// Arms every started leaf without a pending tick to fire at once.
    pub fn wake(&mut self) {
        self.arming.wake();
    }

    /// Reports a grade movement to the trace sink.
    pub fn grade_changed(&mut self, from: (Grade, Grade), to: (Grade, Grade), phase: Phase) {
        let timestamp = self.now();
        self.tracer.grade_change(&GradeChangeEvent {
            session: self.session,
            from,
            to,
            phase,
            timestamp,
        });
    }
}
