// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The shared `Sustain`/`Trial`/`Transit` state machine.
//!
//! [`AdaptiveKeeper`] measures every leaf tick into [`Telemetry`] and moves
//! the session grade on evaluation. What differs between the adaptive
//! policies is only *whether an upgrade may be tried* and how that decision
//! learns from outcomes, which is the job of a [`Gate`].

use alloc::vec::Vec;
use core::fmt;

use super::telemetry::{Cell, Telemetry};
use super::{KeeperConfig, KeeperCx, PaceKeeper, Phase};
use crate::grade::{FadeKind, Grade, GradeRange};
use crate::time::{Duration, HostTime};
use crate::tree::NodeId;

/// One measured tick, as seen by a [`Gate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeafSample {
    /// Leaf that ticked.
    pub leaf: NodeId,
    /// Grade the measurement was filed under.
    pub grade: Grade,
    /// Wall-clock cost of the tick.
    pub cost: Duration,
    /// Period the leaf ran at.
    pub period: Duration,
}

/// Upgrade admission for an [`AdaptiveKeeper`].
///
/// Hooks other than [`admit_upgrade`](Self::admit_upgrade) default to
/// doing nothing.
pub trait Gate: fmt::Debug {
    /// Short name of the policy this gate defines.
    fn name(&self) -> &'static str;

    /// Starting confidence of fresh telemetry cells.
    fn neutral_confidence(&self) -> f32 {
        0.5
    }

    /// A new session starts; forget everything learned.
    fn reset(&mut self) {}

    /// A tick was recorded into `cell`.
    fn observe(&mut self, sample: &LeafSample, cell: &mut Cell) {
        _ = (sample, cell);
    }

    /// One evaluation found slack at `grade`.
    fn on_sustain(&mut self, grade: Grade) {
        _ = grade;
    }

    /// Whether to try `grade + 1` now. `leaves` holds the participating
    /// leaves and their periods.
    fn admit_upgrade(
        &mut self,
        grade: Grade,
        telemetry: &Telemetry,
        leaves: &[(NodeId, Duration)],
    ) -> bool;

    /// The trial above `base` committed with the given surplus, in
    /// thousandths of a period.
    fn on_trial_succeeded(&mut self, base: Grade, surplus_permille: u32) {
        _ = (base, surplus_permille);
    }

    /// The trial above `base` failed with the given deficit, in thousandths
    /// of a period.
    fn on_trial_failed(&mut self, base: Grade, deficit_permille: u32) {
        _ = (base, deficit_permille);
    }

    /// A deficit was found while sustaining `grade`.
    fn on_regress(&mut self, grade: Grade) {
        _ = grade;
    }
}

/// Admits an upgrade on any slack.
#[derive(Clone, Copy, Debug, Default)]
pub struct EventGate;

impl Gate for EventGate {
    fn name(&self) -> &'static str {
        "event"
    }

    fn admit_upgrade(&mut self, _: Grade, _: &Telemetry, _: &[(NodeId, Duration)]) -> bool {
        true
    }
}

/// Telemetry-driven policy, parameterized by its upgrade [`Gate`].
///
/// Every tick is measured and filed under the grade being faded toward.
/// The first sample at a trial grade evaluates at once, so a failing trial
/// costs a single tick; otherwise evaluation runs on the driver's timer.
#[derive(Debug)]
pub struct AdaptiveKeeper<G> {
    config: KeeperConfig,
    gate: G,
    telemetry: Telemetry,
    range: GradeRange,
    current: Grade,
    future: Grade,
    phase: Phase,
    running: bool,
}

impl<G: Gate + Default> Default for AdaptiveKeeper<G> {
    fn default() -> Self {
        Self::new(KeeperConfig::default(), G::default())
    }
}

impl<G: Gate> AdaptiveKeeper<G> {
    /// Creates an idle keeper.
    #[must_use]
    pub fn new(config: KeeperConfig, gate: G) -> Self {
        let telemetry = Telemetry::new(gate.neutral_confidence());
        Self {
            config,
            gate,
            telemetry,
            range: GradeRange::UNSET,
            current: GradeRange::UNSET.low,
            future: GradeRange::UNSET.low,
            phase: Phase::Sustain,
            running: false,
        }
    }

    /// Timing constants.
    #[must_use]
    pub fn config(&self) -> &KeeperConfig {
        &self.config
    }

    /// Upgrade gate.
    #[must_use]
    pub fn gate(&self) -> &G {
        &self.gate
    }

    /// Session grade range.
    #[must_use]
    pub fn range(&self) -> GradeRange {
        self.range
    }

    /// Files one measured tick of `leaf`.
    ///
    /// [`play`](PaceKeeper::play) calls this with the cost it measured;
    /// hosts that measure elsewhere may call it directly.
    pub fn observe(&mut self, leaf: NodeId, cost: Duration, cx: &mut KeeperCx<'_, '_>) {
        if !self.running {
            return;
        }
        let Some(period) = cx.period(leaf) else {
            return;
        };
        let sample = LeafSample {
            leaf,
            grade: self.future,
            cost,
            period,
        };
        let cell = self.telemetry.cell_mut(leaf, sample.grade);
        cell.record(cost, period);
        self.gate.observe(&sample, cell);
        let first = cell.samples == 1;
        if self.phase == Phase::Trial && first {
            let now = cx.now();
            self.eval(now, cx);
        }
    }

    /// Started leaves that take part at the current grades.
    fn participants(&self, cx: &KeeperCx<'_, '_>) -> Vec<(NodeId, Duration)> {
        cx.leaves()
            .into_iter()
            .filter(|&leaf| FadeKind::classify(self.current, self.future, cx.range(leaf)).is_live())
            .filter_map(|leaf| cx.period(leaf).map(|p| (leaf, p)))
            .collect()
    }

    fn transition(
        &mut self,
        current: Grade,
        future: Grade,
        phase: Phase,
        cx: &mut KeeperCx<'_, '_>,
    ) {
        let from = (self.current, self.future);
        for g in [from.0, from.1, current, future] {
            self.telemetry.reset_grade(g);
        }
        self.current = current;
        self.future = future;
        self.phase = phase;
        cx.grade_changed(from, (current, future), phase);
    }

    fn eval_trial(&mut self, leaves: &[(NodeId, Duration)], cx: &mut KeeperCx<'_, '_>) {
        let base = self.current;
        let trial = self.future;
        if leaves.is_empty() {
            self.transition(base, base, Phase::Sustain, cx);
            cx.reevaluate(self.config.sample_period);
            return;
        }
        let mut ready = true;
        let mut worst = i64::MAX;
        for &(leaf, period) in leaves {
            match self.telemetry.get(leaf, trial).and_then(Cell::worst) {
                Some(budget) => worst = worst.min(permille(budget, period)),
                None => ready = false,
            }
        }
        if worst < 0 {
            self.gate.on_trial_failed(base, magnitude(worst));
            self.transition(trial, base, Phase::Transit, cx);
            cx.wake();
            cx.reevaluate(self.config.max_transit);
        } else if ready {
            self.gate.on_trial_succeeded(base, magnitude(worst.min(1000)));
            self.transition(trial, trial, Phase::Sustain, cx);
            cx.reevaluate(self.config.sample_period);
        } else {
            cx.reevaluate(self.config.sample_period);
        }
    }

    fn eval_sustain(&mut self, leaves: &[(NodeId, Duration)], cx: &mut KeeperCx<'_, '_>) {
        let grade = self.current;
        let mut worst: Option<i64> = None;
        for &(leaf, period) in leaves {
            let Some(budget) = self.telemetry.cell_mut(leaf, grade).consume() else {
                continue;
            };
            let budget = permille(budget, period);
            worst = Some(worst.map_or(budget, |w| w.min(budget)));
        }
        match worst {
            None => {
                cx.reevaluate(self.config.sample_period);
            }
            Some(w) if w < 0 => {
                self.gate.on_regress(grade);
                if grade > self.range.low {
                    self.transition(grade, grade - 1, Phase::Transit, cx);
                    cx.wake();
                    cx.reevaluate(self.config.max_transit);
                } else {
                    cx.reevaluate(self.config.sample_period);
                }
            }
            Some(_) => {
                self.gate.on_sustain(grade);
                if grade < self.range.high
                    && self.gate.admit_upgrade(grade, &self.telemetry, leaves)
                {
                    self.transition(grade, grade + 1, Phase::Trial, cx);
                    cx.wake();
                }
                cx.reevaluate(self.config.sample_period);
            }
        }
    }
}

impl<G: Gate> PaceKeeper for AdaptiveKeeper<G> {
    fn name(&self) -> &'static str {
        self.gate.name()
    }

    fn start_all(&mut self, range: GradeRange, cx: &mut KeeperCx<'_, '_>) {
        self.telemetry.clear();
        self.gate.reset();
        self.range = range;
        self.phase = Phase::Sustain;
        self.running = !range.is_unset();
        if !self.running {
            self.current = range.low;
            self.future = range.low;
            return;
        }
        let start = self.config.initial_grade.map_or(range.low, |g| range.clamp(g));
        self.current = start;
        self.future = start;
        cx.wake();
        cx.reevaluate(self.config.sample_period);
    }

    fn stop_all(&mut self, _cx: &mut KeeperCx<'_, '_>) {
        self.running = false;
        self.telemetry.clear();
        self.phase = Phase::Sustain;
    }

    fn start(&mut self, leaf: NodeId, cx: &mut KeeperCx<'_, '_>) {
        self.telemetry.reset_leaf(leaf);
        if self.running {
            cx.continue_leaf(leaf, Duration::ZERO);
        }
    }

    fn stop(&mut self, leaf: NodeId, _cx: &mut KeeperCx<'_, '_>) {
        self.telemetry.reset_leaf(leaf);
    }

    fn play(&mut self, leaf: NodeId, fired_at: HostTime, cx: &mut KeeperCx<'_, '_>) {
        if !self.running {
            return;
        }
        if let Some(cost) = cx.play_leaf(leaf, self.current, self.future, fired_at) {
            self.observe(leaf, cost, cx);
        }
    }

    fn eval(&mut self, _time: HostTime, cx: &mut KeeperCx<'_, '_>) {
        if !self.running {
            return;
        }
        let leaves = self.participants(cx);
        match self.phase {
            Phase::Trial => self.eval_trial(&leaves, cx),
            Phase::Transit => {
                let settled = self.future;
                self.transition(settled, settled, Phase::Sustain, cx);
                cx.wake();
                cx.reevaluate(self.config.sample_period);
            }
            Phase::Sustain => self.eval_sustain(&leaves, cx),
        }
    }

    fn adjust(&mut self, leaf: NodeId, period: Duration, _cx: &mut KeeperCx<'_, '_>) {
        self.telemetry.rebudget(leaf, period);
    }

    fn current(&self) -> Grade {
        self.current
    }

    fn future(&self) -> Grade {
        self.future
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn telemetry(&self) -> Option<&Telemetry> {
        Some(&self.telemetry)
    }
}

/// Budget as thousandths of `period`, so leaves at different rates compare.
///
/// Rounds toward negative infinity: any overrun, however small, stays
/// negative.
fn permille(budget: i64, period: Duration) -> i64 {
    let period = period.signed_diff(Duration::ZERO).max(1);
    budget.saturating_mul(1000).div_euclid(period)
}

fn magnitude(permille: i64) -> u32 {
    u32::try_from(permille.unsigned_abs()).unwrap_or(u32::MAX)
}
