// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hysteresis steps proportional to how badly or how well a trial went.

use hashbrown::HashMap;

use super::adaptive::{Gate, LeafSample};
use super::damped::{DampedGate, DampingConfig, Hysteresis};
use super::telemetry::{Cell, Telemetry};
use crate::grade::Grade;
use crate::time::Duration;
use crate::tree::NodeId;

/// Conversion of trial outcomes into hysteresis steps.
///
/// Deficits and surpluses are measured in thousandths of a period and
/// accumulate per grade; every whole `penalty_per_cycle` of accumulated
/// deficit adds one required cycle, every whole `credit_per_cycle` of
/// surplus removes one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CreditConfig {
    /// Counter bounds and starting requirement.
    pub damping: DampingConfig,
    /// Accumulated deficit, in permille of a period, worth one cycle.
    pub penalty_per_cycle: u32,
    /// Accumulated surplus, in permille of a period, worth one cycle.
    pub credit_per_cycle: u32,
}

impl CreditConfig {
    /// A quarter-period deficit or surplus is worth one cycle.
    #[must_use]
    pub const fn proportional() -> Self {
        Self {
            damping: DampingConfig::additive(),
            penalty_per_cycle: 250,
            credit_per_cycle: 250,
        }
    }
}

impl Default for CreditConfig {
    fn default() -> Self {
        Self::proportional()
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Ledger {
    penalty: u32,
    credit: u32,
}

/// [`DampedGate`] whose steps follow accumulated penalty and credit.
#[derive(Clone, Debug)]
pub struct PenaltyCreditGate {
    damped: DampedGate,
    penalty_per_cycle: u32,
    credit_per_cycle: u32,
    ledgers: HashMap<Grade, Ledger>,
}

impl Default for PenaltyCreditGate {
    fn default() -> Self {
        Self::new(CreditConfig::default())
    }
}

impl PenaltyCreditGate {
    /// Creates a gate with empty ledgers.
    ///
    /// # Panics
    ///
    /// Panics if either per-cycle amount is zero, or on the
    /// [`DampedGate::new`] conditions.
    #[must_use]
    pub fn new(config: CreditConfig) -> Self {
        assert!(
            config.penalty_per_cycle > 0 && config.credit_per_cycle > 0,
            "per-cycle amounts must be non-zero"
        );
        Self {
            damped: DampedGate::new(config.damping),
            penalty_per_cycle: config.penalty_per_cycle,
            credit_per_cycle: config.credit_per_cycle,
            ledgers: HashMap::new(),
        }
    }

    /// Counter of `grade`.
    #[must_use]
    pub fn hysteresis(&self, grade: Grade) -> Hysteresis {
        self.damped.hysteresis(grade)
    }

    /// Unconverted `(penalty, credit)` of `grade`, in permille.
    #[must_use]
    pub fn balance(&self, grade: Grade) -> (u32, u32) {
        self.ledgers
            .get(&grade)
            .map_or((0, 0), |l| (l.penalty, l.credit))
    }
}

impl Gate for PenaltyCreditGate {
    fn name(&self) -> &'static str {
        "penalty-credit"
    }

    fn reset(&mut self) {
        self.damped.reset();
        self.ledgers.clear();
    }

    fn observe(&mut self, sample: &LeafSample, cell: &mut Cell) {
        self.damped.observe(sample, cell);
    }

    fn on_sustain(&mut self, grade: Grade) {
        self.damped.on_sustain(grade);
    }

    fn admit_upgrade(
        &mut self,
        grade: Grade,
        telemetry: &Telemetry,
        leaves: &[(NodeId, Duration)],
    ) -> bool {
        self.damped.admit_upgrade(grade, telemetry, leaves)
    }

    fn on_trial_succeeded(&mut self, base: Grade, surplus_permille: u32) {
        let per_cycle = self.credit_per_cycle;
        let ledger = self.ledgers.entry(base).or_default();
        ledger.credit = ledger.credit.saturating_add(surplus_permille);
        let steps = ledger.credit / per_cycle;
        ledger.credit %= per_cycle;
        self.damped.credit(base, steps);
    }

    fn on_trial_failed(&mut self, base: Grade, deficit_permille: u32) {
        let per_cycle = self.penalty_per_cycle;
        let ledger = self.ledgers.entry(base).or_default();
        ledger.penalty = ledger.penalty.saturating_add(deficit_permille);
        let steps = ledger.penalty / per_cycle;
        ledger.penalty %= per_cycle;
        self.damped.penalize(base, steps);
    }

    fn on_regress(&mut self, grade: Grade) {
        self.damped.on_regress(grade);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grade::GradeRange;
    use crate::keeper::adaptive::tests::{Rig, ms};
    use crate::keeper::{KeeperConfig, PCKeeper, PaceKeeper, Phase};
    use crate::time::HostTime;

    fn started() -> (Rig, PCKeeper, NodeId) {
        let mut rig = Rig::default();
        let range = GradeRange::new(0, 5);
        let leaf = rig.leaf(ms(16), range);
        let mut k = PCKeeper::new(KeeperConfig::interactive(), PenaltyCreditGate::default());
        rig.with(|cx| k.start_all(range, cx));
        (rig, k, leaf)
    }

    fn cycle(rig: &mut Rig, k: &mut PCKeeper, leaf: NodeId, cost: Duration) {
        rig.with(|cx| {
            k.observe(leaf, cost, cx);
            k.eval(HostTime(0), cx);
        });
    }

    /// Sustains at the current grade until the gate admits a trial.
    fn reach_trial(rig: &mut Rig, k: &mut PCKeeper, leaf: NodeId, cycles: u32) {
        for _ in 1..cycles {
            cycle(rig, k, leaf, ms(4));
            assert_eq!(k.phase(), Phase::Sustain);
        }
        cycle(rig, k, leaf, ms(4));
        assert_eq!(k.phase(), Phase::Trial);
    }

    #[test]
    fn quarter_period_overrun_costs_one_cycle() {
        let (mut rig, mut k, leaf) = started();
        reach_trial(&mut rig, &mut k, leaf, 2);

        // 20 ms against 16 ms is a 250 permille deficit
        rig.with(|cx| k.observe(leaf, ms(20), cx));
        assert_eq!((k.current(), k.future(), k.phase()), (1, 0, Phase::Transit));
        assert_eq!(k.gate().hysteresis(0).required, 3);
        assert_eq!(k.gate().balance(0), (0, 0));
    }

    #[test]
    fn tiny_overrun_fails_and_is_booked() {
        let (mut rig, mut k, leaf) = started();
        reach_trial(&mut rig, &mut k, leaf, 2);

        rig.with(|cx| k.observe(leaf, ms(16) + Duration::from_micros(10), cx));
        assert_eq!(k.phase(), Phase::Transit);
        assert_eq!(k.gate().hysteresis(0).required, 2);
        assert_eq!(k.gate().balance(0), (1, 0));
    }

    #[test]
    fn surplus_buys_back_cycles_in_proportion() {
        let (mut rig, mut k, leaf) = started();
        reach_trial(&mut rig, &mut k, leaf, 2);

        // 28 ms: 750 permille deficit, three cycles
        rig.with(|cx| k.observe(leaf, ms(28), cx));
        assert_eq!(k.gate().hysteresis(0).required, 5);
        rig.with(|cx| k.eval(HostTime(0), cx));
        assert_eq!((k.current(), k.future(), k.phase()), (0, 0, Phase::Sustain));

        reach_trial(&mut rig, &mut k, leaf, 5);
        // 8 ms: 500 permille surplus, two cycles back
        rig.with(|cx| k.observe(leaf, ms(8), cx));
        assert_eq!((k.current(), k.future(), k.phase()), (1, 1, Phase::Sustain));
        assert_eq!(k.gate().hysteresis(0).required, 3);
        assert_eq!(k.gate().balance(0), (0, 0));
    }

    #[test]
    fn large_deficit_costs_several_cycles() {
        let mut g = PenaltyCreditGate::default();
        g.on_trial_failed(2, 600);
        assert_eq!(g.hysteresis(2).required, 4);
        assert_eq!(g.balance(2), (100, 0));
    }

    #[test]
    fn small_deficits_accumulate() {
        let mut g = PenaltyCreditGate::default();
        g.on_trial_failed(1, 100);
        assert_eq!(g.hysteresis(1).required, 2);
        assert_eq!(g.hysteresis(1).cycles, 0);
        g.on_trial_failed(1, 200);
        assert_eq!(g.hysteresis(1).required, 3);
        assert_eq!(g.balance(1), (50, 0));
    }

    #[test]
    fn surplus_buys_back_cycles() {
        let mut g = PenaltyCreditGate::default();
        g.on_trial_failed(0, 1000);
        assert_eq!(g.hysteresis(0).required, 6);
        g.on_trial_succeeded(0, 520);
        assert_eq!(g.hysteresis(0).required, 4);
        assert_eq!(g.balance(0), (0, 20));
    }

    #[test]
    fn reset_forgets_ledgers() {
        let mut g = PenaltyCreditGate::default();
        g.on_trial_failed(0, 300);
        g.reset();
        assert_eq!(g.balance(0), (0, 0));
        assert_eq!(g.hysteresis(0).required, 2);
    }

    #[test]
    #[should_panic(expected = "per-cycle amounts must be non-zero")]
    fn zero_step_is_rejected() {
        _ = PenaltyCreditGate::new(CreditConfig {
            penalty_per_cycle: 0,
            ..CreditConfig::proportional()
        });
    }
}
