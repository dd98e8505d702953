// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Predictive admission from confidence-weighted cost trends.
//!
//! Every cell carries a confidence in `[floor, 1]`. A tick that stays within
//! its period multiplies it by `growth`; an overrun multiplies it by `decay`.
//! Before trying the grade above, each participating leaf's next cost is
//! projected as
//!
//! ```text
//! projected = latest + confidence * (latest - previous)
//! ```
//!
//! and the upgrade is admitted only if every projection stays under
//! `period - tolerance`.

use super::adaptive::{Gate, LeafSample};
use super::telemetry::{Cell, Telemetry};
use crate::grade::Grade;
use crate::time::Duration;
use crate::tree::NodeId;

/// Confidence dynamics and admission margin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoherenceConfig {
    /// Headroom a projection must leave below the period.
    pub tolerance: Duration,
    /// Confidence factor after a tick within budget.
    pub growth: f32,
    /// Confidence factor after an overrun.
    pub decay: f32,
    /// Lowest confidence.
    pub floor: f32,
    /// Confidence of a fresh cell.
    pub neutral: f32,
}

impl CoherenceConfig {
    /// Halve on overrun, grow by half on success, 2 ms headroom.
    #[must_use]
    pub const fn geometric() -> Self {
        Self {
            tolerance: Duration::from_millis(2),
            growth: 1.5,
            decay: 0.5,
            floor: 0.05,
            neutral: 0.5,
        }
    }
}

impl Default for CoherenceConfig {
    fn default() -> Self {
        Self::geometric()
    }
}

/// Admits an upgrade when every projected cost leaves `tolerance` to spare.
#[derive(Clone, Copy, Debug, Default)]
pub struct CoherenceGate {
    config: CoherenceConfig,
}

impl CoherenceGate {
    /// Creates a gate.
    ///
    /// # Panics
    ///
    /// Panics unless `0 < floor <= neutral <= 1` and `0 < decay < 1 < growth`.
    #[must_use]
    pub fn new(config: CoherenceConfig) -> Self {
        assert!(
            config.floor > 0.0 && config.floor <= config.neutral && config.neutral <= 1.0,
            "confidence bounds must satisfy 0 < floor <= neutral <= 1"
        );
        assert!(
            config.decay > 0.0 && config.decay < 1.0 && config.growth > 1.0,
            "decay must lie in (0, 1) and growth above 1"
        );
        Self { config }
    }

    /// Confidence dynamics.
    #[must_use]
    pub fn config(&self) -> &CoherenceConfig {
        &self.config
    }

    /// Projected next cost of one cell, in microseconds.
    #[must_use]
    pub fn project(cell: &Cell) -> f64 {
        let latest = cell.cost_per_frame.micros() as f64;
        let delta = cell.cost_delta as f64;
        latest + f64::from(cell.confidence) * delta
    }
}

impl Gate for CoherenceGate {
    fn name(&self) -> &'static str {
        "coherence"
    }

    fn neutral_confidence(&self) -> f32 {
        self.config.neutral
    }

    fn observe(&mut self, _sample: &LeafSample, cell: &mut Cell) {
        cell.confidence = if cell.time_budget_left >= 0 {
            (cell.confidence * self.config.growth).min(1.0)
        } else {
            (cell.confidence * self.config.decay).max(self.config.floor)
        };
    }

    fn admit_upgrade(
        &mut self,
        grade: Grade,
        telemetry: &Telemetry,
        leaves: &[(NodeId, Duration)],
    ) -> bool {
        !leaves.is_empty()
            && leaves.iter().all(|&(leaf, period)| {
                let limit = period.saturating_sub(self.config.tolerance).micros() as f64;
                telemetry
                    .get(leaf, grade)
                    .filter(|cell| cell.samples > 0)
                    .is_some_and(|cell| Self::project(cell) < limit)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grade::GradeRange;
    use crate::keeper::adaptive::tests::{Rig, ms};
    use crate::keeper::{CoherenceKeeper, KeeperConfig, PaceKeeper, Phase};
    use crate::time::HostTime;

    fn sample(leaf: NodeId, cost: u64) -> LeafSample {
        LeafSample {
            leaf,
            grade: 0,
            cost: ms(cost),
            period: ms(16),
        }
    }

    #[test]
    fn confidence_grows_then_halves() {
        let mut rig = Rig::default();
        let leaf = rig.leaf(ms(16), GradeRange::new(0, 1));
        let mut gate = CoherenceGate::default();
        let mut cell = Cell::neutral(gate.neutral_confidence());

        cell.record(ms(10), ms(16));
        gate.observe(&sample(leaf, 10), &mut cell);
        assert_eq!(cell.confidence, 0.75);
        cell.record(ms(10), ms(16));
        gate.observe(&sample(leaf, 10), &mut cell);
        assert_eq!(cell.confidence, 1.0);
        cell.record(ms(20), ms(16));
        gate.observe(&sample(leaf, 20), &mut cell);
        assert_eq!(cell.confidence, 0.5);
    }

    #[test]
    fn confidence_never_drops_below_floor() {
        let mut rig = Rig::default();
        let leaf = rig.leaf(ms(16), GradeRange::new(0, 1));
        let mut gate = CoherenceGate::default();
        let mut cell = Cell::neutral(0.06);
        cell.record(ms(30), ms(16));
        gate.observe(&sample(leaf, 30), &mut cell);
        assert_eq!(cell.confidence, 0.05);
    }

    #[test]
    fn rising_cost_trend_blocks_upgrade() {
        let mut rig = Rig::default();
        let range = GradeRange::new(0, 3);
        let leaf = rig.leaf(ms(16), range);
        let mut k = CoherenceKeeper::new(KeeperConfig::interactive(), CoherenceGate::default());
        rig.with(|cx| {
            k.start_all(range, cx);
            k.observe(leaf, ms(10), cx);
            k.observe(leaf, ms(13), cx);
            k.eval(HostTime(0), cx);
        });
        // 13 + 1.0 * 3 = 16 ms, over the 14 ms limit
        assert_eq!((k.current(), k.future(), k.phase()), (0, 0, Phase::Sustain));
    }

    #[test]
    fn steady_cost_admits_upgrade() {
        let mut rig = Rig::default();
        let range = GradeRange::new(0, 3);
        let leaf = rig.leaf(ms(16), range);
        let mut k = CoherenceKeeper::new(KeeperConfig::interactive(), CoherenceGate::default());
        rig.with(|cx| {
            k.start_all(range, cx);
            k.observe(leaf, ms(10), cx);
            k.observe(leaf, ms(10), cx);
            k.eval(HostTime(0), cx);
        });
        assert_eq!((k.current(), k.future(), k.phase()), (0, 1, Phase::Trial));
    }

    #[test]
    #[should_panic(expected = "decay must lie in (0, 1) and growth above 1")]
    fn non_contracting_decay_is_rejected() {
        _ = CoherenceGate::new(CoherenceConfig {
            decay: 1.0,
            ..CoherenceConfig::geometric()
        });
    }
}
