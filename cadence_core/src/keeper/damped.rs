// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-grade hysteresis.

use hashbrown::HashMap;

use super::adaptive::Gate;
use super::telemetry::Telemetry;
use crate::grade::Grade;
use crate::time::Duration;
use crate::tree::NodeId;

/// Bounds and steps of the hysteresis counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DampingConfig {
    /// Slack cycles required at a grade before its first upgrade attempt.
    pub initial_required: u32,
    /// Floor of the required cycles.
    pub min_required: u32,
    /// Cap of the required cycles.
    pub max_required: u32,
    /// Added to the required cycles of a grade whose trial failed.
    pub increase: u32,
    /// Taken from the required cycles of a grade whose trial committed.
    pub decrease: u32,
}

impl DampingConfig {
    /// Additive increase, additive decrease between 1 and 16 cycles.
    #[must_use]
    pub const fn additive() -> Self {
        Self {
            initial_required: 2,
            min_required: 1,
            max_required: 16,
            increase: 1,
            decrease: 1,
        }
    }

    fn clamp(&self, required: u32) -> u32 {
        required.clamp(self.min_required, self.max_required)
    }
}

impl Default for DampingConfig {
    fn default() -> Self {
        Self::additive()
    }
}

/// Hysteresis counter of one grade.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Hysteresis {
    /// Consecutive slack cycles needed before trying the grade above.
    pub required: u32,
    /// Consecutive slack cycles seen so far.
    pub cycles: u32,
}

/// Allows an upgrade only after `required` consecutive slack cycles.
#[derive(Clone, Debug)]
pub struct DampedGate {
    config: DampingConfig,
    counters: HashMap<Grade, Hysteresis>,
}

impl Default for DampedGate {
    fn default() -> Self {
        Self::new(DampingConfig::default())
    }
}

impl DampedGate {
    /// Creates a gate with fresh counters.
    ///
    /// # Panics
    ///
    /// Panics if `min_required > max_required`.
    #[must_use]
    pub fn new(config: DampingConfig) -> Self {
        assert!(
            config.min_required <= config.max_required,
            "min_required must not exceed max_required"
        );
        Self {
            config,
            counters: HashMap::new(),
        }
    }

    /// Damping bounds.
    #[must_use]
    pub fn config(&self) -> &DampingConfig {
        &self.config
    }

    /// Counter of `grade`, as a fresh grade would start if never touched.
    #[must_use]
    pub fn hysteresis(&self, grade: Grade) -> Hysteresis {
        self.counters
            .get(&grade)
            .copied()
            .unwrap_or_else(|| self.fresh())
    }

    fn fresh(&self) -> Hysteresis {
        Hysteresis {
            required: self.config.clamp(self.config.initial_required),
            cycles: 0,
        }
    }

    fn counter(&mut self, grade: Grade) -> &mut Hysteresis {
        let fresh = self.fresh();
        self.counters.entry(grade).or_insert(fresh)
    }

    /// Adds `steps` to the required cycles of `grade` and restarts its count.
    pub(crate) fn penalize(&mut self, grade: Grade, steps: u32) {
        let config = self.config;
        let h = self.counter(grade);
        h.required = config.clamp(h.required.saturating_add(steps));
        h.cycles = 0;
    }

    /// Takes `steps` from the required cycles of `grade` and restarts its
    /// count.
    pub(crate) fn credit(&mut self, grade: Grade, steps: u32) {
        let config = self.config;
        let h = self.counter(grade);
        h.required = config.clamp(h.required.saturating_sub(steps));
        h.cycles = 0;
    }
}

impl Gate for DampedGate {
    fn name(&self) -> &'static str {
        "damped"
    }

    fn reset(&mut self) {
        self.counters.clear();
    }

    fn on_sustain(&mut self, grade: Grade) {
        let h = self.counter(grade);
        h.cycles = h.cycles.saturating_add(1);
    }

    fn admit_upgrade(&mut self, grade: Grade, _: &Telemetry, _: &[(NodeId, Duration)]) -> bool {
        let h = self.hysteresis(grade);
        h.cycles >= h.required
    }

    fn on_trial_succeeded(&mut self, base: Grade, _: u32) {
        self.credit(base, self.config.decrease);
    }

    fn on_trial_failed(&mut self, base: Grade, _: u32) {
        self.penalize(base, self.config.increase);
    }

    fn on_regress(&mut self, grade: Grade) {
        self.counter(grade).cycles = 0;
    }
}
