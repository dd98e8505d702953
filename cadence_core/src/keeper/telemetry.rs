// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-leaf, per-grade timing cells.

use hashbrown::HashMap;

use crate::grade::Grade;
use crate::time::Duration;
use crate::tree::NodeId;

/// Timing record of one leaf at one grade.
///
/// An absent cell is neutral: no sample yet, confidence at the policy's
/// neutral value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cell {
    /// Most recent measured cost of one tick.
    pub cost_per_frame: Duration,
    /// Cost measured before that, if any.
    pub previous_cost: Option<Duration>,
    /// Period minus the most recent cost, in signed microseconds.
    pub time_budget_left: i64,
    /// Most recent cost minus the previous one, in signed microseconds.
    pub cost_delta: i64,
    /// Trust in the cost estimate, in `[0, 1]`.
    pub confidence: f32,
    /// Samples recorded since the cell was reset.
    pub samples: u32,
    /// Samples not yet consumed by an evaluation.
    fresh: u32,
    /// Smallest budget seen since the last evaluation consumed the cell.
    worst_budget: i64,
}

impl Cell {
    /// A neutral cell with the given starting confidence.
    #[must_use]
    pub const fn neutral(confidence: f32) -> Self {
        Self {
            cost_per_frame: Duration::ZERO,
            previous_cost: None,
            time_budget_left: 0,
            cost_delta: 0,
            confidence,
            samples: 0,
            fresh: 0,
            worst_budget: i64::MAX,
        }
    }

    /// Records one tick costing `cost` against `period`.
    pub fn record(&mut self, cost: Duration, period: Duration) {
        if self.samples > 0 {
            self.previous_cost = Some(self.cost_per_frame);
            self.cost_delta = cost.signed_diff(self.cost_per_frame);
        }
        self.cost_per_frame = cost;
        self.time_budget_left = period.signed_diff(cost);
        self.samples = self.samples.saturating_add(1);
        self.fresh = self.fresh.saturating_add(1);
        self.worst_budget = self.worst_budget.min(self.time_budget_left);
    }

    /// Whether samples arrived since the last [`consume`](Self::consume).
    #[must_use]
    pub fn has_fresh(&self) -> bool {
        self.fresh > 0
    }

    /// Smallest budget since the last [`consume`](Self::consume), without
    /// starting a new window.
    #[must_use]
    pub fn worst(&self) -> Option<i64> {
        (self.fresh > 0).then_some(self.worst_budget)
    }

    /// Returns the worst budget since the last call and starts a new window,
    /// or `None` if nothing was recorded in between.
    pub fn consume(&mut self) -> Option<i64> {
        if self.fresh == 0 {
            return None;
        }
        let worst = self.worst_budget;
        self.fresh = 0;
        self.worst_budget = i64::MAX;
        Some(worst)
    }

    /// Recomputes the budget after the leaf's period changed.
    pub fn rebudget(&mut self, period: Duration) {
        if self.samples == 0 {
            return;
        }
        self.time_budget_left = period.signed_diff(self.cost_per_frame);
        if self.fresh > 0 {
            self.worst_budget = self.time_budget_left;
        }
    }
}

/// Timing cells keyed by `(leaf, grade)`.
#[derive(Clone, Debug)]
pub struct Telemetry {
    cells: HashMap<(NodeId, Grade), Cell>,
    neutral_confidence: f32,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl Telemetry {
    /// Empty telemetry whose fresh cells start at `neutral_confidence`.
    #[must_use]
    pub fn new(neutral_confidence: f32) -> Self {
        Self {
            cells: HashMap::new(),
            neutral_confidence,
        }
    }

    /// Cell of `leaf` at `grade`, if one was recorded.
    #[must_use]
    pub fn get(&self, leaf: NodeId, grade: Grade) -> Option<&Cell> {
        self.cells.get(&(leaf, grade))
    }

    /// Cell of `leaf` at `grade`, created neutral if absent.
    pub fn cell_mut(&mut self, leaf: NodeId, grade: Grade) -> &mut Cell {
        let neutral = self.neutral_confidence;
        self.cells
            .entry((leaf, grade))
            .or_insert_with(|| Cell::neutral(neutral))
    }

    /// Drops every cell at `grade`.
    pub fn reset_grade(&mut self, grade: Grade) {
        self.cells.retain(|&(_, g), _| g != grade);
    }

    /// Drops every cell of `leaf`.
    pub fn reset_leaf(&mut self, leaf: NodeId) {
        self.cells.retain(|&(l, _), _| l != leaf);
    }

    /// Drops every cell.
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Whether no cell holds a sample.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Recomputes every budget of `leaf` for a new period.
    pub fn rebudget(&mut self, leaf: NodeId, period: Duration) {
        for (_, cell) in self.cells.iter_mut().filter(|((l, _), _)| *l == leaf) {
            cell.rebudget(period);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::SchedTree;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn record_tracks_budget_and_delta() {
        let mut c = Cell::neutral(0.5);
        c.record(ms(10), ms(16));
        assert_eq!(c.time_budget_left, 6_000);
        assert_eq!(c.cost_delta, 0);
        assert_eq!(c.previous_cost, None);
        c.record(ms(20), ms(16));
        assert_eq!(c.time_budget_left, -4_000);
        assert_eq!(c.cost_delta, 10_000);
        assert_eq!(c.previous_cost, Some(ms(10)));
        assert_eq!(c.samples, 2);
    }

    #[test]
    fn consume_reports_worst_then_empties_window() {
        let mut c = Cell::neutral(0.5);
        assert_eq!(c.consume(), None);
        c.record(ms(20), ms(16));
        c.record(ms(8), ms(16));
        assert_eq!(c.consume(), Some(-4_000));
        assert!(!c.has_fresh());
        assert_eq!(c.consume(), None);
        c.record(ms(8), ms(16));
        assert_eq!(c.consume(), Some(8_000));
    }

    #[test]
    fn rebudget_follows_new_period() {
        let mut c = Cell::neutral(0.5);
        c.record(ms(20), ms(16));
        c.rebudget(ms(40));
        assert_eq!(c.time_budget_left, 20_000);
        assert_eq!(c.consume(), Some(20_000));
    }

    #[test]
    fn resets_drop_only_matching_cells() {
        let mut tree = SchedTree::new();
        let a = tree.scheduler(ms(16));
        let b = tree.scheduler(ms(16));
        let mut t = Telemetry::default();
        t.cell_mut(a, 0).record(ms(1), ms(16));
        t.cell_mut(a, 1).record(ms(1), ms(16));
        t.cell_mut(b, 1).record(ms(1), ms(16));
        t.reset_grade(1);
        assert_eq!(t.len(), 1);
        assert!(t.get(a, 0).is_some());
        t.reset_leaf(a);
        assert!(t.is_empty());
    }
}
