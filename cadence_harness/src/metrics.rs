// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pacing metrics and grading.

use alloc::rc::Rc;
use core::cell::RefCell;

use cadence_core::grade::Grade;
use cadence_core::keeper::Phase;
use cadence_core::trace::{GradeChangeEvent, LeafPlayEvent, SessionEdge, SessionEvent, TraceSink};

/// Letter grade for pacing quality.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacingGrade {
    /// Ticks fit their periods and the grade holds still.
    A,
    /// Occasional overruns or grade churn.
    B,
    /// Degraded but usable.
    C,
    /// Poor pacing.
    D,
}

impl PacingGrade {
    /// Returns a short label for HUD rendering.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

/// Aggregated report returned by [`PacingTracker::report`].
#[derive(Clone, Copy, Debug)]
pub struct PacingReport {
    /// Current grade.
    pub grade: PacingGrade,
    /// Overruns per 1000 leaf ticks.
    pub misses_per_1000: f64,
    /// Direction reversals of the future grade per 1000 leaf ticks.
    pub reversals_per_1000: f64,
    /// Total leaf ticks observed.
    pub ticks: u64,
    /// Ticks whose cost exceeded their period.
    pub misses: u64,
    /// Grade pair moves observed.
    pub grade_changes: u64,
    /// Highest future grade reached.
    pub peak: Option<Grade>,
    /// Grade of the last settled (`Sustain`) pair.
    pub settled: Option<Grade>,
}

/// Counts ticks, overruns, and grade movement from trace events.
#[derive(Clone, Debug, Default)]
pub struct PacingTracker {
    ticks: u64,
    misses: u64,
    changes: u64,
    reversals: u64,
    sessions: u32,
    rising: Option<bool>,
    peak: Option<Grade>,
    settled: Option<Grade>,
}

impl PacingTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions started while observed.
    #[must_use]
    pub fn sessions(&self) -> u32 {
        self.sessions
    }

    /// Current report.
    #[must_use]
    pub fn report(&self) -> PacingReport {
        let per_1000 = |n: u64| {
            if self.ticks == 0 {
                0.0
            } else {
                n as f64 * 1000.0 / self.ticks as f64
            }
        };
        let misses_per_1000 = per_1000(self.misses);
        let reversals_per_1000 = per_1000(self.reversals);
        PacingReport {
            grade: grade_for(misses_per_1000, reversals_per_1000),
            misses_per_1000,
            reversals_per_1000,
            ticks: self.ticks,
            misses: self.misses,
            grade_changes: self.changes,
            peak: self.peak,
            settled: self.settled,
        }
    }
}

fn grade_for(misses_per_1000: f64, reversals_per_1000: f64) -> PacingGrade {
    if misses_per_1000 < 10.0 && reversals_per_1000 < 10.0 {
        PacingGrade::A
    } else if misses_per_1000 < 50.0 && reversals_per_1000 < 30.0 {
        PacingGrade::B
    } else if misses_per_1000 < 150.0 && reversals_per_1000 < 80.0 {
        PacingGrade::C
    } else {
        PacingGrade::D
    }
}

impl TraceSink for PacingTracker {
    fn on_session(&mut self, e: &SessionEvent) {
        if e.edge == SessionEdge::Started {
            self.sessions += 1;
            self.rising = None;
        }
    }

    fn on_leaf_play(&mut self, e: &LeafPlayEvent) {
        self.ticks += 1;
        if e.budget_left() < 0 {
            self.misses += 1;
        }
    }

    fn on_grade_change(&mut self, e: &GradeChangeEvent) {
        self.changes += 1;
        let (from, to) = (e.from.1, e.to.1);
        if to != from {
            let rising = to > from;
            if self.rising.is_some_and(|r| r != rising) {
                self.reversals += 1;
            }
            self.rising = Some(rising);
        }
        self.peak = Some(self.peak.map_or(to, |p| p.max(to)));
        if e.phase == Phase::Sustain {
            self.settled = Some(e.to.0);
        }
    }
}

/// A cloneable handle to a [`PacingTracker`], for installing as a driver's
/// sink while keeping read access.
#[derive(Clone, Debug, Default)]
pub struct SharedTracker(Rc<RefCell<PacingTracker>>);

impl SharedTracker {
    /// Creates a handle to an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current report.
    #[must_use]
    pub fn report(&self) -> PacingReport {
        self.0.borrow().report()
    }

    /// Sessions started while observed.
    #[must_use]
    pub fn sessions(&self) -> u32 {
        self.0.borrow().sessions()
    }
}

impl TraceSink for SharedTracker {
    fn on_session(&mut self, e: &SessionEvent) {
        self.0.borrow_mut().on_session(e);
    }

    fn on_leaf_play(&mut self, e: &LeafPlayEvent) {
        self.0.borrow_mut().on_leaf_play(e);
    }

    fn on_grade_change(&mut self, e: &GradeChangeEvent) {
        self.0.borrow_mut().on_grade_change(e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::grade::SessionId;
    use cadence_core::time::{Duration, HostTime};
    use cadence_core::tree::SchedTree;

    fn change(from: Grade, to: Grade, phase: Phase) -> GradeChangeEvent {
        GradeChangeEvent {
            session: SessionId(1),
            from: (from, from),
            to: (to, to),
            phase,
            timestamp: HostTime(0),
        }
    }

    #[test]
    fn miss_rate_accumulates() {
        let mut tree = SchedTree::new();
        let leaf = tree.scheduler(Duration::from_millis(16));
        let mut t = PacingTracker::new();
        for i in 0..10 {
            t.on_leaf_play(&LeafPlayEvent {
                leaf,
                session: SessionId(1),
                current: 0,
                future: 0,
                fired_at: HostTime(i * 16_000),
                cost: Duration::from_millis(if i < 2 { 20 } else { 4 }),
                period: Duration::from_millis(16),
            });
        }
        let r = t.report();
        assert!((r.misses_per_1000 - 200.0).abs() < 1e-6, "got {}", r.misses_per_1000);
        assert_eq!(r.grade, PacingGrade::D);
    }

    #[test]
    fn direction_flips_count_as_reversals() {
        let mut t = PacingTracker::new();
        t.on_grade_change(&change(0, 1, Phase::Trial));
        t.on_grade_change(&change(1, 2, Phase::Trial));
        t.on_grade_change(&change(2, 1, Phase::Transit));
        t.on_grade_change(&change(1, 1, Phase::Sustain));
        t.on_grade_change(&change(1, 2, Phase::Trial));

        let r = t.report();
        assert_eq!(r.grade_changes, 5);
        assert_eq!(r.peak, Some(2));
        assert_eq!(r.settled, Some(1));
        assert_eq!(t.reversals, 2);
    }
}
