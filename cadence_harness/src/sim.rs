// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A complete host loop over virtual time.

use alloc::boxed::Box;
use core::fmt;

use cadence_core::driver::PaceMaker;
use cadence_core::keeper::PaceKeeper;
use cadence_core::time::Duration;
use cadence_core::tree::{NodeId, SchedTree, Stage};

use crate::canvas::RecordingCanvas;
use crate::clock::{ManualDispatcher, VirtualClock};
use crate::metrics::{PacingReport, SharedTracker};
use crate::scene::{BoxScene, Gesture};

/// A scene, its driver, and a virtual clock, run by firing due timers in
/// time order.
///
/// Graphics charge their draw cost to the clock, so a tick that draws more
/// than its period makes the next timers fire late, the same way a busy
/// host loop would.
pub struct Simulation {
    tree: SchedTree,
    canvas: RecordingCanvas,
    scene: BoxScene,
    pacer: PaceMaker<ManualDispatcher>,
    clock: VirtualClock,
    tracker: SharedTracker,
    fired: u64,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("now", &self.clock.now())
            .field("policy", &self.pacer.get_policy().name())
            .field("fired", &self.fired)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Creates an empty simulation driven by `keeper`.
    #[must_use]
    pub fn new(keeper: Box<dyn PaceKeeper>) -> Self {
        let clock = VirtualClock::new();
        let tracker = SharedTracker::new();
        let mut pacer = PaceMaker::new(ManualDispatcher::new(clock.clone()), keeper);
        pacer.set_trace_sink(Some(Box::new(tracker.clone())));
        Self {
            tree: SchedTree::new(),
            canvas: RecordingCanvas::new(),
            scene: BoxScene::new(clock.clone()),
            pacer,
            clock,
            tracker,
            fired: 0,
        }
    }

    /// Builds `gesture` into the scene; returns its root.
    pub fn build(&mut self, gesture: &Gesture) -> NodeId {
        gesture.build(&mut self.tree, &mut self.scene)
    }

    /// The scheduling tree.
    #[must_use]
    pub fn tree(&self) -> &SchedTree {
        &self.tree
    }

    /// Mutable access to the scheduling tree.
    pub fn tree_mut(&mut self) -> &mut SchedTree {
        &mut self.tree
    }

    /// The simulated graphics.
    #[must_use]
    pub fn scene(&self) -> &BoxScene {
        &self.scene
    }

    /// Mutable access to the simulated graphics.
    pub fn scene_mut(&mut self) -> &mut BoxScene {
        &mut self.scene
    }

    /// The recording canvas.
    #[must_use]
    pub fn canvas(&self) -> &RecordingCanvas {
        &self.canvas
    }

    /// The driver.
    #[must_use]
    pub fn pacer(&self) -> &PaceMaker<ManualDispatcher> {
        &self.pacer
    }

    /// The shared virtual clock.
    #[must_use]
    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    /// Timers fired so far.
    #[must_use]
    pub fn fired(&self) -> u64 {
        self.fired
    }

    /// Pacing metrics gathered from the driver's trace events.
    #[must_use]
    pub fn report(&self) -> PacingReport {
        self.tracker.report()
    }

    /// Sessions started so far.
    #[must_use]
    pub fn sessions(&self) -> u32 {
        self.tracker.sessions()
    }

    /// Starts a session over `root`; returns the number of leaves started.
    pub fn start(&mut self, root: NodeId) -> usize {
        let mut stage = Stage::new(&mut self.tree, &mut self.canvas, &mut self.scene);
        self.pacer.start_all(&mut stage, root)
    }

    /// Stops the session.
    pub fn stop(&mut self) {
        let mut stage = Stage::new(&mut self.tree, &mut self.canvas, &mut self.scene);
        self.pacer.stop_all(&mut stage);
    }

    /// Swaps the control policy; returns the previous one.
    pub fn set_policy(&mut self, keeper: Box<dyn PaceKeeper>) -> Box<dyn PaceKeeper> {
        let mut stage = Stage::new(&mut self.tree, &mut self.canvas, &mut self.scene);
        self.pacer.set_policy(&mut stage, keeper)
    }

    /// Suspends the session.
    pub fn pause(&mut self) {
        self.pacer.pause();
    }

    /// Resumes the session.
    pub fn resume(&mut self) {
        self.pacer.resume();
    }

    /// Fires every timer due within `span` from now, in due order, then
    /// moves the clock to the end of the span. Returns the number fired.
    pub fn run_for(&mut self, span: Duration) -> u64 {
        let horizon = self.clock.now() + span;
        let before = self.fired;
        while let Some((token, due)) = self.pacer.dispatcher_mut().pop_due(horizon) {
            self.clock.advance_to(due);
            let now = self.clock.now();
            let mut stage = Stage::new(&mut self.tree, &mut self.canvas, &mut self.scene);
            self.pacer.fire(&mut stage, token, now);
            self.fired += 1;
        }
        self.clock.advance_to(horizon);
        self.fired - before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::keeper::{
        CoherenceGate, CoherenceKeeper, DampedGate, DampedKeeper, DampingConfig, EventGate,
        EventKeeper, KeeperConfig, PCKeeper, PenaltyCreditGate, Phase,
    };

    use crate::metrics::PacingGrade;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn gesture(levels: &[u64]) -> Gesture {
        Gesture {
            boxes: 2,
            period: ms(16),
            levels: levels.iter().map(|&v| ms(v)).collect(),
        }
    }

    fn damped() -> Box<dyn PaceKeeper> {
        let gate = DampedGate::new(DampingConfig {
            increase: 4,
            ..DampingConfig::additive()
        });
        Box::new(DampedKeeper::new(
            KeeperConfig::interactive().starting_at(2),
            gate,
        ))
    }

    #[test]
    fn climbs_to_full_quality_under_slack() {
        let mut sim = Simulation::new(Box::new(EventKeeper::default()));
        let root = sim.build(&gesture(&[1, 2, 3]));
        assert_eq!(sim.start(root), 2);
        sim.run_for(ms(1_000));

        let policy = sim.pacer().get_policy();
        assert_eq!((policy.current(), policy.future()), (2, 2));
        assert_eq!(policy.phase(), Phase::Sustain);
        let report = sim.report();
        assert_eq!(report.settled, Some(2));
        assert_eq!(report.misses, 0);
        assert_eq!(report.grade, PacingGrade::A);
    }

    #[test]
    fn sheds_quality_under_load() {
        let mut sim = Simulation::new(damped());
        let root = sim.build(&gesture(&[10, 20, 30]));
        sim.start(root);
        sim.run_for(ms(3_000));

        let report = sim.report();
        assert_eq!(report.settled, Some(0));
        assert!(sim.pacer().get_policy().current() <= 1, "stayed near the floor");
    }

    #[test]
    fn coherence_climbs_on_steady_costs() {
        let mut sim = Simulation::new(Box::new(CoherenceKeeper::new(
            KeeperConfig::interactive(),
            CoherenceGate::default(),
        )));
        let root = sim.build(&gesture(&[1, 2, 3]));
        sim.start(root);
        sim.run_for(ms(1_000));

        let policy = sim.pacer().get_policy();
        assert_eq!(policy.name(), "coherence");
        assert_eq!((policy.current(), policy.future()), (2, 2));
        let report = sim.report();
        assert_eq!(report.settled, Some(2));
        assert_eq!(report.misses, 0);
    }

    #[test]
    fn penalty_credit_sheds_quality_under_load() {
        let mut sim = Simulation::new(Box::new(PCKeeper::new(
            KeeperConfig::interactive().starting_at(2),
            PenaltyCreditGate::default(),
        )));
        let root = sim.build(&gesture(&[10, 20, 30]));
        sim.start(root);
        sim.run_for(ms(3_000));

        assert_eq!(sim.pacer().get_policy().name(), "penalty-credit");
        assert_eq!(sim.report().settled, Some(0));
        assert!(sim.pacer().get_policy().current() <= 1, "stayed near the floor");
    }

    #[test]
    fn damping_churns_less_than_plain_events() {
        let run = |keeper: Box<dyn PaceKeeper>| {
            let mut sim = Simulation::new(keeper);
            let root = sim.build(&gesture(&[10, 20, 30]));
            sim.start(root);
            sim.run_for(ms(5_000));
            sim.report().grade_changes
        };
        let event = run(Box::new(EventKeeper::new(
            KeeperConfig::interactive().starting_at(2),
            EventGate,
        )));
        let damped = run(damped());
        assert!(damped < event, "damped {damped} vs event {event}");
    }

    #[test]
    fn pause_stops_all_timers_until_resume() {
        let mut sim = Simulation::new(Box::new(EventKeeper::default()));
        let root = sim.build(&gesture(&[1, 2, 3]));
        sim.start(root);
        sim.run_for(ms(100));
        let logical = sim.pacer().now();

        sim.pause();
        assert_eq!(sim.pacer().dispatcher().pending(), 0);
        assert_eq!(sim.run_for(ms(1_000)), 0);
        assert_eq!(sim.pacer().now(), logical);

        sim.resume();
        assert!(sim.run_for(ms(100)) > 0, "ticks resume");
        assert_eq!(sim.report().misses, 0);
    }

    #[test]
    fn stop_and_restart_leave_nothing_behind() {
        let mut sim = Simulation::new(Box::new(EventKeeper::default()));
        let root = sim.build(&gesture(&[1, 2]));
        sim.start(root);
        sim.run_for(ms(200));

        sim.stop();
        sim.stop();
        assert_eq!(sim.pacer().dispatcher().pending(), 0);
        assert_eq!(sim.run_for(ms(200)), 0);

        assert_eq!(sim.start(root), 2);
        assert_eq!(sim.sessions(), 2);
        assert!(sim.run_for(ms(100)) > 0, "new session ticks");
    }

    #[test]
    fn policy_swap_keeps_session_running() {
        let mut sim = Simulation::new(Box::new(EventKeeper::default()));
        let root = sim.build(&gesture(&[1, 2, 3]));
        sim.start(root);
        sim.run_for(ms(100));
        let old = sim.set_policy(damped());
        assert_eq!(old.name(), "event");
        assert_eq!(sim.pacer().get_policy().current(), 2);
        let draws = sim.scene().draws();
        sim.run_for(ms(100));
        assert!(sim.scene().draws() > draws, "new policy plays");
        assert!(!sim.canvas().ops().is_empty(), "repairs reach the canvas");
    }
}
