// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated graphics whose drawing costs virtual time.

use alloc::vec::Vec;

use kurbo::Rect;

use cadence_core::canvas::{Canvas, GraphicId, Graphics};
use cadence_core::grade::GradeRange;
use cadence_core::time::Duration;
use cadence_core::tree::{NodeId, SchedTree};

use crate::clock::VirtualClock;

#[derive(Clone, Copy, Debug)]
struct SceneBox {
    bounds: Rect,
    cost: Duration,
    feedback: bool,
    alpha: f32,
}

/// A set of rectangles implementing [`Graphics`].
///
/// Drawing a box advances the shared [`VirtualClock`] by the box's cost,
/// scaled by the scene-wide load, so a policy measuring its ticks sees the
/// simulated work.
#[derive(Debug)]
pub struct BoxScene {
    clock: VirtualClock,
    boxes: Vec<SceneBox>,
    load_permille: u64,
    draws: u64,
}

impl BoxScene {
    /// Creates an empty scene charging draws to `clock`.
    #[must_use]
    pub fn new(clock: VirtualClock) -> Self {
        Self {
            clock,
            boxes: Vec::new(),
            load_permille: 1000,
            draws: 0,
        }
    }

    /// Adds a box that costs `cost` per draw.
    pub fn add(&mut self, bounds: Rect, cost: Duration) -> GraphicId {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "scenes hold far fewer than u32::MAX boxes"
        )]
        let id = GraphicId(self.boxes.len() as u32);
        self.boxes.push(SceneBox {
            bounds,
            cost,
            feedback: false,
            alpha: 1.0,
        });
        id
    }

    /// Changes the per-draw cost of a box.
    pub fn set_cost(&mut self, id: GraphicId, cost: Duration) -> bool {
        self.get_mut(id).map(|b| b.cost = cost).is_some()
    }

    /// Scales every draw cost by `permille / 1000`.
    pub fn set_load(&mut self, permille: u64) {
        self.load_permille = permille;
    }

    /// Moves a box.
    pub fn move_to(&mut self, id: GraphicId, bounds: Rect) -> bool {
        self.get_mut(id).map(|b| b.bounds = bounds).is_some()
    }

    /// Total draws so far.
    #[must_use]
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Whether a box is showing its feedback style.
    #[must_use]
    pub fn feedback(&self, id: GraphicId) -> bool {
        self.get(id).is_some_and(|b| b.feedback)
    }

    /// Last alpha applied to a box.
    #[must_use]
    pub fn alpha(&self, id: GraphicId) -> Option<f32> {
        self.get(id).map(|b| b.alpha)
    }

    fn get(&self, id: GraphicId) -> Option<&SceneBox> {
        self.boxes.get(id.0 as usize)
    }

    fn get_mut(&mut self, id: GraphicId) -> Option<&mut SceneBox> {
        self.boxes.get_mut(id.0 as usize)
    }
}

impl Graphics for BoxScene {
    fn draw(&mut self, id: GraphicId, _canvas: &mut dyn Canvas, _clip: Rect) {
        let Some(b) = self.get(id) else {
            return;
        };
        let scaled = b.cost.micros().saturating_mul(self.load_permille) / 1000;
        self.clock.advance(Duration::from_micros(scaled));
        self.draws += 1;
    }

    fn bounds(&self, id: GraphicId) -> Rect {
        self.get(id).map_or(Rect::ZERO, |b| b.bounds)
    }

    fn set_feedback(&mut self, id: GraphicId, on: bool) {
        if let Some(b) = self.get_mut(id) {
            b.feedback = on;
        }
    }

    fn set_alpha(&mut self, id: GraphicId, alpha: f32) {
        if let Some(b) = self.get_mut(id) {
            b.alpha = alpha;
        }
    }
}

/// Shape of a simulated drag gesture.
#[derive(Clone, Debug)]
pub struct Gesture {
    /// Number of dragged boxes, one periodic leaf each.
    pub boxes: usize,
    /// Tick period of every leaf.
    pub period: Duration,
    /// Draw cost of each quality level, lowest first. Level `g` is grade `g`.
    pub levels: Vec<Duration>,
}

impl Gesture {
    /// Builds the gesture into `tree` and `scene`; returns the root.
    ///
    /// ```text
    ///  Normalizer [0, levels - 1]
    ///    └─ Scheduler(period)         (one per box)
    ///         └─ Tiler [0, levels - 1]
    ///              └─ Redraw [0, 0]   (one per level)
    /// ```
    pub fn build(&self, tree: &mut SchedTree, scene: &mut BoxScene) -> NodeId {
        let root = tree.normalizer();
        for i in 0..self.boxes {
            let x = 40.0 * i as f64;
            let bounds = Rect::new(x, 0.0, x + 32.0, 32.0);
            let leaf = tree.scheduler(self.period);
            let tiler = tree.tiler();
            for &cost in &self.levels {
                let graphic = scene.add(bounds, cost);
                let level = tree.redraw(graphic, GradeRange::new(0, 0));
                tree.append(tiler, level);
            }
            tree.append(leaf, tiler);
            tree.append(root, leaf);
        }
        root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::RecordingCanvas;

    #[test]
    fn draw_charges_scaled_cost() {
        let clock = VirtualClock::new();
        let mut scene = BoxScene::new(clock.clone());
        let id = scene.add(Rect::new(0.0, 0.0, 8.0, 8.0), Duration::from_millis(2));
        let mut canvas = RecordingCanvas::new();
        scene.draw(id, &mut canvas, Rect::ZERO);
        scene.set_load(1500);
        scene.draw(id, &mut canvas, Rect::ZERO);
        scene.draw(GraphicId(9), &mut canvas, Rect::ZERO);
        assert_eq!(clock.now().micros(), 5_000);
        assert_eq!(scene.draws(), 2);
    }

    #[test]
    fn gesture_spans_one_grade_per_level() {
        let mut tree = SchedTree::new();
        let mut scene = BoxScene::new(VirtualClock::new());
        let gesture = Gesture {
            boxes: 3,
            period: Duration::from_millis(16),
            levels: alloc::vec![Duration::from_millis(1); 4],
        };
        let root = gesture.build(&mut tree, &mut scene);
        assert_eq!(tree.regrade(root), GradeRange::new(0, 3));
        let mut leaves = Vec::new();
        tree.collect_schedulers(root, &mut leaves);
        assert_eq!(leaves.len(), 3);
    }
}
