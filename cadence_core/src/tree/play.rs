// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One traversal of the tree for one tick.

use alloc::vec::Vec;
use core::fmt;

use kurbo::Rect;

use crate::canvas::{Buffer, Canvas, Graphics};
use crate::damage::DamageBox;
use crate::grade::{FadeKind, RunTime};
use crate::sharing::Delegation;
use crate::time::Duration;
use crate::timer::Arming;

use super::id::{INVALID, NodeId};
use super::node::{NodeKind, RepairLeaf, RepairStyle};
use super::store::SchedTree;

/// Everything a tick may touch besides the tree itself.
pub struct PlayCx<'a> {
    pub(crate) canvas: &'a mut dyn Canvas,
    pub(crate) graphics: &'a mut dyn Graphics,
    pub(crate) arming: Arming<'a>,
    /// Periodic leaves whose period changed during the traversal, with
    /// their previous period.
    pub(crate) adjusted: &'a mut Vec<(NodeId, Duration)>,
    /// A repair committed the shared damage during the traversal.
    committed: bool,
}

impl fmt::Debug for PlayCx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayCx")
            .field("arming", &self.arming)
            .field("adjusted", &self.adjusted)
            .field("committed", &self.committed)
            .finish_non_exhaustive()
    }
}

impl<'a> PlayCx<'a> {
    /// Bundles the collaborators of one traversal.
    pub fn new(
        canvas: &'a mut dyn Canvas,
        graphics: &'a mut dyn Graphics,
        arming: Arming<'a>,
        adjusted: &'a mut Vec<(NodeId, Duration)>,
    ) -> Self {
        Self {
            canvas,
            graphics,
            arming,
            adjusted,
            committed: false,
        }
    }
}

/// The host-owned scene a driver plays into: the tree plus its drawing
/// collaborators, borrowed for one callback.
pub struct Stage<'a> {
    /// Scheduling tree.
    pub tree: &'a mut SchedTree,
    /// Drawing surface.
    pub canvas: &'a mut dyn Canvas,
    /// Drawable graphics.
    pub graphics: &'a mut dyn Graphics,
}

impl fmt::Debug for Stage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("tree", &self.tree)
            .finish_non_exhaustive()
    }
}

impl<'a> Stage<'a> {
    /// Borrows a tree and its collaborators.
    pub fn new(
        tree: &'a mut SchedTree,
        canvas: &'a mut dyn Canvas,
        graphics: &'a mut dyn Graphics,
    ) -> Self {
        Self {
            tree,
            canvas,
            graphics,
        }
    }
}

fn union(a: Rect, b: Rect) -> Rect {
    let mut d = DamageBox::EMPTY;
    d.add(a);
    d.add(b);
    d.rect().unwrap_or(Rect::ZERO)
}

fn is_empty(r: Rect) -> bool {
    r.area() <= 0.0
}

impl SchedTree {
    /// Plays one tick through the subtree rooted at `node`.
    ///
    /// Every node sees the same `tick` unless a grade-sharing strategy
    /// derives a rescaled copy for its children. Shared damage is cleared
    /// once a repair in this traversal has committed it.
    pub fn play(&mut self, node: NodeId, tick: &RunTime, cx: &mut PlayCx<'_>) {
        if !self.is_alive(node) {
            return;
        }
        self.play_idx(node.idx, tick, cx);
        if cx.committed {
            self.damage.clear();
            cx.committed = false;
        }
    }

    fn play_slot(&mut self, child: u32, tick: &RunTime, cx: &mut PlayCx<'_>) {
        if child != INVALID {
            self.play_idx(child, tick, cx);
        }
    }

    fn play_idx(&mut self, idx: u32, tick: &RunTime, cx: &mut PlayCx<'_>) {
        let i = idx as usize;
        let fade = tick.fade(self.grades[i]);
        match &mut self.kind[i] {
            NodeKind::Vacant => {}
            NodeKind::Multi { children, sharing } => {
                let ranges: Vec<_> = children.iter().map(|&c| self.grades[c as usize]).collect();
                let mut out: Vec<Delegation> = Vec::new();
                sharing.play(tick, &ranges, &mut out);
                let plan: Vec<(u32, RunTime)> = out
                    .iter()
                    .filter_map(|d| children.get(d.index).map(|&c| (c, d.tick)))
                    .collect();
                for (child, sub) in plan {
                    self.play_idx(child, &sub, cx);
                }
            }
            NodeKind::Single { child } => {
                let child = *child;
                self.play_slot(child, tick, cx);
            }
            NodeKind::Scheduler { child, period } => {
                if !fade.is_live() {
                    return;
                }
                let (child, period) = (*child, *period);
                cx.arming.continue_leaf(self.id_of(idx), period);
                self.play_slot(child, tick, cx);
            }
            NodeKind::UiScheduler(leaf) => {
                if !fade.is_live() {
                    return;
                }
                let before = leaf.rate.period();
                if !leaf.fresh {
                    leaf.rate.relax();
                }
                leaf.fresh = false;
                let (child, period) = (leaf.child, leaf.rate.period());
                let id = self.id_of(idx);
                if period != before {
                    cx.adjusted.push((id, before));
                }
                cx.arming.continue_leaf(id, period);
                self.play_slot(child, tick, cx);
            }
            NodeKind::ActionPacer { child, before, .. } => {
                let child = *child;
                if let Some(action) = before {
                    action.run(tick, &mut *cx.graphics);
                }
                self.play_slot(child, tick, cx);
                if let NodeKind::ActionPacer {
                    after: Some(action),
                    ..
                } = &mut self.kind[i]
                {
                    action.run(tick, &mut *cx.graphics);
                }
            }
            NodeKind::Repair(leaf) => {
                if !fade.is_live() {
                    return;
                }
                let mut leaf = *leaf;
                self.play_repair(&mut leaf, fade, tick, cx);
                if let NodeKind::Repair(slot) = &mut self.kind[i] {
                    slot.last = leaf.last;
                    slot.drawn = leaf.drawn;
                }
            }
        }
    }

    fn play_repair(
        &mut self,
        leaf: &mut RepairLeaf,
        fade: FadeKind,
        tick: &RunTime,
        cx: &mut PlayCx<'_>,
    ) {
        let shows = fade.shows();
        let bounds = leaf
            .graphic
            .map_or(Rect::ZERO, |g| cx.graphics.bounds(g));
        match leaf.style {
            RepairStyle::Redraw => {
                if !is_empty(leaf.last) && (!shows || leaf.last != bounds) {
                    cx.canvas.fill(leaf.last);
                }
                leaf.last = Rect::ZERO;
                if let (true, Some(g)) = (shows, leaf.graphic) {
                    cx.canvas.push_clip(bounds);
                    cx.graphics.draw(g, &mut *cx.canvas, bounds);
                    cx.canvas.pop_clip();
                    leaf.last = bounds;
                }
            }
            RepairStyle::Fill => {
                if !is_empty(leaf.last) {
                    cx.canvas.fill(leaf.last);
                    self.damage.fill.add(leaf.last);
                }
                leaf.last = if shows { bounds } else { Rect::ZERO };
            }
            RepairStyle::Repair => {
                if let (true, Some(g)) = (shows, leaf.graphic) {
                    let clip = union(self.damage.combined().rect().unwrap_or(Rect::ZERO), bounds);
                    cx.canvas.push_clip(clip);
                    cx.graphics.draw(g, &mut *cx.canvas, clip);
                    cx.canvas.pop_clip();
                    self.damage.repair.add(bounds);
                    cx.committed = true;
                }
            }
            RepairStyle::FillRedraw => {
                let area = if shows {
                    union(leaf.last, bounds)
                } else {
                    leaf.last
                };
                if is_empty(area) {
                    return;
                }
                cx.canvas.select_buffer(Buffer::Back);
                if !is_empty(leaf.last) {
                    cx.canvas.fill(leaf.last);
                }
                leaf.last = Rect::ZERO;
                if let (true, Some(g)) = (shows, leaf.graphic) {
                    cx.canvas.push_clip(area);
                    cx.graphics.draw(g, &mut *cx.canvas, area);
                    cx.canvas.pop_clip();
                    leaf.last = bounds;
                }
                cx.canvas.swap_buffers(area);
                cx.canvas.select_buffer(Buffer::Front);
                cx.canvas.flush();
            }
            RepairStyle::Select => {
                let feedback = shows.then_some(leaf.graphic).flatten();
                if let Some(g) = feedback {
                    cx.graphics.set_feedback(g, true);
                    cx.graphics.set_alpha(g, leaf.alpha);
                }
                self.play_slot(leaf.child, tick, cx);
                if let Some(g) = feedback {
                    cx.graphics.set_feedback(g, false);
                }
            }
            RepairStyle::Clipper => {
                let mut pending = self.damage.combined();
                if let Some(host) = cx.canvas.damage() {
                    pending.add(host);
                }
                let Some(clip) = pending.rect() else {
                    return;
                };
                cx.canvas.push_clip(clip);
                self.play_slot(leaf.child, tick, cx);
                cx.canvas.pop_clip();
                cx.canvas.clear_damage();
                cx.committed = true;
            }
            RepairStyle::Xor => {
                if leaf.drawn {
                    cx.canvas.xor_rect(leaf.last);
                    leaf.drawn = false;
                    leaf.last = Rect::ZERO;
                }
                if shows && !is_empty(bounds) {
                    cx.canvas.xor_rect(bounds);
                    leaf.drawn = true;
                    leaf.last = bounds;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use super::*;
    use crate::canvas::GraphicId;
    use crate::grade::{Grade, GradeRange, SessionId};
    use crate::testing::{CanvasOp, NullGraphics, RecordingCanvas, TestDispatcher};
    use crate::time::HostTime;
    use crate::timer::{TimerSlots, TimerToken};

    fn tick(current: Grade, future: Grade) -> RunTime {
        RunTime {
            current,
            future,
            session: SessionId(1),
            period: Duration::from_millis(16),
            timestamp: HostTime(0),
        }
    }

    fn r(low: Grade, high: Grade) -> GradeRange {
        GradeRange::new(low, high)
    }

    struct Rig {
        dispatcher: TestDispatcher,
        slots: TimerSlots,
        canvas: RecordingCanvas,
        graphics: NullGraphics,
        adjusted: Vec<(NodeId, Duration)>,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                dispatcher: TestDispatcher::default(),
                slots: TimerSlots::new(),
                canvas: RecordingCanvas::default(),
                graphics: NullGraphics::default(),
                adjusted: Vec::new(),
            }
        }

        fn play(&mut self, tree: &mut SchedTree, node: NodeId, t: &RunTime) {
            let arming = Arming::new(&mut self.dispatcher, &mut self.slots);
            let mut cx = PlayCx::new(
                &mut self.canvas,
                &mut self.graphics,
                arming,
                &mut self.adjusted,
            );
            tree.play(node, t, &mut cx);
        }
    }

    #[test]
    fn tiler_hand_off_draws_and_erases_once() {
        let mut tree = SchedTree::new();
        let root = tree.tiler();
        let a = tree.redraw(GraphicId(1), r(0, 2));
        let b = tree.redraw(GraphicId(2), r(3, 5));
        tree.append(root, a);
        tree.append(root, b);
        tree.regrade(root);

        let mut rig = Rig::new();
        rig.graphics.set_bounds(GraphicId(1), Rect::new(0.0, 0.0, 10.0, 10.0));
        rig.graphics.set_bounds(GraphicId(2), Rect::new(20.0, 0.0, 30.0, 10.0));

        rig.play(&mut tree, root, &tick(2, 2));
        assert_eq!(rig.graphics.draws, vec![GraphicId(1)]);

        rig.play(&mut tree, root, &tick(2, 3));
        assert_eq!(rig.graphics.draws, vec![GraphicId(1), GraphicId(2)]);
        assert!(
            rig.canvas
                .ops
                .contains(&CanvasOp::Fill(Rect::new(0.0, 0.0, 10.0, 10.0))),
            "first tile erased on fade-out"
        );
    }

    #[test]
    fn scheduler_rearms_only_when_live() {
        let mut tree = SchedTree::new();
        let s = tree.scheduler(Duration::from_millis(16));
        let leaf = tree.redraw(GraphicId(1), r(0, 0));
        tree.append(s, leaf);
        tree.regrade(s);

        let mut rig = Rig::new();
        rig.slots.mark_started(s);
        rig.play(&mut tree, s, &tick(0, 0));
        assert_eq!(rig.dispatcher.pending.len(), 1);
        assert_eq!(rig.dispatcher.pending[0].2, TimerToken::Leaf(s));

        rig.dispatcher.pending.clear();
        rig.slots.expired(s);
        rig.play(&mut tree, s, &tick(3, 3));
        assert!(rig.dispatcher.pending.is_empty(), "dormant outside its range");
    }

    #[test]
    fn fill_then_repair_commits_damage() {
        let mut tree = SchedTree::new();
        let root = tree.distributor();
        let fill = tree.filler(GraphicId(1), r(0, 0));
        let repair = tree.repairer(GraphicId(1), r(0, 0));
        tree.append(root, fill);
        tree.append(root, repair);
        tree.regrade(root);

        let mut rig = Rig::new();
        let first = Rect::new(0.0, 0.0, 10.0, 10.0);
        rig.graphics.set_bounds(GraphicId(1), first);
        rig.play(&mut tree, root, &tick(0, 0));
        assert!(tree.damage().combined().is_empty(), "repair cleared the ledger");

        rig.graphics.set_bounds(GraphicId(1), Rect::new(5.0, 0.0, 15.0, 10.0));
        rig.play(&mut tree, root, &tick(0, 0));
        assert!(rig.canvas.ops.contains(&CanvasOp::Fill(first)));
        assert!(
            rig.canvas
                .ops
                .contains(&CanvasOp::PushClip(Rect::new(0.0, 0.0, 15.0, 10.0))),
            "redraw covers erased and new footprint"
        );
    }

    #[test]
    fn xor_keeps_one_outline_pending() {
        let mut tree = SchedTree::new();
        let x = tree.xor(GraphicId(1), r(0, 0));
        tree.regrade(x);
        let mut rig = Rig::new();
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(1.0, 1.0, 11.0, 11.0);

        rig.graphics.set_bounds(GraphicId(1), a);
        rig.play(&mut tree, x, &tick(0, 0));
        rig.graphics.set_bounds(GraphicId(1), b);
        rig.play(&mut tree, x, &tick(0, 0));
        rig.play(&mut tree, x, &tick(0, 1));

        let xors: Vec<Rect> = rig
            .canvas
            .ops
            .iter()
            .filter_map(|op| match op {
                CanvasOp::Xor(r) => Some(*r),
                _ => None,
            })
            .collect();
        assert_eq!(xors, [a, a, b, b], "each outline drawn once and undrawn once");
    }

    #[test]
    fn fill_redraw_goes_through_back_buffer() {
        let mut tree = SchedTree::new();
        let fc = tree.fill_redraw(GraphicId(1), r(0, 0));
        tree.regrade(fc);
        let mut rig = Rig::new();
        rig.graphics.set_bounds(GraphicId(1), Rect::new(0.0, 0.0, 4.0, 4.0));
        rig.play(&mut tree, fc, &tick(0, 0));
        assert_eq!(rig.canvas.ops.first(), Some(&CanvasOp::Select(Buffer::Back)));
        assert!(rig.canvas.ops.contains(&CanvasOp::Swap(Rect::new(0.0, 0.0, 4.0, 4.0))));
        assert_eq!(rig.canvas.ops.last(), Some(&CanvasOp::Flush));
    }

    #[test]
    fn clipper_skips_without_damage() {
        let mut tree = SchedTree::new();
        let clip = tree.clipper(r(0, 0));
        let inner = tree.redraw(GraphicId(1), r(0, 0));
        tree.append(clip, inner);
        tree.regrade(clip);
        let mut rig = Rig::new();
        rig.graphics.set_bounds(GraphicId(1), Rect::new(0.0, 0.0, 4.0, 4.0));

        rig.play(&mut tree, clip, &tick(0, 0));
        assert!(rig.graphics.draws.is_empty());

        rig.canvas.host_damage = Some(Rect::new(0.0, 0.0, 2.0, 2.0));
        rig.play(&mut tree, clip, &tick(0, 0));
        assert_eq!(rig.graphics.draws, vec![GraphicId(1)]);
        assert_eq!(rig.canvas.host_damage, None, "host damage cleared");
    }

    #[test]
    fn select_toggles_feedback_around_child() {
        let mut tree = SchedTree::new();
        let sel = tree.select(GraphicId(7), r(0, 1), 0.5);
        tree.regrade(sel);
        let mut rig = Rig::new();
        rig.play(&mut tree, sel, &tick(1, 1));
        assert_eq!(rig.graphics.feedback, vec![(GraphicId(7), true), (GraphicId(7), false)]);
        assert_eq!(rig.graphics.alpha, Some(0.5));
    }

    #[test]
    fn action_pacer_brackets_child() {
        let mut tree = SchedTree::new();
        let before = |_: &RunTime, g: &mut dyn Graphics| g.set_alpha(GraphicId(0), 0.25);
        let after = |_: &RunTime, g: &mut dyn Graphics| g.set_alpha(GraphicId(0), 1.0);
        let pacer = tree.action_pacer(
            Some(alloc::boxed::Box::new(before)),
            Some(alloc::boxed::Box::new(after)),
        );
        let leaf = tree.redraw(GraphicId(1), r(0, 0));
        tree.append(pacer, leaf);
        tree.regrade(pacer);
        let mut rig = Rig::new();
        rig.play(&mut tree, pacer, &tick(0, 0));
        assert_eq!(rig.graphics.alpha, Some(1.0));
        assert_eq!(rig.graphics.draws, vec![GraphicId(1)]);
    }
}
