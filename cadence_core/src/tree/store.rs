// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arena storage, node construction, topology, and grade caches.

use alloc::boxed::Box;
use alloc::vec::Vec;

use understory_dirty::{CycleHandling, DirtyTracker, EagerPolicy};

use crate::canvas::GraphicId;
use crate::damage::DamageLedger;
use crate::dirty;
use crate::grade::GradeRange;
use crate::pointer::{PointerEvent, PointerRate};
use crate::sharing::{Distributor, GradeSharing, Normalizer, Tiler};
use crate::time::Duration;

use super::id::{INVALID, NodeId};
use super::node::{Action, NodeKind, RepairLeaf, RepairStyle, UiLeaf};

/// Arena of scheduling nodes for one gesture.
///
/// Nodes are addressed by [`NodeId`] handles. A parent exclusively owns its
/// children: [`destroy`](Self::destroy) takes the whole subtree with it. The
/// parent link kept by each child is only an index used to invalidate grade
/// caches upward; it never owns anything.
///
/// Every operation on a stale handle, a missing child, or an out-of-range
/// index is a no-op that returns `None` or `false`.
///
/// # Grade caches
///
/// Each node caches its `[low, high]`. Structural mutations leave caches
/// stale; call [`regrade`](Self::regrade) on the subtree root (or
/// [`regrade_stale`](Self::regrade_stale)) before playing.
#[derive(Debug)]
pub struct SchedTree {
    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) kind: Vec<NodeKind>,

    // -- Cached grades --
    pub(crate) grades: Vec<GradeRange>,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,

    // -- Dirty tracking --
    pub(crate) dirty: DirtyTracker<u32>,

    // -- Shared repair accumulators --
    pub(crate) damage: DamageLedger,
}

impl Default for SchedTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parent: Vec::new(),
            kind: Vec::new(),
            grades: Vec::new(),
            generation: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            damage: DamageLedger::default(),
        }
    }

    // -- Allocation --

    fn create(&mut self, kind: NodeKind, grades: GradeRange) -> NodeId {
        let idx = if let Some(idx) = self.free_list.pop() {
            self.parent[idx as usize] = INVALID;
            self.kind[idx as usize] = kind;
            self.grades[idx as usize] = grades;
            idx
        } else {
            let idx = self.len;
            self.len += 1;
            self.parent.push(INVALID);
            self.kind.push(kind);
            self.grades.push(grades);
            self.generation.push(0);
            idx
        };
        NodeId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Returns whether the handle refers to a live node.
    #[must_use]
    pub fn is_alive(&self, id: NodeId) -> bool {
        id.idx < self.len
            && self.generation[id.idx as usize] == id.generation
            && !matches!(self.kind[id.idx as usize], NodeKind::Vacant)
    }

    pub(crate) fn live(&self, id: NodeId) -> Option<usize> {
        self.is_alive(id).then_some(id.idx as usize)
    }

    pub(crate) fn id_of(&self, idx: u32) -> NodeId {
        NodeId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    // -- Construction --

    /// Creates a multi-child node sharing its axis with `sharing`.
    pub fn multi(&mut self, sharing: impl GradeSharing + 'static) -> NodeId {
        self.create(
            NodeKind::Multi {
                children: Vec::new(),
                sharing: Box::new(sharing),
            },
            GradeRange::UNSET,
        )
    }

    /// Creates a multi-child node whose children are tiled end to end.
    pub fn tiler(&mut self) -> NodeId {
        self.multi(Tiler::new())
    }

    /// Creates a multi-child node whose children move in lockstep.
    pub fn normalizer(&mut self) -> NodeId {
        self.multi(Normalizer)
    }

    /// Creates a multi-child node whose children gate independently.
    pub fn distributor(&mut self) -> NodeId {
        self.multi(Distributor)
    }

    /// Creates a forwarding node with an empty slot.
    pub fn single(&mut self) -> NodeId {
        self.create(NodeKind::Single { child: INVALID }, GradeRange::UNSET)
    }

    /// Creates a periodic leaf that re-arms itself every `period`.
    pub fn scheduler(&mut self, period: Duration) -> NodeId {
        self.create(
            NodeKind::Scheduler {
                child: INVALID,
                period,
            },
            GradeRange::UNSET,
        )
    }

    /// Creates a periodic leaf whose period follows pointer motion.
    pub fn ui_scheduler(&mut self, rate: impl PointerRate + 'static) -> NodeId {
        self.create(
            NodeKind::UiScheduler(UiLeaf {
                child: INVALID,
                rate: Box::new(rate),
                tracking: false,
                fresh: false,
            }),
            GradeRange::UNSET,
        )
    }

    /// Creates a node that runs `before` and `after` around its child.
    pub fn action_pacer(
        &mut self,
        before: Option<Box<dyn Action>>,
        after: Option<Box<dyn Action>>,
    ) -> NodeId {
        self.create(
            NodeKind::ActionPacer {
                child: INVALID,
                before,
                after,
            },
            GradeRange::UNSET,
        )
    }

    /// Creates a repair leaf drawing `graphic` while the tick is in `range`.
    ///
    /// [`RepairStyle::Clipper`] ignores the graphic; [`RepairStyle::Select`]
    /// and [`RepairStyle::Clipper`] take a child through
    /// [`append`](Self::append).
    pub fn repair_leaf(
        &mut self,
        style: RepairStyle,
        graphic: Option<GraphicId>,
        range: GradeRange,
    ) -> NodeId {
        self.create(NodeKind::Repair(RepairLeaf::new(style, range, graphic)), range)
    }

    /// Direct clipped redraw of `graphic`.
    pub fn redraw(&mut self, graphic: GraphicId, range: GradeRange) -> NodeId {
        self.repair_leaf(RepairStyle::Redraw, Some(graphic), range)
    }

    /// Erase half of the fill-then-redraw pair.
    pub fn filler(&mut self, graphic: GraphicId, range: GradeRange) -> NodeId {
        self.repair_leaf(RepairStyle::Fill, Some(graphic), range)
    }

    /// Redraw half of the fill-then-redraw pair.
    pub fn repairer(&mut self, graphic: GraphicId, range: GradeRange) -> NodeId {
        self.repair_leaf(RepairStyle::Repair, Some(graphic), range)
    }

    /// Flicker-free erase and redraw through the back buffer.
    pub fn fill_redraw(&mut self, graphic: GraphicId, range: GradeRange) -> NodeId {
        self.repair_leaf(RepairStyle::FillRedraw, Some(graphic), range)
    }

    /// Selection feedback on `graphic` with blending `alpha`.
    pub fn select(&mut self, graphic: GraphicId, range: GradeRange, alpha: f32) -> NodeId {
        let id = self.repair_leaf(RepairStyle::Select, Some(graphic), range);
        if let NodeKind::Repair(leaf) = &mut self.kind[id.idx as usize] {
            leaf.alpha = alpha;
        }
        id
    }

    /// Damage-clipped repaint of a whole subtree.
    pub fn clipper(&mut self, range: GradeRange) -> NodeId {
        self.repair_leaf(RepairStyle::Clipper, None, range)
    }

    /// Rubber-band outline of `graphic`'s bounds.
    pub fn xor(&mut self, graphic: GraphicId, range: GradeRange) -> NodeId {
        self.repair_leaf(RepairStyle::Xor, Some(graphic), range)
    }

    /// Replaces the grade-sharing strategy of a multi-child node.
    ///
    /// Marks the node stale. Returns `false` if `node` is not multi-child.
    pub fn set_sharing(&mut self, node: NodeId, sharing: Box<dyn GradeSharing>) -> bool {
        let Some(i) = self.live(node) else {
            return false;
        };
        let NodeKind::Multi { sharing: slot, .. } = &mut self.kind[i] else {
            return false;
        };
        *slot = sharing;
        self.mark_stale(node.idx);
        true
    }

    // -- Destruction --

    /// Destroys `node` and its whole subtree, detaching it from its parent
    /// first. All handles into the subtree become stale.
    pub fn destroy(&mut self, node: NodeId) -> bool {
        if !self.is_alive(node) {
            return false;
        }
        if let Some(parent) = self.parent(node) {
            self.detach(parent.idx, node.idx);
        }
        self.destroy_subtree(node.idx);
        true
    }

    fn destroy_subtree(&mut self, idx: u32) {
        for child in self.kind[idx as usize].children() {
            self.destroy_subtree(child);
        }
        self.dirty.remove_key(idx);
        self.kind[idx as usize] = NodeKind::Vacant;
        self.parent[idx as usize] = INVALID;
        self.grades[idx as usize] = GradeRange::UNSET;
        self.generation[idx as usize] += 1;
        self.free_list.push(idx);
    }

    /// Destroys every child of `node`.
    pub fn delete_all(&mut self, node: NodeId) {
        for child in self.remove_all(node) {
            self.destroy_subtree(child.idx);
        }
    }

    // -- Topology --

    /// Returns the parent of a node, if any.
    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        let i = self.live(node)?;
        let p = self.parent[i];
        (p != INVALID).then(|| self.id_of(p))
    }

    /// Number of direct children.
    #[must_use]
    pub fn count(&self, node: NodeId) -> usize {
        self.live(node).map_or(0, |i| match &self.kind[i] {
            NodeKind::Multi { children, .. } => children.len(),
            kind => usize::from(kind.slot().is_some_and(|c| c != INVALID)),
        })
    }

    /// The `index`-th direct child.
    #[must_use]
    pub fn child(&self, node: NodeId, index: usize) -> Option<NodeId> {
        let i = self.live(node)?;
        let c = match &self.kind[i] {
            NodeKind::Multi { children, .. } => *children.get(index)?,
            kind => kind.slot().filter(|&c| c != INVALID && index == 0)?,
        };
        Some(self.id_of(c))
    }

    /// All direct children in order.
    #[must_use]
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.live(node).map_or_else(Vec::new, |i| {
            self.kind[i]
                .children()
                .into_iter()
                .map(|c| self.id_of(c))
                .collect()
        })
    }

    /// Adds `child` after the existing children of `parent`.
    ///
    /// Single-child shapes accept a child only into an empty slot.
    pub fn append(&mut self, parent: NodeId, child: NodeId) -> bool {
        let at = self.count(parent);
        self.insert(parent, at, child)
    }

    /// Adds `child` before the existing children of `parent`.
    pub fn prepend(&mut self, parent: NodeId, child: NodeId) -> bool {
        self.insert(parent, 0, child)
    }

    /// Inserts `child` at position `at` (`0..=count`).
    ///
    /// Returns `false` without changing anything if either handle is stale,
    /// `at` is out of range, `child` already has a parent, the parent has no
    /// room, or the insertion would create a cycle.
    pub fn insert(&mut self, parent: NodeId, at: usize, child: NodeId) -> bool {
        let (Some(p), Some(c)) = (self.live(parent), self.live(child)) else {
            return false;
        };
        if self.parent[c] != INVALID || self.is_ancestor(child.idx, parent.idx) {
            return false;
        }
        let attached = match &mut self.kind[p] {
            NodeKind::Multi { children, .. } => {
                if at > children.len() {
                    false
                } else {
                    children.insert(at, child.idx);
                    true
                }
            }
            kind => match kind.slot_mut() {
                Some(slot) if *slot == INVALID && at == 0 => {
                    *slot = child.idx;
                    true
                }
                _ => false,
            },
        };
        if attached {
            self.parent[c] = parent.idx;
            let _ = self.dirty.add_dependency(parent.idx, child.idx, dirty::GRADES);
            self.mark_stale(parent.idx);
        }
        attached
    }

    /// Detaches and returns the child at position `at`.
    pub fn remove(&mut self, parent: NodeId, at: usize) -> Option<NodeId> {
        let child = self.child(parent, at)?;
        self.detach(parent.idx, child.idx);
        Some(child)
    }

    /// Detaches and returns every child of `parent`.
    pub fn remove_all(&mut self, parent: NodeId) -> Vec<NodeId> {
        let children = self.children(parent);
        for child in &children {
            self.detach(parent.idx, child.idx);
        }
        children
    }

    fn detach(&mut self, p: u32, c: u32) {
        match &mut self.kind[p as usize] {
            NodeKind::Multi { children, .. } => children.retain(|&x| x != c),
            kind => {
                if let Some(slot) = kind.slot_mut() {
                    if *slot == c {
                        *slot = INVALID;
                    }
                }
            }
        }
        self.parent[c as usize] = INVALID;
        self.dirty.remove_dependency(p, c, dirty::GRADES);
        self.mark_stale(p);
    }

    fn is_ancestor(&self, candidate: u32, mut idx: u32) -> bool {
        loop {
            if idx == candidate {
                return true;
            }
            idx = self.parent[idx as usize];
            if idx == INVALID {
                return false;
            }
        }
    }

    /// Gathers every periodic leaf reachable from `node` (including `node`
    /// itself), in depth-first pre-order.
    pub fn collect_schedulers(&self, node: NodeId, out: &mut Vec<NodeId>) {
        if self.is_alive(node) {
            self.collect_from(node.idx, out);
        }
    }

    fn collect_from(&self, idx: u32, out: &mut Vec<NodeId>) {
        let kind = &self.kind[idx as usize];
        if kind.is_periodic() {
            out.push(self.id_of(idx));
        }
        for child in kind.children() {
            self.collect_from(child, out);
        }
    }

    // -- Grades --

    /// Cached grade range of `node`; [`GradeRange::UNSET`] for stale handles.
    #[must_use]
    pub fn grades(&self, node: NodeId) -> GradeRange {
        self.live(node).map_or(GradeRange::UNSET, |i| self.grades[i])
    }

    /// Recomputes the grade caches of the subtree rooted at `node`, children
    /// first, and returns the root's new range.
    pub fn regrade(&mut self, node: NodeId) -> GradeRange {
        if !self.is_alive(node) {
            return GradeRange::UNSET;
        }
        self.regrade_subtree(node.idx)
    }

    fn regrade_subtree(&mut self, idx: u32) -> GradeRange {
        for child in self.kind[idx as usize].children() {
            self.regrade_subtree(child);
        }
        self.regrade_local(idx)
    }

    /// Recomputes every cache invalidated by structural mutations since the
    /// last call, children before parents. Returns how many were recomputed.
    pub fn regrade_stale(&mut self) -> usize {
        let stale: Vec<u32> = self
            .dirty
            .drain(dirty::GRADES)
            .affected()
            .deterministic()
            .run()
            .collect();
        let mut n = 0;
        for idx in stale {
            if idx < self.len && !matches!(self.kind[idx as usize], NodeKind::Vacant) {
                self.regrade_local(idx);
                n += 1;
            }
        }
        n
    }

    /// Recomputes the cache of one node from its children's caches.
    fn regrade_local(&mut self, idx: u32) -> GradeRange {
        let ranges: Vec<GradeRange> = self.kind[idx as usize]
            .children()
            .iter()
            .map(|&c| self.grades[c as usize])
            .collect();
        let range = match &mut self.kind[idx as usize] {
            NodeKind::Vacant => GradeRange::UNSET,
            NodeKind::Multi { sharing, .. } => sharing.regrade(&ranges),
            NodeKind::Repair(leaf) => leaf.range,
            _ => ranges.first().copied().unwrap_or(GradeRange::UNSET),
        };
        self.grades[idx as usize] = range;
        range
    }

    fn mark_stale(&mut self, idx: u32) {
        self.dirty.mark_with(idx, dirty::GRADES, &EagerPolicy);
    }

    // -- Periodic leaves --

    /// Returns whether `node` is a periodic leaf.
    #[must_use]
    pub fn is_periodic(&self, node: NodeId) -> bool {
        self.live(node).is_some_and(|i| self.kind[i].is_periodic())
    }

    /// Current period of a periodic leaf.
    #[must_use]
    pub fn period(&self, node: NodeId) -> Option<Duration> {
        match &self.kind[self.live(node)?] {
            NodeKind::Scheduler { period, .. } => Some(*period),
            NodeKind::UiScheduler(leaf) => Some(leaf.rate.period()),
            _ => None,
        }
    }

    /// Sets the period of a fixed-period leaf and returns the old one.
    ///
    /// The caller is responsible for telling the active control policy (the
    /// driver's [`set_period`](crate::driver::PaceMaker::set_period) does).
    pub fn set_period(&mut self, node: NodeId, period: Duration) -> Option<Duration> {
        let i = self.live(node)?;
        match &mut self.kind[i] {
            NodeKind::Scheduler { period: p, .. } => Some(core::mem::replace(p, period)),
            _ => None,
        }
    }

    /// Starts pointer tracking on a pointer-rate leaf; returns its period.
    pub fn begin_tracking(&mut self, node: NodeId, event: &PointerEvent) -> Option<Duration> {
        let i = self.live(node)?;
        let NodeKind::UiScheduler(leaf) = &mut self.kind[i] else {
            return None;
        };
        leaf.tracking = true;
        leaf.fresh = true;
        Some(leaf.rate.init(event))
    }

    /// Feeds a pointer sample to a tracking pointer-rate leaf; returns its
    /// period afterwards.
    pub fn track(&mut self, node: NodeId, event: &PointerEvent) -> Option<Duration> {
        let i = self.live(node)?;
        let NodeKind::UiScheduler(leaf) = &mut self.kind[i] else {
            return None;
        };
        if !leaf.tracking {
            return None;
        }
        leaf.fresh = true;
        Some(leaf.rate.map(event))
    }

    /// Stops pointer tracking. Returns whether `node` was tracking.
    pub fn end_tracking(&mut self, node: NodeId) -> bool {
        let Some(i) = self.live(node) else {
            return false;
        };
        match &mut self.kind[i] {
            NodeKind::UiScheduler(leaf) => {
                let was = leaf.tracking;
                leaf.tracking = false;
                leaf.fresh = false;
                was
            }
            _ => false,
        }
    }

    // -- Damage --

    /// The shared fill/repair accumulators.
    #[must_use]
    pub fn damage(&self) -> &DamageLedger {
        &self.damage
    }

    /// Mutable access to the shared accumulators, for hosts that add
    /// damage of their own.
    pub fn damage_mut(&mut self) -> &mut DamageLedger {
        &mut self.damage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(low: i32, high: i32) -> GradeRange {
        GradeRange::new(low, high)
    }

    #[test]
    fn create_and_destroy() {
        let mut tree = SchedTree::new();
        let id = tree.single();
        assert!(tree.is_alive(id));
        assert!(tree.destroy(id));
        assert!(!tree.is_alive(id));
        assert!(!tree.destroy(id), "second destroy is a no-op");
    }

    #[test]
    fn generation_prevents_stale_access() {
        let mut tree = SchedTree::new();
        let a = tree.single();
        tree.destroy(a);
        let b = tree.single();
        assert_eq!(a.index(), b.index());
        assert_ne!(a.generation(), b.generation());
        assert_eq!(tree.count(a), 0);
        assert_eq!(tree.grades(a), GradeRange::UNSET);
    }

    #[test]
    fn structural_mutators() {
        let mut tree = SchedTree::new();
        let root = tree.distributor();
        let a = tree.redraw(GraphicId(1), r(0, 1));
        let b = tree.redraw(GraphicId(2), r(2, 3));
        let c = tree.redraw(GraphicId(3), r(4, 5));
        assert!(tree.append(root, b));
        assert!(tree.prepend(root, a));
        assert!(tree.insert(root, 2, c));
        assert_eq!(tree.children(root), [a, b, c]);
        assert_eq!(tree.parent(b), Some(root));

        assert_eq!(tree.remove(root, 1), Some(b));
        assert_eq!(tree.parent(b), None);
        assert_eq!(tree.count(root), 2);
        assert_eq!(tree.remove(root, 7), None, "out of range is a no-op");
        assert!(!tree.insert(root, 9, b), "out of range is a no-op");

        assert_eq!(tree.remove_all(root), [a, c]);
        assert_eq!(tree.count(root), 0);
    }

    #[test]
    fn single_slot_holds_one_child() {
        let mut tree = SchedTree::new();
        let s = tree.scheduler(Duration::from_millis(16));
        let a = tree.single();
        let b = tree.single();
        assert!(tree.append(s, a));
        assert!(!tree.append(s, b));
        assert_eq!(tree.child(s, 0), Some(a));
        assert_eq!(tree.child(s, 1), None);
    }

    #[test]
    fn cycles_and_double_parents_are_rejected() {
        let mut tree = SchedTree::new();
        let a = tree.distributor();
        let b = tree.distributor();
        let c = tree.distributor();
        assert!(tree.append(a, b));
        assert!(tree.append(b, c));
        assert!(!tree.append(c, a), "would create a cycle");
        assert!(!tree.append(a, a));
        assert!(!tree.append(c, b), "already has a parent");
    }

    #[test]
    fn delete_all_destroys_subtrees() {
        let mut tree = SchedTree::new();
        let root = tree.tiler();
        let mid = tree.single();
        let leaf = tree.redraw(GraphicId(0), r(0, 0));
        tree.append(root, mid);
        tree.append(mid, leaf);
        tree.delete_all(root);
        assert!(tree.is_alive(root));
        assert!(!tree.is_alive(mid));
        assert!(!tree.is_alive(leaf));
    }

    #[test]
    fn caches_stay_stale_until_regrade() {
        let mut tree = SchedTree::new();
        let root = tree.tiler();
        let a = tree.redraw(GraphicId(1), r(0, 2));
        let b = tree.redraw(GraphicId(2), r(0, 2));
        tree.append(root, a);
        tree.append(root, b);
        assert_eq!(tree.grades(root), GradeRange::UNSET);
        assert_eq!(tree.regrade(root), r(0, 5));
        assert_eq!(tree.grades(root), r(0, 5));
    }

    #[test]
    fn regrade_stale_runs_children_first() {
        let mut tree = SchedTree::new();
        let root = tree.distributor();
        let inner = tree.tiler();
        let a = tree.redraw(GraphicId(1), r(0, 1));
        let b = tree.redraw(GraphicId(2), r(0, 1));
        let far = tree.redraw(GraphicId(3), r(9, 9));
        tree.append(inner, a);
        tree.append(inner, b);
        tree.append(root, inner);
        tree.append(root, far);
        assert!(tree.regrade_stale() >= 2);
        assert_eq!(tree.grades(inner), r(0, 3));
        assert_eq!(tree.grades(root), r(0, 9));
        assert_eq!(tree.regrade_stale(), 0);
    }

    #[test]
    fn collect_schedulers_finds_nested_leaves() {
        let mut tree = SchedTree::new();
        let root = tree.distributor();
        let s1 = tree.scheduler(Duration::from_millis(16));
        let s2 = tree.scheduler(Duration::from_millis(33));
        let inner = tree.single();
        tree.append(root, s1);
        tree.append(root, inner);
        tree.append(inner, s2);
        let mut out = Vec::new();
        tree.collect_schedulers(root, &mut out);
        assert_eq!(out, [s1, s2]);
    }

    #[test]
    fn scheduler_range_follows_child() {
        let mut tree = SchedTree::new();
        let s = tree.scheduler(Duration::from_millis(16));
        let leaf = tree.redraw(GraphicId(1), r(2, 4));
        tree.append(s, leaf);
        assert_eq!(tree.regrade(s), r(2, 4));
        assert_eq!(tree.set_period(s, Duration::from_millis(8)), Some(Duration::from_millis(16)));
        assert_eq!(tree.period(s), Some(Duration::from_millis(8)));
        assert_eq!(tree.set_period(leaf, Duration::ZERO), None);
    }
}
