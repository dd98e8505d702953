// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Grade-sharing strategies for multi-child nodes.
//!
//! A multi-child node does not decide on its own which children take part in
//! a tick. It hands the children's cached ranges to a [`GradeSharing`]
//! strategy, which reports the node's combined range and, per tick, the list
//! of children to delegate to together with the (possibly rescaled) tick each
//! of them sees.
//!
//! | strategy | combined range | delegation |
//! |---|---|---|
//! | [`Tiler`] | children concatenated from child 0's low | tiles holding `current` or `future`, with hand-off |
//! | [`Normalizer`] | `[0, max(high - low)]` | every child, rescaled |
//! | [`Distributor`] | union of children | children whose own range holds `current` or `future` |

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::grade::{Grade, GradeRange, RunTime};

/// One child to play, with the tick it should see.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Delegation {
    /// Position of the child in its parent.
    pub index: usize,
    /// Tick context for that child.
    pub tick: RunTime,
}

/// How the children of a multi-child node share its grade axis.
pub trait GradeSharing: fmt::Debug {
    /// Combined range of a node whose children have the given ranges.
    fn grades(&self, children: &[GradeRange]) -> GradeRange;

    /// Called when the owning node recomputes its cache; returns the new
    /// combined range. Strategies with per-layout state reset it here.
    fn regrade(&mut self, children: &[GradeRange]) -> GradeRange {
        self.grades(children)
    }

    /// Decides which children take part in `tick`, in play order.
    fn play(&mut self, tick: &RunTime, children: &[GradeRange], out: &mut Vec<Delegation>);
}

// ---------------------------------------------------------------------------
// Tiler
// ---------------------------------------------------------------------------

/// Children laid end to end on the parent's axis.
///
/// Tile `i` covers `span(child i)` grades starting right after tile `i - 1`;
/// the first tile starts at the first set child's `low`. A grade `g` inside a
/// tile reaches the child as `g - tile.low + child.low`.
///
/// The tile that held `future` on the previous tick is the *target*. It is
/// played first on the next tick, and if the new grades have left it
/// entirely it still receives a fade-out from its nearest edge, so content
/// handed across a tile boundary is erased exactly once.
#[derive(Clone, Debug, Default)]
pub struct Tiler {
    target: Option<usize>,
}

impl Tiler {
    /// Creates a tiler with no hand-off target.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tile that held `future` on the last tick, if any.
    #[must_use]
    pub fn target(&self) -> Option<usize> {
        self.target
    }

    fn tiles(children: &[GradeRange]) -> Vec<GradeRange> {
        let Some(base) = children.iter().find(|r| !r.is_unset()).map(|r| r.low) else {
            return vec![GradeRange::UNSET; children.len()];
        };
        let mut next = base;
        children
            .iter()
            .map(|r| {
                let span = r.span();
                if span == 0 {
                    GradeRange::UNSET
                } else {
                    let tile = GradeRange::new(next, next + span - 1);
                    next += span;
                    tile
                }
            })
            .collect()
    }

    fn delegate(
        tick: &RunTime,
        current: Grade,
        future: Grade,
        tile: GradeRange,
        child: GradeRange,
        index: usize,
    ) -> Delegation {
        let shift = child.low - tile.low;
        Delegation {
            index,
            tick: tick.with_grades(current + shift, future + shift),
        }
    }
}

impl GradeSharing for Tiler {
    fn grades(&self, children: &[GradeRange]) -> GradeRange {
        Self::tiles(children)
            .into_iter()
            .fold(GradeRange::UNSET, GradeRange::union)
    }

    fn regrade(&mut self, children: &[GradeRange]) -> GradeRange {
        if self.target.is_some_and(|t| t >= children.len()) {
            self.target = None;
        }
        self.grades(children)
    }

    fn play(&mut self, tick: &RunTime, children: &[GradeRange], out: &mut Vec<Delegation>) {
        let tiles = Self::tiles(children);
        let (cur, fut) = (tick.current, tick.future);
        let mut played = None;

        if let Some(t) = self.target.filter(|&t| t < tiles.len() && !tiles[t].is_unset()) {
            let tile = tiles[t];
            let start = if tick.fade(tile).is_live() {
                cur
            } else {
                tile.clamp(cur)
            };
            out.push(Self::delegate(tick, start, fut, tile, children[t], t));
            played = Some(t);
        }

        for (i, tile) in tiles.iter().enumerate() {
            if Some(i) == played {
                continue;
            }
            if tile.contains(cur) || tile.contains(fut) {
                out.push(Self::delegate(tick, cur, fut, *tile, children[i], i));
            }
        }

        self.target = tiles.iter().position(|tile| tile.contains(fut));
    }
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Children share one normalized axis and move in lockstep.
///
/// The node's range is `[0, m]` with `m` the widest child's `high - low`.
/// Each tick, every child receives the grades rescaled into its own range,
/// rounded to the nearest grade.
#[derive(Clone, Copy, Debug, Default)]
pub struct Normalizer;

impl Normalizer {
    /// Rescales `value` from `[0, max_span]` into `child`.
    #[must_use]
    pub fn rescale(value: Grade, child: GradeRange, max_span: i32) -> Grade {
        let span = child.high - child.low;
        if max_span == 0 {
            return child.low + value;
        }
        let num = i64::from(value) * i64::from(span);
        let den = i64::from(max_span);
        let rounded = (2 * num + den).div_euclid(2 * den);
        child.low + i32::try_from(rounded).unwrap_or(if rounded < 0 { i32::MIN } else { i32::MAX })
    }

    fn max_span(children: &[GradeRange]) -> Option<i32> {
        children
            .iter()
            .filter(|r| !r.is_unset())
            .map(|r| r.high - r.low)
            .max()
    }
}

impl GradeSharing for Normalizer {
    fn grades(&self, children: &[GradeRange]) -> GradeRange {
        match Self::max_span(children) {
            Some(m) => GradeRange::new(0, m),
            None => GradeRange::UNSET,
        }
    }

    fn play(&mut self, tick: &RunTime, children: &[GradeRange], out: &mut Vec<Delegation>) {
        let Some(m) = Self::max_span(children) else {
            return;
        };
        for (index, child) in children.iter().enumerate() {
            if child.is_unset() {
                continue;
            }
            out.push(Delegation {
                index,
                tick: tick.with_grades(
                    Self::rescale(tick.current, *child, m),
                    Self::rescale(tick.future, *child, m),
                ),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Distributor
// ---------------------------------------------------------------------------

/// Children gate themselves independently on their own ranges.
#[derive(Clone, Copy, Debug, Default)]
pub struct Distributor;

impl GradeSharing for Distributor {
    fn grades(&self, children: &[GradeRange]) -> GradeRange {
        children
            .iter()
            .copied()
            .fold(GradeRange::UNSET, GradeRange::union)
    }

    fn play(&mut self, tick: &RunTime, children: &[GradeRange], out: &mut Vec<Delegation>) {
        for (index, child) in children.iter().enumerate() {
            if child.contains(tick.current) || child.contains(tick.future) {
                out.push(Delegation { index, tick: *tick });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grade::{FadeKind, SessionId};
    use crate::time::{Duration, HostTime};

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

    #[test]
    fn tiler_concatenates_without_gaps() {
        let children = [r(2, 4), r(0, 1), r(7, 7), r(0, 3)];
        let total: i32 = children.iter().map(|c| c.span()).sum();
        let g = Tiler::new().grades(&children);
        assert_eq!(g.low, 2);
        assert_eq!(g.high, 2 + total - 1);
    }

    #[test]
    fn tiler_skips_unset_children() {
        let children = [r(0, 2), GradeRange::UNSET, r(0, 1)];
        assert_eq!(Tiler::new().grades(&children), r(0, 4));
        assert_eq!(Tiler::new().grades(&[GradeRange::UNSET]), GradeRange::UNSET);
    }

    #[test]
    fn tiler_hands_off_across_boundary() {
        let children = [r(0, 2), r(3, 5)];
        let mut tiler = Tiler::new();
        let mut out = Vec::new();
        tiler.play(&tick(2, 3), &children, &mut out);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].index, 0);
        assert_eq!(out[0].tick.fade(children[0]), FadeKind::FadeOutHigh);
        assert_eq!(out[1].index, 1);
        assert_eq!(out[1].tick.fade(children[1]), FadeKind::FadeInLow);
        assert_eq!(tiler.target(), Some(1));
    }

    #[test]
    fn tiler_reoffsets_into_child_range() {
        // Second child natively spans [0, 2] but is tiled at [3, 5].
        let children = [r(0, 2), r(0, 2)];
        let mut tiler = Tiler::new();
        let mut out = Vec::new();
        tiler.play(&tick(4, 4), &children, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].index, 1);
        assert_eq!((out[0].tick.current, out[0].tick.future), (1, 1));
    }

    #[test]
    fn tiler_target_fades_out_after_jump() {
        let children = [r(0, 2), r(3, 5), r(6, 8)];
        let mut tiler = Tiler::new();
        let mut out = Vec::new();
        tiler.play(&tick(4, 4), &children, &mut out);
        assert_eq!(tiler.target(), Some(1));

        out.clear();
        tiler.play(&tick(7, 7), &children, &mut out);
        assert_eq!(out.len(), 2, "old target and new tile, each once");
        assert_eq!(out[0].index, 1);
        assert_eq!(out[0].tick.fade(children[1]), FadeKind::FadeOutHigh);
        assert_eq!(out[1].index, 2);
        assert_eq!(out[1].tick.fade(children[2]), FadeKind::Sustain);
        assert_eq!(tiler.target(), Some(2));
    }

    #[test]
    fn tiler_never_plays_a_tile_twice() {
        let children = [r(0, 2), r(3, 5)];
        let mut tiler = Tiler::new();
        let mut out = Vec::new();
        tiler.play(&tick(4, 4), &children, &mut out);
        out.clear();
        tiler.play(&tick(4, 5), &children, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].index, 1);
    }

    #[test]
    fn normalizer_range_is_widest_span() {
        let children = [r(0, 2), r(5, 9), r(1, 1)];
        assert_eq!(Normalizer.grades(&children), r(0, 4));
        assert_eq!(Normalizer.grades(&[]), GradeRange::UNSET);
    }

    #[test]
    fn normalizer_rescales_proportionally() {
        let children = [r(0, 4), r(10, 12), r(3, 3)];
        let mut out = Vec::new();
        Normalizer.play(&tick(2, 4), &children, &mut out);
        assert_eq!(out.len(), 3, "every child plays");
        assert_eq!((out[0].tick.current, out[0].tick.future), (2, 4));
        // 2 * 2 / 4 = 1, 4 * 2 / 4 = 2
        assert_eq!((out[1].tick.current, out[1].tick.future), (11, 12));
        assert_eq!((out[2].tick.current, out[2].tick.future), (3, 3));
    }

    #[test]
    fn normalizer_rounds_half_up() {
        // 1 * 1 / 2 = 0.5 rounds to 1.
        assert_eq!(Normalizer::rescale(1, r(0, 1), 2), 1);
        assert_eq!(Normalizer::rescale(1, r(0, 2), 3), 1);
        assert_eq!(Normalizer::rescale(0, r(5, 9), 0), 5);
    }

    #[test]
    fn distributor_is_union() {
        let children = [r(3, 4), r(0, 1), r(6, 9)];
        assert_eq!(Distributor.grades(&children), r(0, 9));
    }

    #[test]
    fn distributor_gates_on_own_ranges() {
        let children = [r(0, 2), r(2, 4), r(6, 9)];
        let mut out = Vec::new();
        Distributor.play(&tick(2, 2), &children, &mut out);
        let picked: Vec<usize> = out.iter().map(|d| d.index).collect();
        assert_eq!(picked, [0, 1]);
        assert!(out.iter().all(|d| d.tick == tick(2, 2)));
    }
}
