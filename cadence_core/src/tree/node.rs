// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node variants.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use kurbo::Rect;

use crate::canvas::{GraphicId, Graphics};
use crate::grade::{GradeRange, RunTime};
use crate::pointer::PointerRate;
use crate::sharing::GradeSharing;
use crate::time::Duration;

use super::id::INVALID;

/// A side effect run around the child of an action pacer.
///
/// Closures of the matching shape implement this trait.
pub trait Action {
    /// Runs the effect for one tick.
    fn run(&mut self, tick: &RunTime, graphics: &mut dyn Graphics);
}

impl<F> Action for F
where
    F: FnMut(&RunTime, &mut dyn Graphics),
{
    fn run(&mut self, tick: &RunTime, graphics: &mut dyn Graphics) {
        self(tick, graphics);
    }
}

/// How a repair leaf repaints its graphic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RepairStyle {
    /// Redraws the graphic clipped to its bounds; erases it on fade-out.
    Redraw,
    /// Erases the graphic's previous footprint and records it as fill
    /// damage.
    Fill,
    /// Redraws the graphic clipped to the pending damage and records its
    /// bounds as repair damage.
    Repair,
    /// Erases and redraws on the back buffer, then swaps and flushes.
    FillRedraw,
    /// Toggles selection feedback on the graphic around its child.
    Select,
    /// Clips its child's repaint to the pending damage.
    Clipper,
    /// Draws an inverted outline of the graphic's bounds.
    Xor,
}

/// Per-leaf repaint state for the repair family.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct RepairLeaf {
    pub(crate) style: RepairStyle,
    pub(crate) range: GradeRange,
    pub(crate) graphic: Option<GraphicId>,
    pub(crate) child: u32,
    /// Footprint last painted, `Rect::ZERO` when nothing is on screen.
    pub(crate) last: Rect,
    /// Xor outline currently drawn.
    pub(crate) drawn: bool,
    /// Selection feedback alpha.
    pub(crate) alpha: f32,
}

impl RepairLeaf {
    pub(crate) fn new(style: RepairStyle, range: GradeRange, graphic: Option<GraphicId>) -> Self {
        Self {
            style,
            range,
            graphic,
            child: INVALID,
            last: Rect::ZERO,
            drawn: false,
            alpha: 1.0,
        }
    }
}

pub(crate) struct UiLeaf {
    pub(crate) child: u32,
    pub(crate) rate: Box<dyn PointerRate>,
    pub(crate) tracking: bool,
    /// A pointer sample arrived since the last tick.
    pub(crate) fresh: bool,
}

pub(crate) enum NodeKind {
    /// A freed slot.
    Vacant,
    Multi {
        children: Vec<u32>,
        sharing: Box<dyn GradeSharing>,
    },
    Single {
        child: u32,
    },
    Scheduler {
        child: u32,
        period: Duration,
    },
    UiScheduler(UiLeaf),
    ActionPacer {
        child: u32,
        before: Option<Box<dyn Action>>,
        after: Option<Box<dyn Action>>,
    },
    Repair(RepairLeaf),
}

impl NodeKind {
    /// The single-child slot, for every shape that has one.
    pub(crate) fn slot(&self) -> Option<u32> {
        match self {
            Self::Single { child }
            | Self::Scheduler { child, .. }
            | Self::ActionPacer { child, .. }
            | Self::UiScheduler(UiLeaf { child, .. }) => Some(*child),
            Self::Repair(leaf) if matches!(leaf.style, RepairStyle::Select | RepairStyle::Clipper) => {
                Some(leaf.child)
            }
            _ => None,
        }
    }

    pub(crate) fn slot_mut(&mut self) -> Option<&mut u32> {
        match self {
            Self::Single { child }
            | Self::Scheduler { child, .. }
            | Self::ActionPacer { child, .. }
            | Self::UiScheduler(UiLeaf { child, .. }) => Some(child),
            Self::Repair(leaf) if matches!(leaf.style, RepairStyle::Select | RepairStyle::Clipper) => {
                Some(&mut leaf.child)
            }
            _ => None,
        }
    }

    /// Direct children in order.
    pub(crate) fn children(&self) -> Vec<u32> {
        match self {
            Self::Multi { children, .. } => children.clone(),
            _ => self.slot().filter(|&c| c != INVALID).into_iter().collect(),
        }
    }

    pub(crate) fn is_periodic(&self) -> bool {
        matches!(self, Self::Scheduler { .. } | Self::UiScheduler(_))
    }
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vacant => f.write_str("Vacant"),
            Self::Multi { children, sharing } => f
                .debug_struct("Multi")
                .field("children", children)
                .field("sharing", sharing)
                .finish(),
            Self::Single { child } => f.debug_struct("Single").field("child", child).finish(),
            Self::Scheduler { child, period } => f
                .debug_struct("Scheduler")
                .field("child", child)
                .field("period", period)
                .finish(),
            Self::UiScheduler(leaf) => f
                .debug_struct("UiScheduler")
                .field("child", &leaf.child)
                .field("rate", &leaf.rate)
                .field("tracking", &leaf.tracking)
                .field("fresh", &leaf.fresh)
                .finish(),
            Self::ActionPacer {
                child,
                before,
                after,
            } => f
                .debug_struct("ActionPacer")
                .field("child", child)
                .field("before", &before.is_some())
                .field("after", &after.is_some())
                .finish(),
            Self::Repair(leaf) => leaf.fmt(f),
        }
    }
}
