// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bounding-box damage accumulation for repair leaves.

use kurbo::Rect;

/// An accumulated region pending repaint, kept as a single bounding box.
///
/// The all-zero rectangle is the "empty" sentinel, so a freshly cleared box
/// and [`Rect::ZERO`] are the same thing.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DamageBox {
    rect: Rect,
}

impl DamageBox {
    /// An empty damage box.
    pub const EMPTY: Self = Self { rect: Rect::ZERO };

    /// Returns `true` if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rect == Rect::ZERO
    }

    /// Adds `rect` to the pending region (bounding-box union).
    ///
    /// Zero-area rectangles are ignored.
    pub fn add(&mut self, rect: Rect) {
        if rect.area() <= 0.0 {
            return;
        }
        self.rect = if self.is_empty() {
            rect
        } else {
            self.rect.union(rect)
        };
    }

    /// Merges another box into this one.
    pub fn merge(&mut self, other: &Self) {
        if !other.is_empty() {
            self.add(other.rect);
        }
    }

    /// Returns the pending region, or `None` if empty.
    #[must_use]
    pub fn rect(&self) -> Option<Rect> {
        if self.is_empty() { None } else { Some(self.rect) }
    }

    /// Clears the box after a repaint commits.
    pub fn clear(&mut self) {
        self.rect = Rect::ZERO;
    }
}

/// The two shared accumulators of the fill-then-redraw leaf family.
///
/// Fill leaves record where old content must be erased; repair leaves record
/// where new content lands and commit both on redraw.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DamageLedger {
    /// Area erased by fill leaves since the last commit.
    pub fill: DamageBox,
    /// Area redrawn by repair leaves since the last commit.
    pub repair: DamageBox,
}

impl DamageLedger {
    /// Union of both accumulators.
    #[must_use]
    pub fn combined(&self) -> DamageBox {
        let mut out = self.fill;
        out.merge(&self.repair);
        out
    }

    /// Clears both accumulators.
    pub fn clear(&mut self) {
        self.fill.clear();
        self.repair.clear();
    }
}
