// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A canvas that records operations instead of drawing.

use alloc::vec::Vec;

use kurbo::Rect;

use cadence_core::canvas::{Buffer, Canvas};

/// One recorded canvas operation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CanvasOp {
    /// Background fill.
    Fill(Rect),
    /// XOR outline.
    Xor(Rect),
    /// Clip pushed.
    PushClip(Rect),
    /// Clip popped.
    PopClip,
    /// Buffer selected.
    Select(Buffer),
    /// Back buffer shown.
    Swap(Rect),
    /// Pending output flushed.
    Flush,
}

/// A [`Canvas`] that appends every call to a log.
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    ops: Vec<CanvasOp>,
    damage: Option<Rect>,
}

impl RecordingCanvas {
    /// Creates an empty canvas.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations recorded so far.
    #[must_use]
    pub fn ops(&self) -> &[CanvasOp] {
        &self.ops
    }

    /// Number of recorded buffer swaps.
    #[must_use]
    pub fn swaps(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, CanvasOp::Swap(_)))
            .count()
    }

    /// Drops the log.
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Reports `rect` as exposed by the host (e.g. a window uncovered).
    pub fn expose(&mut self, rect: Rect) {
        self.damage = Some(self.damage.map_or(rect, |d| d.union(rect)));
    }
}

impl Canvas for RecordingCanvas {
    fn fill(&mut self, rect: Rect) {
        self.ops.push(CanvasOp::Fill(rect));
    }

    fn xor_rect(&mut self, rect: Rect) {
        self.ops.push(CanvasOp::Xor(rect));
    }

    fn push_clip(&mut self, rect: Rect) {
        self.ops.push(CanvasOp::PushClip(rect));
    }

    fn pop_clip(&mut self) {
        self.ops.push(CanvasOp::PopClip);
    }

    fn select_buffer(&mut self, buffer: Buffer) {
        self.ops.push(CanvasOp::Select(buffer));
    }

    fn swap_buffers(&mut self, rect: Rect) {
        self.ops.push(CanvasOp::Swap(rect));
    }

    fn flush(&mut self) {
        self.ops.push(CanvasOp::Flush);
    }

    fn damage(&self) -> Option<Rect> {
        self.damage
    }

    fn clear_damage(&mut self) {
        self.damage = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_accumulate_until_cleared() {
        let mut c = RecordingCanvas::new();
        c.expose(Rect::new(0.0, 0.0, 10.0, 10.0));
        c.expose(Rect::new(20.0, 0.0, 30.0, 5.0));
        assert_eq!(c.damage(), Some(Rect::new(0.0, 0.0, 30.0, 10.0)));
        c.clear_damage();
        assert_eq!(c.damage(), None);
    }

    #[test]
    fn counts_swaps() {
        let mut c = RecordingCanvas::new();
        c.select_buffer(Buffer::Back);
        c.swap_buffers(Rect::new(0.0, 0.0, 1.0, 1.0));
        c.flush();
        assert_eq!(c.swaps(), 1);
        assert_eq!(c.ops().len(), 3);
    }
}
