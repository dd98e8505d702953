// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Test doubles shared by the unit tests of this crate.

use alloc::vec::Vec;

use hashbrown::HashMap;
use kurbo::Rect;

use crate::canvas::{Buffer, Canvas, GraphicId, Graphics};
use crate::time::{Duration, HostTime};
use crate::timer::{Dispatcher, TimerHandle, TimerToken};

/// Dispatcher with a hand-driven clock that records pending timers.
#[derive(Debug, Default)]
pub(crate) struct TestDispatcher {
    pub(crate) now: HostTime,
    next: u64,
    /// Pending timers as `(handle, delay, token)`.
    pub(crate) pending: Vec<(TimerHandle, Duration, TimerToken)>,
    pub(crate) stopped: usize,
}

impl TestDispatcher {
    pub(crate) fn advance(&mut self, d: Duration) {
        self.now = self.now + d;
    }

    /// Removes and returns the pending timer for `token`, if any.
    pub(crate) fn take(&mut self, token: TimerToken) -> Option<Duration> {
        let pos = self.pending.iter().position(|(_, _, t)| *t == token)?;
        Some(self.pending.remove(pos).1)
    }

    pub(crate) fn delay_of(&self, token: TimerToken) -> Option<Duration> {
        self.pending
            .iter()
            .find(|(_, _, t)| *t == token)
            .map(|(_, d, _)| *d)
    }
}

impl Dispatcher for TestDispatcher {
    fn now(&self) -> HostTime {
        self.now
    }

    fn start_timer(&mut self, delay: Duration, token: TimerToken) -> TimerHandle {
        self.next += 1;
        let handle = TimerHandle(self.next);
        self.pending.push((handle, delay, token));
        handle
    }

    fn stop_timer(&mut self, handle: TimerHandle) {
        let before = self.pending.len();
        self.pending.retain(|(h, _, _)| *h != handle);
        if self.pending.len() != before {
            self.stopped += 1;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum CanvasOp {
    Fill(Rect),
    Xor(Rect),
    PushClip(Rect),
    PopClip,
    Select(Buffer),
    Swap(Rect),
    Flush,
}

#[derive(Debug, Default)]
pub(crate) struct RecordingCanvas {
    pub(crate) ops: Vec<CanvasOp>,
    pub(crate) host_damage: Option<Rect>,
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
        self.host_damage
    }

    fn clear_damage(&mut self) {
        self.host_damage = None;
    }
}

/// Graphics whose draws cost nothing unless a dispatcher clock is advanced
/// by the test itself.
#[derive(Debug, Default)]
pub(crate) struct NullGraphics {
    bounds: HashMap<GraphicId, Rect>,
    pub(crate) draws: Vec<GraphicId>,
    pub(crate) feedback: Vec<(GraphicId, bool)>,
    pub(crate) alpha: Option<f32>,
}

impl NullGraphics {
    pub(crate) fn set_bounds(&mut self, id: GraphicId, rect: Rect) {
        self.bounds.insert(id, rect);
    }
}

impl Graphics for NullGraphics {
    fn draw(&mut self, id: GraphicId, _canvas: &mut dyn Canvas, _clip: Rect) {
        self.draws.push(id);
    }

    fn bounds(&self, id: GraphicId) -> Rect {
        self.bounds.get(&id).copied().unwrap_or(Rect::ZERO)
    }

    fn set_feedback(&mut self, id: GraphicId, on: bool) {
        self.feedback.push((id, on));
    }

    fn set_alpha(&mut self, _id: GraphicId, alpha: f32) {
        self.alpha = Some(alpha);
    }
}
