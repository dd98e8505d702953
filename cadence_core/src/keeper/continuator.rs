// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::{KeeperCx, PaceKeeper, Phase};
use crate::grade::{Grade, GradeRange};
use crate::time::{Duration, HostTime};
use crate::tree::NodeId;

/// Non-adaptive baseline: every leaf plays at the lowest grade of the
/// session, forever.
#[derive(Clone, Copy, Debug, Default)]
pub struct Continuator {
    grade: Option<Grade>,
}

impl Continuator {
    /// Creates an idle continuator.
    #[must_use]
    pub const fn new() -> Self {
        Self { grade: None }
    }
}

impl PaceKeeper for Continuator {
    fn name(&self) -> &'static str {
        "continuator"
    }

    fn start_all(&mut self, range: GradeRange, cx: &mut KeeperCx<'_, '_>) {
        self.grade = (!range.is_unset()).then_some(range.low);
        if self.grade.is_some() {
            cx.wake();
        }
    }

    fn stop_all(&mut self, _cx: &mut KeeperCx<'_, '_>) {
        self.grade = None;
    }

    fn start(&mut self, leaf: NodeId, cx: &mut KeeperCx<'_, '_>) {
        if self.grade.is_some() {
            cx.continue_leaf(leaf, Duration::ZERO);
        }
    }

    fn stop(&mut self, _leaf: NodeId, _cx: &mut KeeperCx<'_, '_>) {}

    fn play(&mut self, leaf: NodeId, fired_at: HostTime, cx: &mut KeeperCx<'_, '_>) {
        if let Some(g) = self.grade {
            cx.play_leaf(leaf, g, g, fired_at);
        }
    }

    fn eval(&mut self, _time: HostTime, _cx: &mut KeeperCx<'_, '_>) {}

    fn adjust(&mut self, _leaf: NodeId, _period: Duration, _cx: &mut KeeperCx<'_, '_>) {}

    fn current(&self) -> Grade {
        self.grade.unwrap_or(GradeRange::UNSET.low)
    }

    fn future(&self) -> Grade {
        self.current()
    }

    fn phase(&self) -> Phase {
        Phase::Sustain
    }
}
