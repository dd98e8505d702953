// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory typed recording of trace events.
//!
//! [`RecorderSink`] keeps every event in arrival order as a
//! [`RecordedEvent`]. A driver owns its sink as a `Box<dyn TraceSink>`, so
//! [`SharedRecorder`] wraps the recorder behind a shared handle that the host
//! keeps a clone of and reads after (or during) a session.

use std::cell::RefCell;
use std::rc::Rc;

use cadence_core::grade::Grade;
use cadence_core::time::HostTime;
use cadence_core::trace::{
    GradeChangeEvent, LeafPlayEvent, PeriodChangeEvent, PolicyChangeEvent, SessionEvent,
    TimerEvent, TraceSink,
};

/// One recorded trace event.
#[derive(Clone, Copy, Debug)]
pub enum RecordedEvent {
    /// A session started or stopped.
    Session(SessionEvent),
    /// A leaf played one tick.
    LeafPlay(LeafPlayEvent),
    /// The session grade pair moved.
    GradeChange(GradeChangeEvent),
    /// A timer was armed or cancelled.
    Timer(TimerEvent),
    /// A leaf period changed.
    PeriodChange(PeriodChangeEvent),
    /// The control policy was swapped.
    PolicyChange(PolicyChangeEvent),
}

impl RecordedEvent {
    /// Logical time at which the event happened.
    #[must_use]
    pub fn timestamp(&self) -> HostTime {
        match self {
            Self::Session(e) => e.timestamp,
            Self::LeafPlay(e) => e.fired_at,
            Self::GradeChange(e) => e.timestamp,
            Self::Timer(e) => e.timestamp,
            Self::PeriodChange(e) => e.timestamp,
            Self::PolicyChange(e) => e.timestamp,
        }
    }
}

/// A [`TraceSink`] that appends every event to a vector.
#[derive(Clone, Debug, Default)]
pub struct RecorderSink {
    events: Vec<RecordedEvent>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far, in arrival order.
    #[must_use]
    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    /// Consumes the recorder and returns its events.
    #[must_use]
    pub fn into_events(self) -> Vec<RecordedEvent> {
        self.events
    }

    /// Drops every recorded event.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterates over recorded leaf plays.
    pub fn leaf_plays(&self) -> impl Iterator<Item = &LeafPlayEvent> {
        self.events.iter().filter_map(|e| match e {
            RecordedEvent::LeafPlay(p) => Some(p),
            _ => None,
        })
    }

    /// Iterates over recorded grade changes.
    pub fn grade_changes(&self) -> impl Iterator<Item = &GradeChangeEvent> {
        self.events.iter().filter_map(|e| match e {
            RecordedEvent::GradeChange(g) => Some(g),
            _ => None,
        })
    }

    /// The `(current, future)` pair after the last recorded grade change.
    #[must_use]
    pub fn last_grades(&self) -> Option<(Grade, Grade)> {
        self.grade_changes().last().map(|g| g.to)
    }

    /// Number of leaf plays whose cost exceeded their period.
    #[must_use]
    pub fn overruns(&self) -> usize {
        self.leaf_plays().filter(|p| p.budget_left() < 0).count()
    }
}

impl TraceSink for RecorderSink {
    fn on_session(&mut self, e: &SessionEvent) {
        self.events.push(RecordedEvent::Session(*e));
    }

    fn on_leaf_play(&mut self, e: &LeafPlayEvent) {
        self.events.push(RecordedEvent::LeafPlay(*e));
    }

    fn on_grade_change(&mut self, e: &GradeChangeEvent) {
        self.events.push(RecordedEvent::GradeChange(*e));
    }

    fn on_timer(&mut self, e: &TimerEvent) {
        self.events.push(RecordedEvent::Timer(*e));
    }

    fn on_period_change(&mut self, e: &PeriodChangeEvent) {
        self.events.push(RecordedEvent::PeriodChange(*e));
    }

    fn on_policy_change(&mut self, e: &PolicyChangeEvent) {
        self.events.push(RecordedEvent::PolicyChange(*e));
    }
}

/// A cloneable handle to a [`RecorderSink`].
///
/// Install one clone as the driver's sink and keep another to read the
/// recording back.
#[derive(Clone, Debug, Default)]
pub struct SharedRecorder(Rc<RefCell<RecorderSink>>);

impl SharedRecorder {
    /// Creates a handle to an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` with shared access to the recorder.
    pub fn with<R>(&self, f: impl FnOnce(&RecorderSink) -> R) -> R {
        f(&self.0.borrow())
    }

    /// Copies the recorded events out.
    #[must_use]
    pub fn snapshot(&self) -> Vec<RecordedEvent> {
        self.0.borrow().events().to_vec()
    }

    /// Drops every recorded event.
    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl TraceSink for SharedRecorder {
    fn on_session(&mut self, e: &SessionEvent) {
        self.0.borrow_mut().on_session(e);
    }

    fn on_leaf_play(&mut self, e: &LeafPlayEvent) {
        self.0.borrow_mut().on_leaf_play(e);
    }

    fn on_grade_change(&mut self, e: &GradeChangeEvent) {
        self.0.borrow_mut().on_grade_change(e);
    }

    fn on_timer(&mut self, e: &TimerEvent) {
        self.0.borrow_mut().on_timer(e);
    }

    fn on_period_change(&mut self, e: &PeriodChangeEvent) {
        self.0.borrow_mut().on_period_change(e);
    }

    fn on_policy_change(&mut self, e: &PolicyChangeEvent) {
        self.0.borrow_mut().on_policy_change(e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::grade::{GradeRange, SessionId};
    use cadence_core::keeper::Phase;
    use cadence_core::time::Duration;
    use cadence_core::trace::SessionEdge;
    use cadence_core::tree::SchedTree;

    fn grade(from: (Grade, Grade), to: (Grade, Grade), at: u64) -> GradeChangeEvent {
        GradeChangeEvent {
            session: SessionId(1),
            from,
            to,
            phase: Phase::Trial,
            timestamp: HostTime(at),
        }
    }

    #[test]
    fn records_in_arrival_order() {
        let mut tree = SchedTree::new();
        let leaf = tree.scheduler(Duration::from_millis(16));
        let mut sink = RecorderSink::new();
        sink.on_session(&SessionEvent {
            session: SessionId(1),
            edge: SessionEdge::Started,
            leaves: 1,
            range: GradeRange::new(0, 3),
            timestamp: HostTime(0),
        });
        sink.on_leaf_play(&LeafPlayEvent {
            leaf,
            session: SessionId(1),
            current: 0,
            future: 0,
            fired_at: HostTime(16_000),
            cost: Duration::from_millis(20),
            period: Duration::from_millis(16),
        });
        sink.on_grade_change(&grade((0, 0), (0, 1), 50_000));

        assert_eq!(sink.len(), 3);
        assert!(matches!(sink.events()[0], RecordedEvent::Session(_)));
        assert_eq!(sink.events()[1].timestamp(), HostTime(16_000));
        assert_eq!(sink.overruns(), 1);
        assert_eq!(sink.last_grades(), Some((0, 1)));
    }

    #[test]
    fn shared_handle_sees_driver_writes() {
        let reader = SharedRecorder::new();
        let mut writer: Box<dyn TraceSink> = Box::new(reader.clone());
        writer.on_grade_change(&grade((0, 0), (0, 1), 10));
        writer.on_grade_change(&grade((0, 1), (1, 1), 20));

        assert_eq!(reader.with(|r| r.grade_changes().count()), 2);
        assert_eq!(reader.with(RecorderSink::last_grades), Some((1, 1)));
        reader.clear();
        assert!(reader.snapshot().is_empty());
    }

    #[test]
    fn policy_swaps_are_recorded() {
        let reader = SharedRecorder::new();
        let mut writer: Box<dyn TraceSink> = Box::new(reader.clone());
        writer.on_policy_change(&PolicyChangeEvent {
            session: SessionId(2),
            old: "event",
            new: "damped",
            timestamp: HostTime(40),
        });
        let events = reader.snapshot();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            RecordedEvent::PolicyChange(PolicyChangeEvent { new: "damped", .. })
        ));
        assert_eq!(events[0].timestamp(), HostTime(40));
    }
}
