// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads events recorded by a
//! [`RecorderSink`](super::recorder::RecorderSink) and writes
//! [Chrome Trace Event Format][format] JSON to the given writer. Leaf plays
//! become complete slices on one track per leaf; grade changes feed a
//! counter track.
//!
//! [format]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use cadence_core::keeper::Phase;
use cadence_core::timer::TimerToken;
use cadence_core::trace::{SessionEdge, TimerAction};

use crate::recorder::RecordedEvent;

// Leaf tracks use the leaf index offset by one; tid 0 is the control track.
const CONTROL_TID: u32 = 0;

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
/// Timestamps are logical session microseconds.
pub fn export(events: &[RecordedEvent], writer: &mut dyn Write) -> io::Result<()> {
    let mut out: Vec<Value> = Vec::with_capacity(events.len());

    for recorded in events {
        match recorded {
            RecordedEvent::Session(e) => {
                let name = match e.edge {
                    SessionEdge::Started => "SessionStart",
                    SessionEdge::Stopped => "SessionStop",
                };
                out.push(json!({
                    "ph": "i",
                    "name": name,
                    "cat": "Session",
                    "ts": e.timestamp.micros(),
                    "pid": 0,
                    "tid": CONTROL_TID,
                    "s": "g",
                    "args": {
                        "session": e.session.0,
                        "leaves": e.leaves,
                        "low": e.range.low,
                        "high": e.range.high,
                    }
                }));
            }
            RecordedEvent::LeafPlay(e) => {
                out.push(json!({
                    "ph": "X",
                    "name": "LeafPlay",
                    "cat": "Leaf",
                    "ts": e.fired_at.micros(),
                    "dur": e.cost.micros(),
                    "pid": 0,
                    "tid": e.leaf.index() + 1,
                    "args": {
                        "current": e.current,
                        "future": e.future,
                        "period_us": e.period.micros(),
                        "budget_us": e.budget_left(),
                    }
                }));
            }
            RecordedEvent::GradeChange(e) => {
                out.push(json!({
                    "ph": "i",
                    "name": phase_name(e.phase),
                    "cat": "Grade",
                    "ts": e.timestamp.micros(),
                    "pid": 0,
                    "tid": CONTROL_TID,
                    "s": "p",
                    "args": {
                        "from": [e.from.0, e.from.1],
                        "to": [e.to.0, e.to.1],
                    }
                }));
                out.push(json!({
                    "ph": "C",
                    "name": "grade",
                    "ts": e.timestamp.micros(),
                    "pid": 0,
                    "args": {
                        "current": e.to.0,
                        "future": e.to.1,
                    }
                }));
            }
            RecordedEvent::Timer(e) => {
                let (tid, target) = match e.token {
                    TimerToken::Leaf(leaf) => (leaf.index() + 1, "leaf"),
                    TimerToken::Evaluate => (CONTROL_TID, "eval"),
                };
                let (name, delay) = match e.action {
                    TimerAction::Armed(d) => ("TimerArmed", Some(d.micros())),
                    TimerAction::Cancelled => ("TimerCancelled", None),
                };
                out.push(json!({
                    "ph": "i",
                    "name": name,
                    "cat": "Timer",
                    "ts": e.timestamp.micros(),
                    "pid": 0,
                    "tid": tid,
                    "s": "t",
                    "args": {
                        "target": target,
                        "delay_us": delay,
                    }
                }));
            }
            RecordedEvent::PeriodChange(e) => {
                out.push(json!({
                    "ph": "i",
                    "name": "PeriodChange",
                    "cat": "Leaf",
                    "ts": e.timestamp.micros(),
                    "pid": 0,
                    "tid": e.leaf.index() + 1,
                    "s": "t",
                    "args": {
                        "old_us": e.old.micros(),
                        "new_us": e.new.micros(),
                    }
                }));
            }
            RecordedEvent::PolicyChange(e) => {
                out.push(json!({
                    "ph": "i",
                    "name": "PolicyChange",
                    "cat": "Session",
                    "ts": e.timestamp.micros(),
                    "pid": 0,
                    "tid": CONTROL_TID,
                    "s": "g",
                    "args": {
                        "session": e.session.0,
                        "old": e.old,
                        "new": e.new,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &out).map_err(io::Error::other)
}

fn phase_name(phase: Phase) -> &'static str {
    match phase {
        Phase::Sustain => "Sustain",
        Phase::Trial => "Trial",
        Phase::Transit => "Transit",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::grade::SessionId;
    use cadence_core::time::{Duration, HostTime};
    use cadence_core::trace::{GradeChangeEvent, LeafPlayEvent, PolicyChangeEvent, TimerEvent};
    use cadence_core::tree::SchedTree;

    #[test]
    fn exports_valid_json() {
        let mut tree = SchedTree::new();
        let leaf = tree.scheduler(Duration::from_millis(16));
        let events = [
            RecordedEvent::LeafPlay(LeafPlayEvent {
                leaf,
                session: SessionId(1),
                current: 1,
                future: 2,
                fired_at: HostTime(16_000),
                cost: Duration::from_micros(4_500),
                period: Duration::from_millis(16),
            }),
            RecordedEvent::GradeChange(GradeChangeEvent {
                session: SessionId(1),
                from: (1, 1),
                to: (1, 2),
                phase: Phase::Trial,
                timestamp: HostTime(50_000),
            }),
            RecordedEvent::Timer(TimerEvent {
                token: TimerToken::Evaluate,
                action: TimerAction::Cancelled,
                timestamp: HostTime(60_000),
            }),
        ];

        let mut buf = Vec::new();
        export(&events, &mut buf).unwrap();
        let parsed: Vec<Value> = serde_json::from_slice(&buf).unwrap();

        // One play slice, a grade instant plus its counter, one timer.
        assert_eq!(parsed.len(), 4, "unexpected event count");
        assert_eq!(parsed[0]["ph"], "X");
        assert_eq!(parsed[0]["dur"], 4_500);
        assert_eq!(parsed[0]["tid"], 1);
        assert_eq!(parsed[1]["name"], "Trial");
        assert_eq!(parsed[2]["ph"], "C");
        assert_eq!(parsed[2]["args"]["future"], 2);
        assert_eq!(parsed[3]["name"], "TimerCancelled");
        assert!(parsed[3]["args"]["delay_us"].is_null(), "cancel has no delay");
    }

    #[test]
    fn empty_recording_is_empty_array() {
        let mut buf = Vec::new();
        export(&[], &mut buf).unwrap();
        let parsed: Vec<Value> = serde_json::from_slice(&buf).unwrap();
        assert!(parsed.is_empty(), "no events expected");
    }

    #[test]
    fn policy_swap_is_a_global_instant() {
        let events = [RecordedEvent::PolicyChange(PolicyChangeEvent {
            session: SessionId(3),
            old: "event",
            new: "coherence",
            timestamp: HostTime(7_000),
        })];
        let mut buf = Vec::new();
        export(&events, &mut buf).unwrap();
        let parsed: Vec<Value> = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0]["name"], "PolicyChange");
        assert_eq!(parsed[0]["s"], "g");
        assert_eq!(parsed[0]["args"]["old"], "event");
        assert_eq!(parsed[0]["args"]["new"], "coherence");
    }
}
