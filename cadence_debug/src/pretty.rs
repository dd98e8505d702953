// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Times are
//! logical session microseconds.

use std::io::Write;

use cadence_core::keeper::Phase;
use cadence_core::time::HostTime;
use cadence_core::timer::TimerToken;
use cadence_core::trace::{
    GradeChangeEvent, LeafPlayEvent, PeriodChangeEvent, PolicyChangeEvent, SessionEdge,
    SessionEvent, TimerAction, TimerEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    /// Skip leaf plays that stayed within their period.
    overruns_only: bool,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("overruns_only", &self.overruns_only)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self {
            writer,
            overruns_only: false,
        }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer,
            overruns_only: false,
        }
    }

    /// Prints leaf plays only when they overran their period.
    #[must_use]
    pub fn overruns_only(mut self) -> Self {
        self.overruns_only = true;
        self
    }

    /// Consumes the sink and returns the writer.
    pub fn into_writer(self) -> W {
        self.writer
    }
}

fn ms(t: HostTime) -> f64 {
    t.micros() as f64 / 1000.0
}

fn phase_name(phase: Phase) -> &'static str {
    match phase {
        Phase::Sustain => "sustain",
        Phase::Trial => "trial",
        Phase::Transit => "transit",
    }
}

fn token_name(token: TimerToken) -> String {
    match token {
        TimerToken::Leaf(leaf) => format!("leaf#{}", leaf.index()),
        TimerToken::Evaluate => "eval".to_owned(),
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_session(&mut self, e: &SessionEvent) {
        let edge = match e.edge {
            SessionEdge::Started => "start",
            SessionEdge::Stopped => "stop",
        };
        let _ = writeln!(
            self.writer,
            "[session:{edge}] id={} leaves={} range={:?} at {:.3}ms",
            e.session.0,
            e.leaves,
            e.range,
            ms(e.timestamp),
        );
    }

    fn on_leaf_play(&mut self, e: &LeafPlayEvent) {
        let budget = e.budget_left();
        if self.overruns_only && budget >= 0 {
            return;
        }
        let verdict = if budget < 0 { "OVERRUN" } else { "ok" };
        let _ = writeln!(
            self.writer,
            "[play] leaf#{} grades=({}, {}) cost={}µs period={}µs budget={budget}µs {verdict} at {:.3}ms",
            e.leaf.index(),
            e.current,
            e.future,
            e.cost.micros(),
            e.period.micros(),
            ms(e.fired_at),
        );
    }

    fn on_grade_change(&mut self, e: &GradeChangeEvent) {
        let _ = writeln!(
            self.writer,
            "[grade] ({}, {}) -> ({}, {}) {} at {:.3}ms",
            e.from.0,
            e.from.1,
            e.to.0,
            e.to.1,
            phase_name(e.phase),
            ms(e.timestamp),
        );
    }

    fn on_timer(&mut self, e: &TimerEvent) {
        let action = match e.action {
            TimerAction::Armed(d) => format!("armed +{}µs", d.micros()),
            TimerAction::Cancelled => "cancelled".to_owned(),
        };
        let _ = writeln!(
            self.writer,
            "[timer] {} {action} at {:.3}ms",
            token_name(e.token),
            ms(e.timestamp),
        );
    }

    fn on_period_change(&mut self, e: &PeriodChangeEvent) {
        let _ = writeln!(
            self.writer,
            "[period] leaf#{} {}µs -> {}µs at {:.3}ms",
            e.leaf.index(),
            e.old.micros(),
            e.new.micros(),
            ms(e.timestamp),
        );
    }

    fn on_policy_change(&mut self, e: &PolicyChangeEvent) {
        let _ = writeln!(
            self.writer,
            "[policy] {} -> {} at {:.3}ms",
            e.old,
            e.new,
            ms(e.timestamp),
        );
    }
}
