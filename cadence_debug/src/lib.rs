// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording, pretty-printing, and Chrome trace export for cadence
//! diagnostics.
//!
//! This crate provides [`TraceSink`](cadence_core::trace::TraceSink)
//! implementations for development and post-mortem analysis:
//!
//! - [`pretty::PrettyPrintSink`]: human-readable one-line-per-event output.
//! - [`recorder::RecorderSink`]: typed in-memory recording, with
//!   [`recorder::SharedRecorder`] for reading it back while a driver owns the
//!   sink.
//! - [`chrome::export`]: writes Chrome Trace Event Format JSON from recorded
//!   events.

pub mod chrome;
pub mod pretty;
pub mod recorder;
