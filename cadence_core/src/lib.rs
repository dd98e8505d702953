// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Adaptive grade scheduling for interactive screen repair.
//!
//! While a user drags many independently redrawable regions at once, a fixed
//! period repaint loop cannot always repaint everything in time.
//! `cadence_core` trades repaint *quality* (a discrete [`Grade`]) against
//! *timeliness* (each tick's period budget), using timing telemetry from past
//! ticks, and restores full quality once slack comes back without
//! oscillating between grades. It is `no_std` compatible (with `alloc`).
//!
//! # Architecture
//!
//! ```text
//!   Dispatcher (host timers)
//!       │ TimerToken
//!       ▼
//!   PaceMaker::fire() ──► PaceKeeper::play() ──► SchedTree::play(RunTime)
//!       │                        ▲                     │
//!       │                        │ measured cost       ▼
//!       │                        └──────────── Canvas / Graphics
//!       ▼
//!   PaceKeeper::eval() ──► new (current, future) grades
//! ```
//!
//! **[`tree`]**: Arena of scheduling nodes with generational handles.
//! Periodic leaves re-arm themselves while their range is in play; repair
//! leaves repaint a graphic in one of several styles.
//!
//! **[`sharing`]**: How the children of a multi-child node read a shared
//! grade range: tiled, normalized, or distributed.
//!
//! **[`pointer`]**: Mapping pointer motion to a tick period.
//!
//! **[`keeper`]**: The control policies deciding when the session grade
//! moves.
//!
//! **[`driver`]**: [`PaceMaker`](driver::PaceMaker), owning the active policy
//! and the timers of one session.
//!
//! **[`grade`]**: Grades, ranges, fade classification, and the per-tick
//! [`RunTime`](grade::RunTime).
//!
//! **[`timer`]**: The host [`Dispatcher`](timer::Dispatcher) contract and
//! per-session timer bookkeeping.
//!
//! **[`canvas`]**: The drawing surface and drawable graphic contracts.
//!
//! **[`damage`]**: Bounding-box damage accumulators shared by repair leaves.
//!
//! **[`dirty`]**: The `understory_dirty` channel marking stale grade caches.
//!
//! **[`time`]**: Microsecond host time and the pausable logical clock.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! session instrumentation, with a zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//!
//! [`Grade`]: grade::Grade

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod canvas;
pub mod damage;
pub mod dirty;
pub mod driver;
pub mod grade;
pub mod keeper;
pub mod pointer;
pub mod sharing;
pub mod time;
pub mod timer;
pub mod trace;
pub mod tree;

#[cfg(test)]
mod testing;
