// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Virtual-time host, simulated graphics, and pacing metrics for cadence
//! demos and tests.
//!
//! A [`Simulation`](sim::Simulation) wires a
//! [`PaceMaker`](cadence_core::driver::PaceMaker) to a
//! [`ManualDispatcher`](clock::ManualDispatcher) and a
//! [`BoxScene`](scene::BoxScene) sharing one
//! [`VirtualClock`](clock::VirtualClock). Drawing a box advances that clock,
//! so a whole drag gesture runs deterministically and the control policies
//! react to the simulated load exactly as they would to real draw times.

#![no_std]

extern crate alloc;

pub mod canvas;
pub mod clock;
pub mod metrics;
pub mod scene;
pub mod sim;
