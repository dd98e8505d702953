// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The scheduling tree.
//!
//! A [`SchedTree`] is an arena of nodes built once per interactive gesture.
//! Node shapes form a closed set:
//!
//! | shape | children | range | on play |
//! |---|---|---|---|
//! | multi | any | from its [`GradeSharing`](crate::sharing::GradeSharing) | delegates as the strategy decides |
//! | single | 0..=1 | child's | forwards |
//! | scheduler | 0..=1 | child's | re-arms itself, then forwards |
//! | pointer-rate scheduler | 0..=1 | child's | relaxes or follows pointer, re-arms, forwards |
//! | action pacer | 0..=1 | child's | before, forward, after |
//! | repair leaves | 0 (select, clipper: 0..=1) | fixed | repaint per [`RepairStyle`] |
//!
//! ```text
//!  Scheduler(16ms)
//!    └─ Tiler [0, 5]
//!         ├─ Redraw #1 [0, 2]
//!         └─ Distributor [0, 2]    (tiled at [3, 5])
//!              ├─ Filler #2 [0, 2]
//!              └─ Repairer #2 [0, 2]
//! ```
//!
//! A periodic leaf stays alive only by re-arming its own timer each time it
//! plays with a live [`FadeKind`](crate::grade::FadeKind); the driver does
//! not poll.

mod id;
mod node;
mod play;
mod store;

pub use id::NodeId;
pub use node::{Action, RepairStyle};
pub use play::{PlayCx, Stage};
pub use store::SchedTree;
