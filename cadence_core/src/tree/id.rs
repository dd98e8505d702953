// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node identity.

use core::fmt;

/// Sentinel value indicating "no node" in index fields.
pub(crate) const INVALID: u32 = u32::MAX;

/// A handle to a node in a [`SchedTree`](super::SchedTree).
///
/// Contains both a slot index and a generation counter so that stale handles
/// can be detected after a node is destroyed and the slot is reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    /// Returns the raw slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}@gen{})", self.idx, self.generation)
    }
}
