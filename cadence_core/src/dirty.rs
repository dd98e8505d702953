// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! The scheduling tree tracks stale grade caches with [`understory_dirty`].
//! Every parent *depends on* each of its children on the [`GRADES`] channel,
//! so marking a node with [`EagerPolicy`](understory_dirty::EagerPolicy)
//! marks the node and all of its ancestors, and a sorted drain yields children
//! before parents. That is exactly the order in which
//! [`SchedTree::regrade_stale`](crate::tree::SchedTree::regrade_stale)
//! must recompute caches.
//!
//! Structural mutations (append, insert, remove) mark the mutated node.
//! Nothing is recomputed until the caller asks for it.

use understory_dirty::Channel;

/// A node's cached grade range may no longer match its children.
pub const GRADES: Channel = Channel::new(0);
