// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Iterative depth-first traversal over relative edges.
//!
//! Relative edges are not checked for cycles when they are written, so every
//! walk keeps a visited set. A node is expanded at most once; an edge back to
//! an already visited node contributes nothing.
//!
//! [`GraphWalk`] does not own the edges. The caller pops pending nodes,
//! fetches their outgoing edges from wherever they live (usually an async
//! store) and pushes the targets back:
//!
//! ```
//! use loom_authz_core::GraphWalk;
//!
//! let edges = |n: u32| if n < 3 { vec![n + 1, 0] } else { vec![] };
//!
//! let mut walk = GraphWalk::new(0u32);
//! while let Some(node) = walk.next_pending() {
//! 	walk.push_edges(edges(node));
//! }
//! assert_eq!(walk.into_visited(), vec![0, 1, 2, 3]);
//! ```

use std::collections::HashSet;
use std::hash::Hash;

/// Worklist state for one traversal.
#[derive(Debug, Clone)]
pub struct GraphWalk<T> {
	visited: HashSet<T>,
	order: Vec<T>,
	stack: Vec<T>,
}

impl<T> GraphWalk<T>
where
	T: Copy + Eq + Hash,
{
	/// Start a walk. The start node counts as visited.
	pub fn new(start: T) -> Self {
		let mut visited = HashSet::new();
		visited.insert(start);
		Self {
			visited,
			order: vec![start],
			stack: vec![start],
		}
	}

	/// The next node whose edges have not been expanded yet.
	pub fn next_pending(&mut self) -> Option<T> {
		self.stack.pop()
	}

	/// Record the targets of the edges leaving the node just popped.
	pub fn push_edges<I>(&mut self, targets: I)
	where
		I: IntoIterator<Item = T>,
	{
		for target in targets {
			if self.visited.insert(target) {
				self.order.push(target);
				self.stack.push(target);
			}
		}
	}

	pub fn len(&self) -> usize {
		self.order.len()
	}

	pub fn is_empty(&self) -> bool {
		self.order.is_empty()
	}

	/// Every node reached, in discovery order, start node first.
	pub fn into_visited(self) -> Vec<T> {
		self.order
	}
}

/// Reflexive-transitive closure of `start` under a synchronous edge function.
pub fn closure<T, F, I>(start: T, mut edges: F) -> Vec<T>
where
	T: Copy + Eq + Hash,
	F: FnMut(T) -> I,
	I: IntoIterator<Item = T>,
{
	let mut walk = GraphWalk::new(start);
	while let Some(node) = walk.next_pending() {
		walk.push_edges(edges(node));
	}
	tracing::trace!(reached = walk.len(), "graph walk complete");
	walk.into_visited()
}
