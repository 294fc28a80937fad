// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-process cache of resolved effective authorizations.
//!
//! Invalidation is coarse: every write through the service drops the whole
//! map. Each invalidation bumps a generation counter, and a resolution may
//! only be inserted under the generation it started in, so a query that raced
//! a write can never re-populate the cache with its stale result.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use loom_authz_core::{EffectiveAuthorization, ResourceId, UserId};
use parking_lot::RwLock;

pub struct ResolutionCache {
	enabled: bool,
	entries: RwLock<HashMap<(UserId, ResourceId), EffectiveAuthorization>>,
	generation: AtomicU64,
}

impl ResolutionCache {
	pub fn new(enabled: bool) -> Self {
		Self {
			enabled,
			entries: RwLock::new(HashMap::new()),
			generation: AtomicU64::new(0),
		}
	}

	pub fn disabled() -> Self {
		Self::new(false)
	}

	pub fn is_enabled(&self) -> bool {
		self.enabled
	}

	/// Current generation. Read it before resolving and pass it to [`Self::insert`].
	pub fn generation(&self) -> u64 {
		self.generation.load(Ordering::Acquire)
	}

	pub fn get(&self, user_id: UserId, resource_id: ResourceId) -> Option<EffectiveAuthorization> {
		if !self.enabled {
			return None;
		}
		self.entries.read().get(&(user_id, resource_id)).cloned()
	}

	/// Store a resolution computed under `generation`.
	///
	/// Returns false if an invalidation happened since, in which case nothing
	/// is stored.
	pub fn insert(&self, generation: u64, effective: EffectiveAuthorization) -> bool {
		if !self.enabled {
			return false;
		}

		let mut entries = self.entries.write();
		if self.generation.load(Ordering::Acquire) != generation {
			tracing::trace!(generation, "discarding resolution from an older generation");
			return false;
		}
		entries.insert((effective.user_id, effective.resource_id), effective);
		true
	}

	pub fn invalidate_all(&self) {
		let mut entries = self.entries.write();
		self.generation.fetch_add(1, Ordering::AcqRel);
		let dropped = entries.len();
		entries.clear();
		tracing::trace!(dropped, "resolution cache invalidated");
	}

	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl Default for ResolutionCache {
	fn default() -> Self {
		Self::new(true)
	}
}
