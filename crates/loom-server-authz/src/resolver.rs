// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Effective authorization resolution.
//!
//! For a query `(user, resource)`:
//!
//! 1. Walk resource relative edges from `resource` to get every reachable resource.
//! 2. Walk user relative edges from `user` to get every candidate user.
//! 3. Fetch the direct grants in `candidates x reachable` with one query.
//! 4. OR the flags and union the operations; no grant at all is `Unauthorized`.
//!
//! Both walks keep a visited set, so cyclic edges terminate and contribute
//! nothing extra.

use loom_authz_core::{aggregate, EffectiveAuthorization, GraphWalk, ResourceId, UserId};

use crate::error::{AuthzError, Result};
use crate::service::AuthzService;

impl AuthzService {
	/// Resolve the effective authorization of `user_id` on `resource_id`.
	///
	/// # Errors
	/// - `NotFound` if the user or resource does not exist
	/// - `Unauthorized` if no grant is reachable through either graph
	#[tracing::instrument(skip(self), fields(user_id = %user_id, resource_id = %resource_id))]
	pub async fn get_authorization(
		&self,
		user_id: UserId,
		resource_id: ResourceId,
	) -> Result<EffectiveAuthorization> {
		if let Some(hit) = self.cache.get(user_id, resource_id) {
			tracing::trace!("resolution cache hit");
			return Ok(hit);
		}
		let generation = self.cache.generation();

		self.require_user(user_id).await?;
		self.require_resource(resource_id).await?;

		let reachable = self.reachable_resources(resource_id).await?;
		let candidates = self.candidate_users(user_id).await?;
		let grants = self.grants.list_grants_matching(&candidates, &reachable).await?;

		tracing::debug!(
			reachable = reachable.len(),
			candidates = candidates.len(),
			grants = grants.len(),
			"collected reachable grants"
		);

		let effective = aggregate(user_id, resource_id, &grants).ok_or(AuthzError::Unauthorized {
			user_id,
			resource_id,
		})?;

		self.cache.insert(generation, effective.clone());
		Ok(effective)
	}

	/// Whether `operation` is in the effective authorization.
	///
	/// Having no reachable grant is `false`; any other failure is returned.
	#[tracing::instrument(skip(self), fields(user_id = %user_id, resource_id = %resource_id))]
	pub async fn is_allowed(
		&self,
		user_id: UserId,
		resource_id: ResourceId,
		operation: &str,
	) -> Result<bool> {
		match self.get_authorization(user_id, resource_id).await {
			Ok(effective) => Ok(effective.permits(operation)),
			Err(e) if e.is_unauthorized() => Ok(false),
			Err(e) => Err(e),
		}
	}

	/// `resource_id` plus everything reachable over resource relative edges.
	pub(crate) async fn reachable_resources(&self, resource_id: ResourceId) -> Result<Vec<ResourceId>> {
		let mut walk = GraphWalk::new(resource_id);
		while let Some(node) = walk.next_pending() {
			walk.push_edges(self.resources.list_relative_ids(node).await?);
		}
		Ok(walk.into_visited())
	}

	/// `user_id` plus everything reachable over user relative edges.
	pub(crate) async fn candidate_users(&self, user_id: UserId) -> Result<Vec<UserId>> {
		let mut walk = GraphWalk::new(user_id);
		while let Some(node) = walk.next_pending() {
			walk.push_edges(self.principals.list_relative_ids(node).await?);
		}
		Ok(walk.into_visited())
	}
}
