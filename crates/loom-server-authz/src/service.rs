// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization service: the entry point for every graph and grant mutation.
//!
//! Single-entity writes (a resource with its edges, a user with its edges, a
//! grant with its operations) are one store transaction each. Multi-entity
//! cascades are sequenced here:
//!
//! - **Create resource**: resource row and edges, then the optional owner
//!   grant, then a snapshot copy of every heritable direct grant on each parent
//!   when the resource is public. A failure after the resource committed
//!   deletes it again through the delete cascade.
//! - **Delete resource/user**: grants first, then the entity and its edges.
//!
//! Every successful write invalidates the whole resolution cache and then
//! publishes its events.

use std::sync::Arc;

use loom_authz_core::{
	Authorization, GrantOutcome, NewGrant, NewResource, NewUser, Resource, ResourceId, UserId,
	UserInfo,
};
use loom_server_db::{
	create_pool, run_migrations, GrantRepository, GrantStore, PrincipalRepository, PrincipalStore,
	ResourceRepository, ResourceStore,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::sqlite::SqlitePool;

use crate::cache::ResolutionCache;
use crate::config::AuthzConfig;
use crate::error::{AuthzError, Result};
use crate::events::{AuthzEvent, EventBus, EventStatus, Topic, TopicSubscription};

/// Request to create a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateResource {
	pub resource_type: String,
	#[serde(default)]
	pub parent_ids: Vec<ResourceId>,
	#[serde(default)]
	pub relative_ids: Vec<ResourceId>,
	/// Copy heritable grants from every parent onto the new resource.
	#[serde(default)]
	pub is_public: bool,
	/// User that receives an owner grant on the new resource.
	#[serde(default)]
	pub owner: Option<UserId>,
}

impl CreateResource {
	pub fn new(resource_type: impl Into<String>) -> Self {
		Self {
			resource_type: resource_type.into(),
			..Default::default()
		}
	}

	pub fn with_parents(mut self, parent_ids: impl IntoIterator<Item = ResourceId>) -> Self {
		self.parent_ids = parent_ids.into_iter().collect();
		self
	}

	pub fn with_relatives(mut self, relative_ids: impl IntoIterator<Item = ResourceId>) -> Self {
		self.relative_ids = relative_ids.into_iter().collect();
		self
	}

	pub fn public(mut self, is_public: bool) -> Self {
		self.is_public = is_public;
		self
	}

	pub fn owned_by(mut self, owner: UserId) -> Self {
		self.owner = Some(owner);
		self
	}
}

#[derive(Clone)]
pub struct AuthzService {
	pub(crate) resources: Arc<dyn ResourceStore>,
	pub(crate) principals: Arc<dyn PrincipalStore>,
	pub(crate) grants: Arc<dyn GrantStore>,
	pub(crate) cache: Arc<ResolutionCache>,
	events: EventBus,
}

impl AuthzService {
	pub fn new(
		resources: Arc<dyn ResourceStore>,
		principals: Arc<dyn PrincipalStore>,
		grants: Arc<dyn GrantStore>,
		cache: ResolutionCache,
		events: EventBus,
	) -> Self {
		Self {
			resources,
			principals,
			grants,
			cache: Arc::new(cache),
			events,
		}
	}

	/// Build a service over an already migrated pool.
	pub fn from_pool(pool: SqlitePool, config: &AuthzConfig) -> Self {
		Self::new(
			Arc::new(ResourceRepository::new(pool.clone())),
			Arc::new(PrincipalRepository::new(pool.clone())),
			Arc::new(GrantRepository::new(pool)),
			ResolutionCache::new(config.cache.enabled),
			EventBus::new(config.events.channel_capacity),
		)
	}

	/// Open the configured database, create the schema if needed and build a service.
	#[tracing::instrument(skip(config), fields(database = %config.database.url))]
	pub async fn connect(config: &AuthzConfig) -> Result<Self> {
		let pool = create_pool(&config.database.url, config.database.max_connections).await?;
		run_migrations(&pool).await?;
		let service = Self::from_pool(pool, config);
		tracing::info!(cache_enabled = service.cache.is_enabled(), "authorization service ready");
		Ok(service)
	}

	pub fn subscribe_topic(&self, topic: Topic) -> TopicSubscription {
		self.events.subscribe_topic(topic)
	}

	pub fn cache(&self) -> &ResolutionCache {
		&self.cache
	}

	// =========================================================================
	// Resource graph
	// =========================================================================

	/// Create a resource, its edges, its owner grant and its propagated grants.
	///
	/// # Errors
	/// - `Validation` if a parent, relative or the owner does not exist
	/// - `PartialCascadeFailure` if a grant step failed and the created
	///   resource could not be removed again
	#[tracing::instrument(
		skip(self, request),
		fields(
			resource_type = %request.resource_type,
			parents = request.parent_ids.len(),
			relatives = request.relative_ids.len(),
			is_public = request.is_public,
		)
	)]
	pub async fn create_resource(&self, request: CreateResource) -> Result<ResourceId> {
		for parent_id in &request.parent_ids {
			if !self.resources.resource_exists(*parent_id).await? {
				return Err(AuthzError::Validation(format!(
					"parent resource {parent_id} does not exist"
				)));
			}
		}
		for relative_id in &request.relative_ids {
			if !self.resources.resource_exists(*relative_id).await? {
				return Err(AuthzError::Validation(format!(
					"relative resource {relative_id} does not exist"
				)));
			}
		}
		if let Some(owner) = request.owner {
			if !self.principals.user_exists(owner).await? {
				return Err(AuthzError::Validation(format!(
					"owner user {owner} does not exist"
				)));
			}
		}

		let id = self
			.resources
			.create_resource(&NewResource {
				resource_type: request.resource_type.clone(),
				parent_ids: request.parent_ids.clone(),
				relative_ids: request.relative_ids.clone(),
			})
			.await?;

		let grant_events = match self.install_initial_grants(id, &request).await {
			Ok(events) => events,
			Err(err) => return Err(self.compensate_create(id, err).await),
		};

		self.cache.invalidate_all();
		self.events.publish(AuthzEvent::new(
			Topic::Resource,
			EventStatus::Created,
			json!({
				"id": id,
				"resource_type": request.resource_type,
				"parent_ids": request.parent_ids,
				"relative_ids": request.relative_ids,
				"is_public": request.is_public,
			}),
		));
		for event in grant_events {
			self.events.publish(event);
		}

		tracing::debug!(resource_id = %id, "resource created");
		Ok(id)
	}

	/// Owner grant, then the creation-time snapshot of heritable parent grants.
	///
	/// A heritable parent grant held by the owner is folded into the owner
	/// grant, so the owner keeps every inherited operation.
	async fn install_initial_grants(
		&self,
		id: ResourceId,
		request: &CreateResource,
	) -> Result<Vec<AuthzEvent>> {
		let mut inherited: Vec<Authorization> = Vec::new();
		if request.is_public {
			for parent_id in &request.parent_ids {
				let heritable: Vec<Authorization> = self
					.grants
					.list_grants_for_resource(*parent_id)
					.await?
					.into_iter()
					.filter(|grant| grant.is_heritable)
					.collect();

				tracing::debug!(
					parent_id = %parent_id,
					count = heritable.len(),
					"propagating heritable grants"
				);
				inherited.extend(heritable);
			}
		}

		let mut events = Vec::new();

		if let Some(owner) = request.owner {
			let mut grant = NewGrant::owner(owner, id);
			for source in inherited.iter().filter(|g| g.user_id == owner) {
				grant.operations.extend(source.operations.iter().cloned());
			}
			let outcome = self.grants.create_grant(&grant).await?;
			events.push(grant_event(EventStatus::Created, owner, id, outcome).with_context("owner"));
		}

		for grant in inherited.iter().filter(|g| Some(g.user_id) != request.owner) {
			let outcome = self
				.grants
				.create_grant(&NewGrant::inherited_from(grant, id))
				.await?;
			if outcome.is_created() {
				events.push(
					grant_event(EventStatus::Created, grant.user_id, id, outcome)
						.with_context("propagated"),
				);
			}
		}

		Ok(events)
	}

	/// Undo a resource whose follow-up steps failed, and pick the error to report.
	async fn compensate_create(&self, id: ResourceId, err: AuthzError) -> AuthzError {
		tracing::warn!(resource_id = %id, error = %err, "resource creation failed after commit, compensating");

		let compensation = self.remove_resource(id).await;
		self.cache.invalidate_all();

		match compensation {
			Ok(_) => err,
			Err(compensation_err) => {
				tracing::error!(
					resource_id = %id,
					error = %compensation_err,
					"compensating delete failed, resource left behind"
				);
				AuthzError::PartialCascadeFailure {
					operation: "create_resource",
					source: Box::new(err),
					compensation: Some(Box::new(compensation_err)),
				}
			}
		}
	}

	/// Delete cascade without existence checks. A resource that is already
	/// gone counts as removed.
	async fn remove_resource(&self, id: ResourceId) -> Result<bool> {
		self.grants.delete_grants_for_resource(id).await?;
		Ok(self.resources.delete_resource(id).await?)
	}

	#[tracing::instrument(skip(self), fields(resource_id = %id))]
	pub async fn get_resource(&self, id: ResourceId) -> Result<Resource> {
		self.resources
			.get_resource_by_id(id)
			.await?
			.ok_or_else(|| AuthzError::resource_not_found(id))
	}

	#[tracing::instrument(skip(self), fields(resource_type = %resource_type))]
	pub async fn list_resources_by_type(&self, resource_type: &str) -> Result<Vec<Resource>> {
		Ok(self.resources.list_resources_by_type(resource_type).await?)
	}

	/// Delete a resource, every grant on it and every edge touching it.
	///
	/// # Errors
	/// - `NotFound` if the resource does not exist
	/// - `PartialCascadeFailure` if grants were removed but the resource row
	///   could not be
	#[tracing::instrument(skip(self), fields(resource_id = %id))]
	pub async fn delete_resource(&self, id: ResourceId) -> Result<()> {
		self.require_resource(id).await?;

		let removed_grants = self.grants.delete_grants_for_resource(id).await?;
		if removed_grants > 0 {
			self.cache.invalidate_all();
		}

		match self.resources.delete_resource(id).await {
			Ok(true) => {}
			Ok(false) => return Err(AuthzError::resource_not_found(id)),
			Err(e) if removed_grants > 0 => {
				tracing::error!(resource_id = %id, removed_grants, error = %e, "resource delete failed after its grants were removed");
				return Err(AuthzError::PartialCascadeFailure {
					operation: "delete_resource",
					source: Box::new(e.into()),
					compensation: None,
				});
			}
			Err(e) => return Err(e.into()),
		}

		self.cache.invalidate_all();
		self.events.publish(AuthzEvent::new(
			Topic::Resource,
			EventStatus::Deleted,
			json!({ "id": id, "removed_grants": removed_grants }),
		));

		tracing::debug!(removed_grants, "resource deleted");
		Ok(())
	}

	// =========================================================================
	// User graph
	// =========================================================================

	/// Create a user that also holds every grant held by `relative_ids`.
	///
	/// # Errors
	/// `Validation` if a relative does not exist.
	#[tracing::instrument(skip(self, relative_ids), fields(user_type = %user_type, relatives = relative_ids.len()))]
	pub async fn create_user(&self, relative_ids: &[UserId], user_type: &str) -> Result<UserId> {
		for relative_id in relative_ids {
			if !self.principals.user_exists(*relative_id).await? {
				return Err(AuthzError::Validation(format!(
					"relative user {relative_id} does not exist"
				)));
			}
		}

		let id = self
			.principals
			.create_user(&NewUser {
				user_type: user_type.to_string(),
				relative_ids: relative_ids.to_vec(),
			})
			.await?;

		self.cache.invalidate_all();
		self.events.publish(AuthzEvent::new(
			Topic::User,
			EventStatus::Created,
			json!({ "id": id, "user_type": user_type, "relative_ids": relative_ids }),
		));

		tracing::debug!(user_id = %id, "user created");
		Ok(id)
	}

	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn get_user_info(&self, id: UserId) -> Result<UserInfo> {
		self.principals
			.get_user_by_id(id)
			.await?
			.map(UserInfo::from)
			.ok_or_else(|| AuthzError::user_not_found(id))
	}

	/// Delete a user, every grant it holds directly and every edge touching it.
	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn delete_user(&self, id: UserId) -> Result<()> {
		self.require_user(id).await?;

		let removed_grants = self.grants.delete_grants_for_user(id).await?;
		if removed_grants > 0 {
			self.cache.invalidate_all();
		}

		match self.principals.delete_user(id).await {
			Ok(true) => {}
			Ok(false) => return Err(AuthzError::user_not_found(id)),
			Err(e) if removed_grants > 0 => {
				tracing::error!(user_id = %id, removed_grants, error = %e, "user delete failed after its grants were removed");
				return Err(AuthzError::PartialCascadeFailure {
					operation: "delete_user",
					source: Box::new(e.into()),
					compensation: None,
				});
			}
			Err(e) => return Err(e.into()),
		}

		self.cache.invalidate_all();
		self.events.publish(AuthzEvent::new(
			Topic::User,
			EventStatus::Deleted,
			json!({ "id": id, "removed_grants": removed_grants }),
		));

		tracing::debug!(removed_grants, "user deleted");
		Ok(())
	}

	// =========================================================================
	// Grants
	// =========================================================================

	/// Grant `grant.user_id` access to `grant.resource_id`.
	///
	/// Idempotent on the pair: if a grant already exists nothing is changed
	/// and [`GrantOutcome::Unchanged`] is returned.
	#[tracing::instrument(
		skip(self, grant),
		fields(user_id = %grant.user_id, resource_id = %grant.resource_id)
	)]
	pub async fn create_authorization(&self, grant: NewGrant) -> Result<GrantOutcome> {
		self.require_user(grant.user_id).await?;
		self.require_resource(grant.resource_id).await?;

		let outcome = self.grants.create_grant(&grant).await?;

		if outcome.is_created() {
			self.cache.invalidate_all();
			self.events.publish(grant_event(
				EventStatus::Created,
				grant.user_id,
				grant.resource_id,
				outcome,
			));
		}

		Ok(outcome)
	}

	/// # Errors
	/// `Unauthorized` if no grant exists for the pair.
	#[tracing::instrument(skip(self), fields(user_id = %user_id, resource_id = %resource_id))]
	pub async fn delete_authorization(&self, user_id: UserId, resource_id: ResourceId) -> Result<()> {
		if !self.grants.delete_grant(user_id, resource_id).await? {
			return Err(AuthzError::Unauthorized {
				user_id,
				resource_id,
			});
		}

		self.cache.invalidate_all();
		self.events.publish(AuthzEvent::new(
			Topic::Authorization,
			EventStatus::Deleted,
			json!({ "user_id": user_id, "resource_id": resource_id }),
		));
		Ok(())
	}

	/// The direct grant on exactly this pair, ignoring both graphs.
	///
	/// # Errors
	/// - `NotFound` if the user or resource does not exist
	/// - `Unauthorized` if no grant names the pair
	#[tracing::instrument(skip(self), fields(user_id = %user_id, resource_id = %resource_id))]
	pub async fn get_direct_authorization(
		&self,
		user_id: UserId,
		resource_id: ResourceId,
	) -> Result<Authorization> {
		self.require_user(user_id).await?;
		self.require_resource(resource_id).await?;

		self.grants
			.get_grant(user_id, resource_id)
			.await?
			.ok_or(AuthzError::Unauthorized {
				user_id,
				resource_id,
			})
	}

	/// Direct grants held by a user, ordered by resource ID.
	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn list_authorizations(&self, user_id: UserId) -> Result<Vec<Authorization>> {
		self.require_user(user_id).await?;
		Ok(self.grants.list_grants_for_user(user_id).await?)
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id, resource_type = %resource_type))]
	pub async fn list_authorizations_by_resource_type(
		&self,
		user_id: UserId,
		resource_type: &str,
	) -> Result<Vec<Authorization>> {
		self.require_user(user_id).await?;
		Ok(self
			.grants
			.list_grants_for_user_by_resource_type(user_id, resource_type)
			.await?)
	}

	/// Users holding a direct grant on a resource, ordered by user ID.
	#[tracing::instrument(skip(self), fields(resource_id = %resource_id))]
	pub async fn list_users_for_resource(&self, resource_id: ResourceId) -> Result<Vec<UserId>> {
		self.require_resource(resource_id).await?;
		let grants = self.grants.list_grants_for_resource(resource_id).await?;
		Ok(grants.into_iter().map(|g| g.user_id).collect())
	}

	// =========================================================================
	// Helpers
	// =========================================================================

	pub(crate) async fn require_user(&self, id: UserId) -> Result<()> {
		if self.principals.user_exists(id).await? {
			Ok(())
		} else {
			Err(AuthzError::user_not_found(id))
		}
	}

	pub(crate) async fn require_resource(&self, id: ResourceId) -> Result<()> {
		if self.resources.resource_exists(id).await? {
			Ok(())
		} else {
			Err(AuthzError::resource_not_found(id))
		}
	}
}

fn grant_event(
	status: EventStatus,
	user_id: UserId,
	resource_id: ResourceId,
	outcome: GrantOutcome,
) -> AuthzEvent {
	AuthzEvent::new(
		Topic::Authorization,
		status,
		json!({
			"id": outcome.authorization_id(),
			"user_id": user_id,
			"resource_id": resource_id,
		}),
	)
}
