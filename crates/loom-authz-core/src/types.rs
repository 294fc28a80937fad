// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions for hierarchical authorization.
//!
//! - **ID newtypes**: store-assigned integer identities ([`ResourceId`],
//!   [`UserId`], [`AuthorizationId`]) that cannot be mixed up at compile time
//! - **Records**: [`Resource`], [`User`] and [`Authorization`] as read back from
//!   the store, with their edge lists and operation sets attached
//! - **Inputs**: [`NewResource`], [`NewUser`] and [`NewGrant`] describe rows to
//!   be written
//! - **Results**: [`EffectiveAuthorization`] is the synthesized, never persisted
//!   outcome of a resolution query

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Newtypes
// =============================================================================

/// Error returned when parsing an ID from a string fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid id: {0}")]
pub struct IdParseError(String);

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(
			Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
		)]
		#[serde(transparent)]
		pub struct $name(i64);

		impl $name {
			/// Wrap a raw store identity.
			pub fn new(id: i64) -> Self {
				Self(id)
			}

			/// Get the raw store identity.
			pub fn into_inner(self) -> i64 {
				self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl From<i64> for $name {
			fn from(id: i64) -> Self {
				Self(id)
			}
		}

		impl From<$name> for i64 {
			fn from(id: $name) -> Self {
				id.0
			}
		}

		impl FromStr for $name {
			type Err = IdParseError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				s.trim()
					.parse::<i64>()
					.map(Self)
					.map_err(|_| IdParseError(s.to_string()))
			}
		}
	};
}

define_id_type!(ResourceId, "Store-assigned identifier for a resource.");
define_id_type!(UserId, "Store-assigned identifier for an authorization user.");
define_id_type!(AuthorizationId, "Store-assigned identifier for a grant.");

// =============================================================================
// Resources
// =============================================================================

/// A resource with its edge lists attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
	pub id: ResourceId,
	/// Opaque classification, e.g. `"device"`.
	pub resource_type: String,
	/// Parents recorded at creation. Only consulted for grant propagation.
	pub parent_ids: Vec<ResourceId>,
	/// Relatives whose grants are reachable when resolving this resource.
	pub relative_ids: Vec<ResourceId>,
	pub created_at: DateTime<Utc>,
}

/// A resource row and its edges, before the store has assigned an identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewResource {
	pub resource_type: String,
	pub parent_ids: Vec<ResourceId>,
	pub relative_ids: Vec<ResourceId>,
}

// =============================================================================
// Users
// =============================================================================

/// An authorization user (a person, role or group) with its relative edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
	pub id: UserId,
	pub user_type: String,
	/// Users whose grants this user also holds.
	pub relative_ids: Vec<UserId>,
	pub created_at: DateTime<Utc>,
}

/// A user row and its relative edges, before the store has assigned an identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
	pub user_type: String,
	pub relative_ids: Vec<UserId>,
}

/// Public view of a user returned by lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
	pub user_type: String,
	pub relative_ids: Vec<UserId>,
}

impl From<User> for UserInfo {
	fn from(user: User) -> Self {
		Self {
			user_type: user.user_type,
			relative_ids: user.relative_ids,
		}
	}
}

// =============================================================================
// Grants
// =============================================================================

/// One persisted grant binding a user to a resource.
///
/// At most one exists per `(user_id, resource_id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
	pub id: AuthorizationId,
	pub user_id: UserId,
	pub resource_id: ResourceId,
	pub is_owner: bool,
	pub is_heritable: bool,
	pub is_updatable: bool,
	pub is_deletable: bool,
	pub operations: BTreeSet<String>,
	pub created_at: DateTime<Utc>,
}

/// A grant to be written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewGrant {
	pub user_id: UserId,
	pub resource_id: ResourceId,
	pub is_owner: bool,
	pub is_heritable: bool,
	pub is_updatable: bool,
	pub is_deletable: bool,
	pub operations: BTreeSet<String>,
}

impl NewGrant {
	/// A plain grant with no capability flags and no operations.
	pub fn new(user_id: UserId, resource_id: ResourceId) -> Self {
		Self {
			user_id,
			resource_id,
			..Default::default()
		}
	}

	/// The grant installed for the owner of a freshly created resource.
	pub fn owner(user_id: UserId, resource_id: ResourceId) -> Self {
		Self {
			user_id,
			resource_id,
			is_owner: true,
			is_heritable: true,
			is_updatable: true,
			is_deletable: true,
			operations: BTreeSet::new(),
		}
	}

	/// A copy of `source` for the same user on another resource.
	///
	/// Ownership is never inherited.
	pub fn inherited_from(source: &Authorization, resource_id: ResourceId) -> Self {
		Self {
			user_id: source.user_id,
			resource_id,
			is_owner: false,
			is_heritable: source.is_heritable,
			is_updatable: source.is_updatable,
			is_deletable: source.is_deletable,
			operations: source.operations.clone(),
		}
	}

	pub fn with_operations<I, S>(mut self, operations: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.operations = operations.into_iter().map(Into::into).collect();
		self
	}

	pub fn heritable(mut self, value: bool) -> Self {
		self.is_heritable = value;
		self
	}

	pub fn updatable(mut self, value: bool) -> Self {
		self.is_updatable = value;
		self
	}

	pub fn deletable(mut self, value: bool) -> Self {
		self.is_deletable = value;
		self
	}
}

/// Result of an idempotent grant write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "authorization_id", rename_all = "snake_case")]
pub enum GrantOutcome {
	/// A new grant row and its operation rows were written.
	Created(AuthorizationId),
	/// A grant already existed for the pair; nothing was changed.
	Unchanged(AuthorizationId),
}

impl GrantOutcome {
	pub fn authorization_id(&self) -> AuthorizationId {
		match self {
			GrantOutcome::Created(id) | GrantOutcome::Unchanged(id) => *id,
		}
	}

	pub fn is_created(&self) -> bool {
		matches!(self, GrantOutcome::Created(_))
	}
}

// =============================================================================
// Effective Authorization
// =============================================================================

/// The aggregate of every grant reachable from a `(user, resource)` pair.
///
/// Computed fresh for each query and never written back to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveAuthorization {
	pub user_id: UserId,
	pub resource_id: ResourceId,
	/// Only true when the direct grant on exactly this pair says so.
	pub is_owner: bool,
	pub is_heritable: bool,
	pub is_updatable: bool,
	pub is_deletable: bool,
	pub operations: BTreeSet<String>,
}

impl EffectiveAuthorization {
	/// Returns true if `operation` is among the aggregated operations.
	///
	/// Names are compared exactly; there is no wildcard or hierarchy.
	pub fn permits(&self, operation: &str) -> bool {
		self.operations.contains(operation)
	}
}
