// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error taxonomy for the authorization engine.

use loom_authz_core::{ResourceId, UserId};
use loom_server_db::DbError;

pub type Result<T> = std::result::Result<T, AuthzError>;

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
	#[error("{entity} {id} not found")]
	NotFound { entity: &'static str, id: i64 },

	#[error("Validation error: {0}")]
	Validation(String),

	#[error("Already exists: {0}")]
	AlreadyExists(String),

	#[error("User {user_id} has no reachable grant on resource {resource_id}")]
	Unauthorized {
		user_id: UserId,
		resource_id: ResourceId,
	},

	#[error("Storage error: {0}")]
	Storage(#[source] DbError),

	/// A multi-step write failed after part of it was committed.
	///
	/// `compensation` is `None` when the rollback succeeded or was not
	/// possible to attempt, and holds the rollback error otherwise.
	#[error("{operation} failed after partial commit: {source}{}", compensation_suffix(.compensation))]
	PartialCascadeFailure {
		operation: &'static str,
		#[source]
		source: Box<AuthzError>,
		compensation: Option<Box<AuthzError>>,
	},
}

fn compensation_suffix(compensation: &Option<Box<AuthzError>>) -> String {
	match compensation {
		Some(e) => format!(" (compensation failed: {e})"),
		None => String::new(),
	}
}

impl AuthzError {
	pub fn user_not_found(id: UserId) -> Self {
		AuthzError::NotFound {
			entity: "User",
			id: id.into_inner(),
		}
	}

	pub fn resource_not_found(id: ResourceId) -> Self {
		AuthzError::NotFound {
			entity: "Resource",
			id: id.into_inner(),
		}
	}

	pub fn is_unauthorized(&self) -> bool {
		matches!(self, AuthzError::Unauthorized { .. })
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, AuthzError::NotFound { .. })
	}
}

impl From<DbError> for AuthzError {
	fn from(e: DbError) -> Self {
		match e {
			DbError::NotFound(msg) => AuthzError::Validation(msg),
			DbError::Conflict(msg) => AuthzError::AlreadyExists(msg),
			// A refused delete is a storage failure, not a duplicate.
			other @ DbError::StillReferenced(_) => AuthzError::Storage(other),
			other => AuthzError::Storage(other),
		}
	}
}
