// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Grant repository for database operations.
//!
//! A grant (`authz_authorizations`) binds one user to one resource with
//! capability flags; its named operations live in
//! `authz_authorization_operations`. The `(user_id, resource_id)` pair is
//! unique, and writes are idempotent on it: a second insert for the same pair
//! leaves the first row and its operations untouched.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loom_authz_core::{
	Authorization, AuthorizationId, GrantOutcome, NewGrant, ResourceId, UserId,
};
use sqlx::{sqlite::SqlitePool, QueryBuilder, Row, Sqlite};

/// Upper bound on ids bound into one `IN (...)` list.
const MAX_IDS_PER_LIST: usize = 400;

use crate::error::{map_write_error, DbError};

#[async_trait]
pub trait GrantStore: Send + Sync {
	async fn create_grant(&self, grant: &NewGrant) -> Result<GrantOutcome, DbError>;
	async fn get_grant(
		&self,
		user_id: UserId,
		resource_id: ResourceId,
	) -> Result<Option<Authorization>, DbError>;
	async fn list_grants_for_user(&self, user_id: UserId) -> Result<Vec<Authorization>, DbError>;
	async fn list_grants_for_user_by_resource_type(
		&self,
		user_id: UserId,
		resource_type: &str,
	) -> Result<Vec<Authorization>, DbError>;
	async fn list_grants_for_resource(
		&self,
		resource_id: ResourceId,
	) -> Result<Vec<Authorization>, DbError>;
	async fn list_grants_matching(
		&self,
		user_ids: &[UserId],
		resource_ids: &[ResourceId],
	) -> Result<Vec<Authorization>, DbError>;
	async fn delete_grant(&self, user_id: UserId, resource_id: ResourceId)
		-> Result<bool, DbError>;
	async fn delete_grants_for_resource(&self, resource_id: ResourceId) -> Result<u64, DbError>;
	async fn delete_grants_for_user(&self, user_id: UserId) -> Result<u64, DbError>;
}

const GRANT_SELECT: &str = r#"
	SELECT a.id, a.user_id, a.resource_id, a.is_owner, a.is_heritable, a.is_updatable,
		a.is_deletable, a.created_at,
		(
			SELECT json_group_array(o.operation)
			FROM authz_authorization_operations o
			WHERE o.authorization_id = a.id
		) AS operations
	FROM authz_authorizations a
"#;

/// Repository for grants and their operation sets.
#[derive(Clone)]
pub struct GrantRepository {
	pool: SqlitePool,
}

impl GrantRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	// =========================================================================
	// Writes
	// =========================================================================

	/// Insert a grant and its operations unless one already exists for the pair.
	///
	/// The check and the insert are one statement, so concurrent callers for
	/// the same pair still end up with exactly one row.
	///
	/// # Errors
	/// Returns `DbError::NotFound` if the user or resource row does not exist.
	#[tracing::instrument(
		skip(self, grant),
		fields(user_id = %grant.user_id, resource_id = %grant.resource_id, operations = grant.operations.len())
	)]
	pub async fn create_grant(&self, grant: &NewGrant) -> Result<GrantOutcome, DbError> {
		let mut tx = self.pool.begin().await?;

		let result = sqlx::query(
			r#"
			INSERT INTO authz_authorizations
				(user_id, resource_id, is_owner, is_heritable, is_updatable, is_deletable, created_at)
			VALUES (?, ?, ?, ?, ?, ?, ?)
			ON CONFLICT (user_id, resource_id) DO NOTHING
			"#,
		)
		.bind(grant.user_id.into_inner())
		.bind(grant.resource_id.into_inner())
		.bind(grant.is_owner as i32)
		.bind(grant.is_heritable as i32)
		.bind(grant.is_updatable as i32)
		.bind(grant.is_deletable as i32)
		.bind(Utc::now().to_rfc3339())
		.execute(&mut *tx)
		.await
		.map_err(|e| map_write_error(e, "Grant"))?;

		if result.rows_affected() == 0 {
			let existing: i64 = sqlx::query_scalar(
				"SELECT id FROM authz_authorizations WHERE user_id = ? AND resource_id = ?",
			)
			.bind(grant.user_id.into_inner())
			.bind(grant.resource_id.into_inner())
			.fetch_one(&mut *tx)
			.await?;
			tx.commit().await?;

			tracing::debug!(authorization_id = existing, "grant already present");
			return Ok(GrantOutcome::Unchanged(AuthorizationId::new(existing)));
		}

		let id = AuthorizationId::new(result.last_insert_rowid());

		for operation in &grant.operations {
			sqlx::query(
				r#"
				INSERT OR IGNORE INTO authz_authorization_operations (authorization_id, operation)
				VALUES (?, ?)
				"#,
			)
			.bind(id.into_inner())
			.bind(operation)
			.execute(&mut *tx)
			.await?;
		}

		tx.commit().await?;

		tracing::debug!(authorization_id = %id, "grant created");
		Ok(GrantOutcome::Created(id))
	}

	/// Delete the grant for a pair.
	///
	/// # Returns
	/// `false` if no grant exists for the pair.
	#[tracing::instrument(skip(self), fields(user_id = %user_id, resource_id = %resource_id))]
	pub async fn delete_grant(
		&self,
		user_id: UserId,
		resource_id: ResourceId,
	) -> Result<bool, DbError> {
		let mut tx = self.pool.begin().await?;

		sqlx::query(
			r#"
			DELETE FROM authz_authorization_operations
			WHERE authorization_id IN (
				SELECT id FROM authz_authorizations WHERE user_id = ? AND resource_id = ?
			)
			"#,
		)
		.bind(user_id.into_inner())
		.bind(resource_id.into_inner())
		.execute(&mut *tx)
		.await?;

		let result =
			sqlx::query("DELETE FROM authz_authorizations WHERE user_id = ? AND resource_id = ?")
				.bind(user_id.into_inner())
				.bind(resource_id.into_inner())
				.execute(&mut *tx)
				.await?;

		tx.commit().await?;
		Ok(result.rows_affected() > 0)
	}

	/// Delete every grant on a resource. Returns the number of grants removed.
	#[tracing::instrument(skip(self), fields(resource_id = %resource_id))]
	pub async fn delete_grants_for_resource(&self, resource_id: ResourceId) -> Result<u64, DbError> {
		let mut tx = self.pool.begin().await?;

		sqlx::query(
			r#"
			DELETE FROM authz_authorization_operations
			WHERE authorization_id IN (SELECT id FROM authz_authorizations WHERE resource_id = ?)
			"#,
		)
		.bind(resource_id.into_inner())
		.execute(&mut *tx)
		.await?;

		let result = sqlx::query("DELETE FROM authz_authorizations WHERE resource_id = ?")
			.bind(resource_id.into_inner())
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;

		tracing::debug!(removed = result.rows_affected(), "grants on resource deleted");
		Ok(result.rows_affected())
	}

	/// Delete every grant held directly by a user. Returns the number removed.
	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn delete_grants_for_user(&self, user_id: UserId) -> Result<u64, DbError> {
		let mut tx = self.pool.begin().await?;

		sqlx::query(
			r#"
			DELETE FROM authz_authorization_operations
			WHERE authorization_id IN (SELECT id FROM authz_authorizations WHERE user_id = ?)
			"#,
		)
		.bind(user_id.into_inner())
		.execute(&mut *tx)
		.await?;

		let result = sqlx::query("DELETE FROM authz_authorizations WHERE user_id = ?")
			.bind(user_id.into_inner())
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;

		tracing::debug!(removed = result.rows_affected(), "grants of user deleted");
		Ok(result.rows_affected())
	}

	// =========================================================================
	// Reads
	// =========================================================================

	/// Get the direct grant for exactly this pair, without any graph walk.
	#[tracing::instrument(skip(self), fields(user_id = %user_id, resource_id = %resource_id))]
	pub async fn get_grant(
		&self,
		user_id: UserId,
		resource_id: ResourceId,
	) -> Result<Option<Authorization>, DbError> {
		let row = sqlx::query(&format!(
			"{GRANT_SELECT} WHERE a.user_id = ? AND a.resource_id = ?"
		))
		.bind(user_id.into_inner())
		.bind(resource_id.into_inner())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_grant(&r)).transpose()
	}

	/// List a user's direct grants ordered by resource ID.
	#[tracing::instrument(skip(self), fields(user_id = %user_id))]
	pub async fn list_grants_for_user(&self, user_id: UserId) -> Result<Vec<Authorization>, DbError> {
		let rows = sqlx::query(&format!(
			"{GRANT_SELECT} WHERE a.user_id = ? ORDER BY a.resource_id ASC"
		))
		.bind(user_id.into_inner())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_grant).collect()
	}

	#[tracing::instrument(skip(self), fields(user_id = %user_id, resource_type = %resource_type))]
	pub async fn list_grants_for_user_by_resource_type(
		&self,
		user_id: UserId,
		resource_type: &str,
	) -> Result<Vec<Authorization>, DbError> {
		let rows = sqlx::query(&format!(
			r#"{GRANT_SELECT}
			INNER JOIN authz_resources r ON r.id = a.resource_id
			WHERE a.user_id = ? AND r.resource_type = ?
			ORDER BY a.resource_id ASC"#
		))
		.bind(user_id.into_inner())
		.bind(resource_type)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_grant).collect()
	}

	/// List the direct grants on a resource ordered by user ID.
	#[tracing::instrument(skip(self), fields(resource_id = %resource_id))]
	pub async fn list_grants_for_resource(
		&self,
		resource_id: ResourceId,
	) -> Result<Vec<Authorization>, DbError> {
		let rows = sqlx::query(&format!(
			"{GRANT_SELECT} WHERE a.resource_id = ? ORDER BY a.user_id ASC"
		))
		.bind(resource_id.into_inner())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_grant).collect()
	}

	/// List every grant whose pair lies in `user_ids x resource_ids`.
	///
	/// Both lists are bound in chunks of `MAX_IDS_PER_LIST` so large
	/// closures stay under SQLite's bound-parameter limit. Every pair falls
	/// in exactly one chunk combination.
	#[tracing::instrument(skip(self, user_ids, resource_ids), fields(users = user_ids.len(), resources = resource_ids.len()))]
	pub async fn list_grants_matching(
		&self,
		user_ids: &[UserId],
		resource_ids: &[ResourceId],
	) -> Result<Vec<Authorization>, DbError> {
		let mut grants = Vec::new();

		for user_chunk in user_ids.chunks(MAX_IDS_PER_LIST) {
			for resource_chunk in resource_ids.chunks(MAX_IDS_PER_LIST) {
				let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(GRANT_SELECT);
				builder.push(" WHERE a.user_id IN (");
				let mut users = builder.separated(", ");
				for id in user_chunk {
					users.push_bind(id.into_inner());
				}
				users.push_unseparated(") AND a.resource_id IN (");
				let mut resources = builder.separated(", ");
				for id in resource_chunk {
					resources.push_bind(id.into_inner());
				}
				resources.push_unseparated(")");

				let rows = builder.build().fetch_all(&self.pool).await?;
				for row in &rows {
					grants.push(row_to_grant(row)?);
				}
			}
		}

		grants.sort_by_key(|g| (g.user_id, g.resource_id));
		tracing::trace!(matched = grants.len(), "matched reachable grants");
		Ok(grants)
	}
}

#[async_trait]
impl GrantStore for GrantRepository {
	async fn create_grant(&self, grant: &NewGrant) -> Result<GrantOutcome, DbError> {
		GrantRepository::create_grant(self, grant).await
	}

	async fn get_grant(
		&self,
		user_id: UserId,
		resource_id: ResourceId,
	) -> Result<Option<Authorization>, DbError> {
		GrantRepository::get_grant(self, user_id, resource_id).await
	}

	async fn list_grants_for_user(&self, user_id: UserId) -> Result<Vec<Authorization>, DbError> {
		GrantRepository::list_grants_for_user(self, user_id).await
	}

	async fn list_grants_for_user_by_resource_type(
		&self,
		user_id: UserId,
		resource_type: &str,
	) -> Result<Vec<Authorization>, DbError> {
		GrantRepository::list_grants_for_user_by_resource_type(self, user_id, resource_type).await
	}

	async fn list_grants_for_resource(
		&self,
		resource_id: ResourceId,
	) -> Result<Vec<Authorization>, DbError> {
		GrantRepository::list_grants_for_resource(self, resource_id).await
	}

	async fn list_grants_matching(
		&self,
		user_ids: &[UserId],
		resource_ids: &[ResourceId],
	) -> Result<Vec<Authorization>, DbError> {
		GrantRepository::list_grants_matching(self, user_ids, resource_ids).await
	}

	async fn delete_grant(
		&self,
		user_id: UserId,
		resource_id: ResourceId,
	) -> Result<bool, DbError> {
		GrantRepository::delete_grant(self, user_id, resource_id).await
	}

	async fn delete_grants_for_resource(&self, resource_id: ResourceId) -> Result<u64, DbError> {
		GrantRepository::delete_grants_for_resource(self, resource_id).await
	}

	async fn delete_grants_for_user(&self, user_id: UserId) -> Result<u64, DbError> {
		GrantRepository::delete_grants_for_user(self, user_id).await
	}
}

fn row_to_grant(row: &sqlx::sqlite::SqliteRow) -> Result<Authorization, DbError> {
	let operations_json: String = row.get("operations");
	let created_at_str: String = row.get("created_at");
	let operations: BTreeSet<String> = serde_json::from_str(&operations_json)?;

	Ok(Authorization {
		id: AuthorizationId::new(row.get("id")),
		user_id: UserId::new(row.get("user_id")),
		resource_id: ResourceId::new(row.get("resource_id")),
		is_owner: row.get("is_owner"),
		is_heritable: row.get("is_heritable"),
		is_updatable: row.get("is_updatable"),
		is_deletable: row.get("is_deletable"),
		operations,
		created_at: DateTime::parse_from_rfc3339(&created_at_str)
			.map(|d| d.with_timezone(&Utc))
			.map_err(|e| DbError::Internal(e.to_string()))?,
	})
}
