// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Repository for authorization users ("principals").
//!
//! A principal may name relatives in `authz_user_relatives`. The edge
//! `user_id -> relative_id` means the user also holds every grant the
//! relative holds (role or group membership), never the reverse.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loom_authz_core::{NewUser, User, UserId};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::{map_write_error, DbError};

#[async_trait]
pub trait PrincipalStore: Send + Sync {
	async fn create_user(&self, user: &NewUser) -> Result<UserId, DbError>;
	async fn get_user_by_id(&self, id: UserId) -> Result<Option<User>, DbError>;
	async fn user_exists(&self, id: UserId) -> Result<bool, DbError>;
	async fn list_relative_ids(&self, id: UserId) -> Result<Vec<UserId>, DbError>;
	async fn delete_user(&self, id: UserId) -> Result<bool, DbError>;
}

#[derive(Clone)]
pub struct PrincipalRepository {
	pool: SqlitePool,
}

impl PrincipalRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a user and its relative edges in one transaction.
	///
	/// A failed edge insert rolls the user row back as well.
	#[tracing::instrument(skip(self, user), fields(user_type = %user.user_type, relatives = user.relative_ids.len()))]
	pub async fn create_user(&self, user: &NewUser) -> Result<UserId, DbError> {
		let mut tx = self.pool.begin().await?;

		let result = sqlx::query(
			r#"
			INSERT INTO authz_users (user_type, created_at)
			VALUES (?, ?)
			"#,
		)
		.bind(&user.user_type)
		.bind(Utc::now().to_rfc3339())
		.execute(&mut *tx)
		.await?;

		let id = UserId::new(result.last_insert_rowid());

		for relative_id in &user.relative_ids {
			sqlx::query(
				r#"
				INSERT OR IGNORE INTO authz_user_relatives (user_id, relative_id)
				VALUES (?, ?)
				"#,
			)
			.bind(id.into_inner())
			.bind(relative_id.into_inner())
			.execute(&mut *tx)
			.await
			.map_err(|e| map_write_error(e, "User relative edge"))?;
		}

		tx.commit().await?;

		tracing::debug!(user_id = %id, "user created");
		Ok(id)
	}

	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn get_user_by_id(&self, id: UserId) -> Result<Option<User>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, user_type, created_at
			FROM authz_users
			WHERE id = ?
			"#,
		)
		.bind(id.into_inner())
		.fetch_optional(&self.pool)
		.await?;

		let Some(row) = row else {
			return Ok(None);
		};

		let mut user = row_to_user(&row)?;
		user.relative_ids = self.list_relative_ids(id).await?;
		Ok(Some(user))
	}

	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn user_exists(&self, id: UserId) -> Result<bool, DbError> {
		let found: Option<i64> = sqlx::query_scalar("SELECT id FROM authz_users WHERE id = ?")
			.bind(id.into_inner())
			.fetch_optional(&self.pool)
			.await?;

		Ok(found.is_some())
	}

	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn list_relative_ids(&self, id: UserId) -> Result<Vec<UserId>, DbError> {
		let ids: Vec<i64> = sqlx::query_scalar(
			r#"
			SELECT relative_id
			FROM authz_user_relatives
			WHERE user_id = ?
			ORDER BY relative_id ASC
			"#,
		)
		.bind(id.into_inner())
		.fetch_all(&self.pool)
		.await?;

		Ok(ids.into_iter().map(UserId::new).collect())
	}

	/// Delete a user and every relative edge that touches it.
	///
	/// Grants must be removed first; a remaining grant fails the delete.
	#[tracing::instrument(skip(self), fields(user_id = %id))]
	pub async fn delete_user(&self, id: UserId) -> Result<bool, DbError> {
		let mut tx = self.pool.begin().await?;

		let edges = sqlx::query("DELETE FROM authz_user_relatives WHERE user_id = ? OR relative_id = ?")
			.bind(id.into_inner())
			.bind(id.into_inner())
			.execute(&mut *tx)
			.await?;

		let result = sqlx::query("DELETE FROM authz_users WHERE id = ?")
			.bind(id.into_inner())
			.execute(&mut *tx)
			.await
			.map_err(|e| match e {
				sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
					DbError::StillReferenced(format!("User {id} still holds grants"))
				}
				_ => DbError::Sqlx(e),
			})?;

		tx.commit().await?;

		let deleted = result.rows_affected() > 0;
		tracing::debug!(deleted, relative_edges = edges.rows_affected(), "user delete finished");
		Ok(deleted)
	}
}

#[async_trait]
impl PrincipalStore for PrincipalRepository {
	async fn create_user(&self, user: &NewUser) -> Result<UserId, DbError> {
		PrincipalRepository::create_user(self, user).await
	}

	async fn get_user_by_id(&self, id: UserId) -> Result<Option<User>, DbError> {
		PrincipalRepository::get_user_by_id(self, id).await
	}

	async fn user_exists(&self, id: UserId) -> Result<bool, DbError> {
		PrincipalRepository::user_exists(self, id).await
	}

	async fn list_relative_ids(&self, id: UserId) -> Result<Vec<UserId>, DbError> {
		PrincipalRepository::list_relative_ids(self, id).await
	}

	async fn delete_user(&self, id: UserId) -> Result<bool, DbError> {
		PrincipalRepository::delete_user(self, id).await
	}
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, DbError> {
	let created_at_str: String = row.get("created_at");

	Ok(User {
		id: UserId::new(row.get("id")),
		user_type: row.get("user_type"),
		relative_ids: Vec::new(),
		created_at: DateTime::parse_from_rfc3339(&created_at_str)
			.map(|d| d.with_timezone(&Utc))
			.map_err(|e| DbError::Internal(e.to_string()))?,
	})
}
