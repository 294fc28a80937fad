// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resource repository for database operations.
//!
//! Resources form a directed graph with two kinds of edges:
//! - `authz_resource_parents`: recorded at creation, read when heritable grants
//!   are propagated to a new child
//! - `authz_resource_relatives`: walked at query time to find reachable grants
//!
//! Edges are written together with their resource and never updated.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loom_authz_core::{NewResource, Resource, ResourceId};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::{map_write_error, DbError};

#[async_trait]
pub trait ResourceStore: Send + Sync {
	async fn create_resource(&self, resource: &NewResource) -> Result<ResourceId, DbError>;
	async fn get_resource_by_id(&self, id: ResourceId) -> Result<Option<Resource>, DbError>;
	async fn resource_exists(&self, id: ResourceId) -> Result<bool, DbError>;
	async fn list_parent_ids(&self, id: ResourceId) -> Result<Vec<ResourceId>, DbError>;
	async fn list_relative_ids(&self, id: ResourceId) -> Result<Vec<ResourceId>, DbError>;
	async fn list_resources_by_type(&self, resource_type: &str) -> Result<Vec<Resource>, DbError>;
	async fn delete_resource(&self, id: ResourceId) -> Result<bool, DbError>;
}

/// Repository for resources and their parent/relative edges.
#[derive(Clone)]
pub struct ResourceRepository {
	pool: SqlitePool,
}

impl ResourceRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a resource and all of its edges in one transaction.
	///
	/// Duplicate ids within `parent_ids` or `relative_ids` are stored once.
	///
	/// # Errors
	/// Returns `DbError::NotFound` if an edge targets a resource that does not exist.
	#[tracing::instrument(
		skip(self, resource),
		fields(
			resource_type = %resource.resource_type,
			parents = resource.parent_ids.len(),
			relatives = resource.relative_ids.len()
		)
	)]
	pub async fn create_resource(&self, resource: &NewResource) -> Result<ResourceId, DbError> {
		let mut tx = self.pool.begin().await?;

		let result = sqlx::query(
			r#"
			INSERT INTO authz_resources (resource_type, created_at)
			VALUES (?, ?)
			"#,
		)
		.bind(&resource.resource_type)
		.bind(Utc::now().to_rfc3339())
		.execute(&mut *tx)
		.await?;

		let id = ResourceId::new(result.last_insert_rowid());

		for parent_id in &resource.parent_ids {
			sqlx::query(
				r#"
				INSERT OR IGNORE INTO authz_resource_parents (resource_id, parent_id)
				VALUES (?, ?)
				"#,
			)
			.bind(id.into_inner())
			.bind(parent_id.into_inner())
			.execute(&mut *tx)
			.await
			.map_err(|e| map_write_error(e, "Resource parent edge"))?;
		}

		for relative_id in &resource.relative_ids {
			sqlx::query(
				r#"
				INSERT OR IGNORE INTO authz_resource_relatives (resource_id, relative_id)
				VALUES (?, ?)
				"#,
			)
			.bind(id.into_inner())
			.bind(relative_id.into_inner())
			.execute(&mut *tx)
			.await
			.map_err(|e| map_write_error(e, "Resource relative edge"))?;
		}

		tx.commit().await?;

		tracing::debug!(resource_id = %id, "resource created");
		Ok(id)
	}

	/// Get a resource by ID with its parent and relative edges attached.
	#[tracing::instrument(skip(self), fields(resource_id = %id))]
	pub async fn get_resource_by_id(&self, id: ResourceId) -> Result<Option<Resource>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, resource_type, created_at
			FROM authz_resources
			WHERE id = ?
			"#,
		)
		.bind(id.into_inner())
		.fetch_optional(&self.pool)
		.await?;

		let Some(row) = row else {
			return Ok(None);
		};

		let mut resource = row_to_resource(&row)?;
		self.attach_edges(&mut resource).await?;
		Ok(Some(resource))
	}

	#[tracing::instrument(skip(self), fields(resource_id = %id))]
	pub async fn resource_exists(&self, id: ResourceId) -> Result<bool, DbError> {
		let found: Option<i64> = sqlx::query_scalar("SELECT id FROM authz_resources WHERE id = ?")
			.bind(id.into_inner())
			.fetch_optional(&self.pool)
			.await?;

		Ok(found.is_some())
	}

	#[tracing::instrument(skip(self), fields(resource_id = %id))]
	pub async fn list_parent_ids(&self, id: ResourceId) -> Result<Vec<ResourceId>, DbError> {
		let ids: Vec<i64> = sqlx::query_scalar(
			r#"
			SELECT parent_id
			FROM authz_resource_parents
			WHERE resource_id = ?
			ORDER BY parent_id ASC
			"#,
		)
		.bind(id.into_inner())
		.fetch_all(&self.pool)
		.await?;

		Ok(ids.into_iter().map(ResourceId::new).collect())
	}

	#[tracing::instrument(skip(self), fields(resource_id = %id))]
	pub async fn list_relative_ids(&self, id: ResourceId) -> Result<Vec<ResourceId>, DbError> {
		let ids: Vec<i64> = sqlx::query_scalar(
			r#"
			SELECT relative_id
			FROM authz_resource_relatives
			WHERE resource_id = ?
			ORDER BY relative_id ASC
			"#,
		)
		.bind(id.into_inner())
		.fetch_all(&self.pool)
		.await?;

		Ok(ids.into_iter().map(ResourceId::new).collect())
	}

	#[tracing::instrument(skip(self), fields(resource_type = %resource_type))]
	pub async fn list_resources_by_type(
		&self,
		resource_type: &str,
	) -> Result<Vec<Resource>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, resource_type, created_at
			FROM authz_resources
			WHERE resource_type = ?
			ORDER BY id ASC
			"#,
		)
		.bind(resource_type)
		.fetch_all(&self.pool)
		.await?;

		let mut resources = rows
			.iter()
			.map(row_to_resource)
			.collect::<Result<Vec<_>, _>>()?;
		for resource in &mut resources {
			self.attach_edges(resource).await?;
		}
		Ok(resources)
	}

	/// Delete a resource together with every edge that touches it.
	///
	/// Grants must be removed first; a remaining grant fails the delete.
	///
	/// # Returns
	/// `false` if no resource exists with this ID.
	#[tracing::instrument(skip(self), fields(resource_id = %id))]
	pub async fn delete_resource(&self, id: ResourceId) -> Result<bool, DbError> {
		let mut tx = self.pool.begin().await?;

		let parents = sqlx::query(
			"DELETE FROM authz_resource_parents WHERE resource_id = ? OR parent_id = ?",
		)
		.bind(id.into_inner())
		.bind(id.into_inner())
		.execute(&mut *tx)
		.await?;

		let relatives = sqlx::query(
			"DELETE FROM authz_resource_relatives WHERE resource_id = ? OR relative_id = ?",
		)
		.bind(id.into_inner())
		.bind(id.into_inner())
		.execute(&mut *tx)
		.await?;

		let result = sqlx::query("DELETE FROM authz_resources WHERE id = ?")
			.bind(id.into_inner())
			.execute(&mut *tx)
			.await
			.map_err(|e| match e {
				sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
					DbError::StillReferenced(format!("Resource {id} is still referenced by grants"))
				}
				_ => DbError::Sqlx(e),
			})?;

		tx.commit().await?;

		let deleted = result.rows_affected() > 0;
		tracing::debug!(
			deleted,
			parent_edges = parents.rows_affected(),
			relative_edges = relatives.rows_affected(),
			"resource delete finished"
		);
		Ok(deleted)
	}

	async fn attach_edges(&self, resource: &mut Resource) -> Result<(), DbError> {
		resource.parent_ids = self.list_parent_ids(resource.id).await?;
		resource.relative_ids = self.list_relative_ids(resource.id).await?;
		Ok(())
	}
}

#[async_trait]
impl ResourceStore for ResourceRepository {
	async fn create_resource(&self, resource: &NewResource) -> Result<ResourceId, DbError> {
		ResourceRepository::create_resource(self, resource).await
	}

	async fn get_resource_by_id(&self, id: ResourceId) -> Result<Option<Resource>, DbError> {
		ResourceRepository::get_resource_by_id(self, id).await
	}

	async fn resource_exists(&self, id: ResourceId) -> Result<bool, DbError> {
		ResourceRepository::resource_exists(self, id).await
	}

	async fn list_parent_ids(&self, id: ResourceId) -> Result<Vec<ResourceId>, DbError> {
		ResourceRepository::list_parent_ids(self, id).await
	}

	async fn list_relative_ids(&self, id: ResourceId) -> Result<Vec<ResourceId>, DbError> {
		ResourceRepository::list_relative_ids(self, id).await
	}

	async fn list_resources_by_type(&self, resource_type: &str) -> Result<Vec<Resource>, DbError> {
		ResourceRepository::list_resources_by_type(self, resource_type).await
	}

	async fn delete_resource(&self, id: ResourceId) -> Result<bool, DbError> {
		ResourceRepository::delete_resource(self, id).await
	}
}

fn row_to_resource(row: &sqlx::sqlite::SqliteRow) -> Result<Resource, DbError> {
	let created_at_str: String = row.get("created_at");

	Ok(Resource {
		id: ResourceId::new(row.get("id")),
		resource_type: row.get("resource_type"),
		parent_ids: Vec::new(),
		relative_ids: Vec::new(),
		created_at: DateTime::parse_from_rfc3339(&created_at_str)
			.map(|d| d.with_timezone(&Utc))
			.map_err(|e| DbError::Internal(e.to_string()))?,
	})
}
