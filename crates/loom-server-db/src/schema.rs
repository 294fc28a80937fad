// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Schema bootstrap for the authorization tables.
//!
//! Statements are idempotent so they can run on every start-up.

use sqlx::sqlite::SqlitePool;

use crate::error::DbError;

const STATEMENTS: &[&str] = &[
	r#"
	CREATE TABLE IF NOT EXISTS authz_resources (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		resource_type TEXT NOT NULL,
		created_at TEXT NOT NULL
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_authz_resources_type ON authz_resources(resource_type)",
	r#"
	CREATE TABLE IF NOT EXISTS authz_resource_parents (
		resource_id INTEGER NOT NULL REFERENCES authz_resources(id),
		parent_id INTEGER NOT NULL REFERENCES authz_resources(id),
		PRIMARY KEY (resource_id, parent_id)
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_authz_resource_parents_parent ON authz_resource_parents(parent_id)",
	r#"
	CREATE TABLE IF NOT EXISTS authz_resource_relatives (
		resource_id INTEGER NOT NULL REFERENCES authz_resources(id),
		relative_id INTEGER NOT NULL REFERENCES authz_resources(id),
		PRIMARY KEY (resource_id, relative_id)
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_authz_resource_relatives_relative ON authz_resource_relatives(relative_id)",
	r#"
	CREATE TABLE IF NOT EXISTS authz_users (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		user_type TEXT NOT NULL,
		created_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS authz_user_relatives (
		user_id INTEGER NOT NULL REFERENCES authz_users(id),
		relative_id INTEGER NOT NULL REFERENCES authz_users(id),
		PRIMARY KEY (user_id, relative_id)
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_authz_user_relatives_relative ON authz_user_relatives(relative_id)",
	r#"
	CREATE TABLE IF NOT EXISTS authz_authorizations (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		user_id INTEGER NOT NULL REFERENCES authz_users(id),
		resource_id INTEGER NOT NULL REFERENCES authz_resources(id),
		is_owner INTEGER NOT NULL DEFAULT 0,
		is_heritable INTEGER NOT NULL DEFAULT 0,
		is_updatable INTEGER NOT NULL DEFAULT 0,
		is_deletable INTEGER NOT NULL DEFAULT 0,
		created_at TEXT NOT NULL,
		UNIQUE (user_id, resource_id)
	)
	"#,
	"CREATE INDEX IF NOT EXISTS idx_authz_authorizations_resource ON authz_authorizations(resource_id)",
	r#"
	CREATE TABLE IF NOT EXISTS authz_authorization_operations (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		authorization_id INTEGER NOT NULL REFERENCES authz_authorizations(id) ON DELETE CASCADE,
		operation TEXT NOT NULL,
		UNIQUE (authorization_id, operation)
	)
	"#,
];

/// Create every authorization table and index that does not exist yet.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
	let mut tx = pool.begin().await?;
	for statement in STATEMENTS {
		sqlx::query(statement).execute(&mut *tx).await?;
	}
	tx.commit().await?;

	tracing::debug!(statements = STATEMENTS.len(), "authorization schema ready");
	Ok(())
}
