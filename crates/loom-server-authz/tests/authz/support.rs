// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use loom_server_authz::{AuthzConfig, AuthzService};
use loom_server_db::{create_memory_pool, run_migrations};
use sqlx::sqlite::SqlitePool;
use tempfile::TempDir;

/// Service over a private in-memory database, plus the pool for raw inspection.
pub async fn memory_service() -> (AuthzService, SqlitePool) {
	let pool = create_memory_pool().await.unwrap();
	run_migrations(&pool).await.unwrap();
	let service = AuthzService::from_pool(pool.clone(), &AuthzConfig::default());
	(service, pool)
}

/// Service over a file database with a multi-connection pool.
///
/// The returned directory must outlive the service.
pub async fn file_service() -> (AuthzService, TempDir) {
	let dir = tempfile::tempdir().unwrap();
	let mut config = AuthzConfig::default();
	config.database.url = format!("sqlite:{}", dir.path().join("authz.db").display());
	config.database.max_connections = 4;

	let service = AuthzService::connect(&config).await.unwrap();
	(service, dir)
}

pub async fn count(pool: &SqlitePool, table: &str) -> i64 {
	sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
		.fetch_one(pool)
		.await
		.unwrap()
}
