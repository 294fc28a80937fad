// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{
	SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;

use crate::error::DbError;

/// Create a SqlitePool with WAL mode and common settings.
///
/// # Arguments
/// * `database_url` - SQLite connection string (e.g., "sqlite:./loom-authz.db")
/// * `max_connections` - Upper bound on pooled connections
///
/// An in-memory URL is routed to [`create_memory_pool`]: every pooled
/// connection would otherwise open its own empty database.
///
/// # Errors
/// Returns `DbError::Internal` if the URL is invalid or connection fails.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool, DbError> {
	if is_memory_url(database_url) {
		if max_connections > 1 {
			tracing::warn!(max_connections, "in-memory database uses a single connection");
		}
		return create_memory_pool().await;
	}

	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| DbError::Internal(format!("Invalid database URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.foreign_keys(true)
		.create_if_missing(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(max_connections)
		.connect_with(options)
		.await?;

	tracing::debug!("database pool created");
	Ok(pool)
}

/// Create a pool over a private in-memory database.
///
/// Every SQLite connection to `:memory:` opens its own database, so the pool
/// is pinned to a single connection that is never recycled.
#[tracing::instrument]
pub async fn create_memory_pool() -> Result<SqlitePool, DbError> {
	let options = SqliteConnectOptions::from_str("sqlite::memory:")
		.map_err(|e| DbError::Internal(format!("Invalid database URL: {e}")))?
		.foreign_keys(true);

	let pool = SqlitePoolOptions::new()
		.min_connections(1)
		.max_connections(1)
		.idle_timeout(None)
		.max_lifetime(None)
		.connect_with(options)
		.await?;

	tracing::debug!("in-memory database pool created");
	Ok(pool)
}

fn is_memory_url(database_url: &str) -> bool {
	database_url.contains(":memory:") || database_url.contains("mode=memory")
}
