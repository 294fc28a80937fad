// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	/// A delete was refused because grants still reference the row.
	#[error("Still referenced: {0}")]
	StillReferenced(String),

	#[error("Internal: {0}")]
	Internal(String),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Map constraint violations raised by a write onto domain variants.
pub(crate) fn map_write_error(e: sqlx::Error, what: &str) -> DbError {
	match e {
		sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
			DbError::Conflict(format!("{what} already exists"))
		}
		sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
			DbError::NotFound(format!("{what} references a missing row"))
		}
		_ => DbError::Sqlx(e),
	}
}
