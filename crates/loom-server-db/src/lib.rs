// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! # loom-server-db
//!
//! SQLite persistence for the hierarchical authorization engine, via sqlx.
//!
//! ## Repository Pattern
//!
//! Each entity has two components:
//! - **`*Store` trait**: the interface the service depends on
//!   ([`ResourceStore`], [`PrincipalStore`], [`GrantStore`])
//! - **`*Repository` struct**: the concrete implementation holding a `SqlitePool`
//!
//! The trait impls delegate to inherent methods, which carry the
//! `#[tracing::instrument]` spans.
//!
//! ## Error Handling
//!
//! | Variant | When it is returned |
//! |---------|---------------------|
//! | `NotFound` | A write references a user or resource row that does not exist |
//! | `Conflict` | A unique constraint fires |
//! | `StillReferenced` | A delete would orphan a grant |
//! | `Sqlx` | Any other database error, propagated via `?` |
//! | `Internal` | Stored data cannot be parsed (e.g. a bad timestamp) |
//!
//! Lookups by ID return `Result<Option<T>>`; absence is not an error at this layer.
//!
//! ## Transactions
//!
//! Every multi-row write (an entity plus its edges, a grant plus its
//! operations, a delete plus its edge cleanup) runs in one transaction, so a
//! failure leaves no partial rows behind.

pub mod error;
pub mod grant;
pub mod pool;
pub mod principal;
pub mod resource;
pub mod schema;


pub use error::{DbError, Result};
pub use grant::{GrantRepository, GrantStore};
pub use pool::{create_memory_pool, create_pool};
pub use principal::{PrincipalRepository, PrincipalStore};
pub use resource::{ResourceRepository, ResourceStore};
pub use schema::run_migrations;
