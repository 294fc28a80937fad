// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! # loom-authz-core
//!
//! Pure domain layer for Loom's hierarchical authorization engine.
//!
//! Two directed graphs drive resolution:
//!
//! - **Resource graph**: parent edges are consulted only when a resource is
//!   created (heritable grants on a parent are copied to a public child);
//!   relative edges are walked at query time.
//! - **User graph**: relative edges mean "also holds whatever the relative holds".
//!
//! A query for `(user, resource)` collects every direct grant in
//! `users reachable from user x resources reachable from resource` and ORs them
//! together with [`aggregate`]. Nothing in this crate touches storage; the
//! walks are driven by callers through [`GraphWalk`].

pub mod aggregate;
pub mod types;
pub mod walk;

pub use aggregate::aggregate;
pub use types::{
	Authorization, AuthorizationId, EffectiveAuthorization, GrantOutcome, IdParseError, NewGrant,
	NewResource, NewUser, Resource, ResourceId, User, UserId, UserInfo,
};
pub use walk::{closure, GraphWalk};
