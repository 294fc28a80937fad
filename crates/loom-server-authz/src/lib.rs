// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! # loom-server-authz
//!
//! Hierarchical authorization engine for Loom.
//!
//! Users and resources each form a directed graph of relative edges. A grant
//! binds one user to one resource; the effective authorization of a
//! `(user, resource)` pair is the OR/union of every grant reachable through
//! both graphs. Resources also record parents, which are consulted once, when
//! a public child is created, to copy heritable grants onto it.
//!
//! [`AuthzService`] is the single entry point. It validates references,
//! sequences multi-entity cascades with compensation, keeps the
//! [`ResolutionCache`] coherent and publishes [`AuthzEvent`]s.
//!
//! ```rust,ignore
//! let service = AuthzService::connect(&config).await?;
//! let role = service.create_user(&[], "role").await?;
//! let device = service.create_resource(CreateResource::new("device")).await?;
//! service
//!     .create_authorization(NewGrant::new(role, device).with_operations(["read"]))
//!     .await?;
//! assert!(service.is_allowed(role, device, "read").await?);
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
mod resolver;
pub mod service;

pub use cache::ResolutionCache;
pub use config::{load_config, AuthzConfig, ConfigError, LogFormat};
pub use error::{AuthzError, Result};
pub use events::{AuthzEvent, EventBus, EventStatus, Topic, TopicSubscription};
pub use service::{AuthzService, CreateResource};

pub use loom_authz_core::{
	Authorization, AuthorizationId, EffectiveAuthorization, GrantOutcome, NewGrant, Resource,
	ResourceId, UserId, UserInfo,
};
