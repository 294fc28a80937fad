// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeSet;

use loom_server_authz::{AuthzError, CreateResource, NewGrant, ResourceId, UserId};

use super::support::memory_service;

fn ops(names: &[&str]) -> BTreeSet<String> {
	names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn literal_scenario() {
	let (svc, _pool) = memory_service().await;

	let u1 = svc.create_user(&[], "role").await.unwrap();
	let r1 = svc.create_resource(CreateResource::new("device")).await.unwrap();
	svc.create_authorization(
		NewGrant::new(u1, r1)
			.with_operations(["read", "write"])
			.heritable(true)
			.updatable(true)
			.deletable(true),
	)
	.await
	.unwrap();

	let effective = svc.get_authorization(u1, r1).await.unwrap();
	assert!(effective.is_heritable);
	assert!(effective.is_updatable);
	assert!(effective.is_deletable);
	assert!(!effective.is_owner);
	assert_eq!(effective.operations, ops(&["read", "write"]));
}

#[tokio::test]
async fn delegation_through_user_graph() {
	let (svc, _pool) = memory_service().await;

	let u1 = svc.create_user(&[], "role").await.unwrap();
	let r1 = svc.create_resource(CreateResource::new("device")).await.unwrap();
	svc.create_authorization(
		NewGrant::new(u1, r1)
			.with_operations(["read"])
			.updatable(true),
	)
	.await
	.unwrap();

	let u2 = svc.create_user(&[u1], "person").await.unwrap();
	let effective = svc.get_authorization(u2, r1).await.unwrap();

	assert_eq!(effective.user_id, u2);
	assert!(effective.is_updatable);
	assert_eq!(effective.operations, ops(&["read"]));
	assert!(svc.list_authorizations(u2).await.unwrap().is_empty());

	// Delegation is one way.
	let r2 = svc.create_resource(CreateResource::new("device")).await.unwrap();
	svc.create_authorization(NewGrant::new(u2, r2)).await.unwrap();
	assert!(svc.get_authorization(u1, r2).await.unwrap_err().is_unauthorized());
}

#[tokio::test]
async fn delegation_is_transitive() {
	let (svc, _pool) = memory_service().await;

	let admins = svc.create_user(&[], "group").await.unwrap();
	let operators = svc.create_user(&[admins], "group").await.unwrap();
	let alice = svc.create_user(&[operators], "person").await.unwrap();
	let site = svc.create_resource(CreateResource::new("site")).await.unwrap();
	svc.create_authorization(NewGrant::new(admins, site).with_operations(["admin"]))
		.await
		.unwrap();

	assert!(svc.is_allowed(alice, site, "admin").await.unwrap());
}

#[tokio::test]
async fn resource_relatives_widen_access_in_one_direction() {
	let (svc, _pool) = memory_service().await;

	let user = svc.create_user(&[], "person").await.unwrap();
	let building = svc.create_resource(CreateResource::new("site")).await.unwrap();
	let sensor = svc
		.create_resource(CreateResource::new("device").with_relatives([building]))
		.await
		.unwrap();
	svc.create_authorization(NewGrant::new(user, building).with_operations(["read"]))
		.await
		.unwrap();

	let effective = svc.get_authorization(user, sensor).await.unwrap();
	assert!(effective.permits("read"));

	svc.create_authorization(NewGrant::new(user, sensor).with_operations(["calibrate"]))
		.await
		.unwrap();
	let on_building = svc.get_authorization(user, building).await.unwrap();
	assert!(!on_building.permits("calibrate"));
}

#[tokio::test]
async fn both_graphs_combine() {
	let (svc, _pool) = memory_service().await;

	let group = svc.create_user(&[], "group").await.unwrap();
	let member = svc.create_user(&[group], "person").await.unwrap();
	let zone = svc.create_resource(CreateResource::new("zone")).await.unwrap();
	let device = svc
		.create_resource(CreateResource::new("device").with_relatives([zone]))
		.await
		.unwrap();

	svc.create_authorization(NewGrant::new(group, zone).with_operations(["read"]).deletable(true))
		.await
		.unwrap();
	svc.create_authorization(NewGrant::new(member, device).with_operations(["write"]))
		.await
		.unwrap();

	let effective = svc.get_authorization(member, device).await.unwrap();
	assert_eq!(effective.operations, ops(&["read", "write"]));
	assert!(effective.is_deletable);
	assert!(!effective.is_heritable);
}

#[tokio::test]
async fn ownership_is_not_aggregated() {
	let (svc, _pool) = memory_service().await;

	let owner = svc.create_user(&[], "person").await.unwrap();
	let delegate = svc.create_user(&[owner], "person").await.unwrap();
	let device = svc
		.create_resource(CreateResource::new("device").owned_by(owner))
		.await
		.unwrap();

	let direct = svc.get_authorization(owner, device).await.unwrap();
	assert!(direct.is_owner);
	assert!(direct.is_heritable && direct.is_updatable && direct.is_deletable);
	assert!(direct.operations.is_empty());

	let delegated = svc.get_authorization(delegate, device).await.unwrap();
	assert!(!delegated.is_owner);
	assert!(delegated.is_updatable);
}

#[tokio::test]
async fn missing_entities_are_not_found_and_no_grant_is_unauthorized() {
	let (svc, _pool) = memory_service().await;

	let user = svc.create_user(&[], "person").await.unwrap();
	let device = svc.create_resource(CreateResource::new("device")).await.unwrap();

	let err = svc.get_authorization(user, device).await.unwrap_err();
	assert!(matches!(err, AuthzError::Unauthorized { user_id, resource_id } if user_id == user && resource_id == device));

	let err = svc.get_authorization(UserId::new(404), device).await.unwrap_err();
	assert!(matches!(err, AuthzError::NotFound { entity: "User", id: 404 }));

	let err = svc.get_authorization(user, ResourceId::new(404)).await.unwrap_err();
	assert!(matches!(err, AuthzError::NotFound { entity: "Resource", id: 404 }));
}

#[tokio::test]
async fn is_allowed_checks_exact_operation_names() {
	let (svc, _pool) = memory_service().await;

	let user = svc.create_user(&[], "person").await.unwrap();
	let device = svc.create_resource(CreateResource::new("device")).await.unwrap();
	let other = svc.create_resource(CreateResource::new("device")).await.unwrap();
	svc.create_authorization(NewGrant::new(user, device).with_operations(["read"]))
		.await
		.unwrap();

	assert!(svc.is_allowed(user, device, "read").await.unwrap());
	assert!(!svc.is_allowed(user, device, "READ").await.unwrap());
	assert!(!svc.is_allowed(user, device, "write").await.unwrap());
	assert!(!svc.is_allowed(user, other, "read").await.unwrap());
	assert!(svc.is_allowed(UserId::new(999), device, "read").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn adding_grants_never_narrows_access() {
	let (svc, _pool) = memory_service().await;

	let group = svc.create_user(&[], "group").await.unwrap();
	let user = svc.create_user(&[group], "person").await.unwrap();
	let zone = svc.create_resource(CreateResource::new("zone")).await.unwrap();
	let device = svc
		.create_resource(CreateResource::new("device").with_relatives([zone]))
		.await
		.unwrap();

	svc.create_authorization(
		NewGrant::new(user, device)
			.with_operations(["read", "write"])
			.updatable(true),
	)
	.await
	.unwrap();
	let before = svc.get_authorization(user, device).await.unwrap();

	// A narrower grant elsewhere in the reachable graph.
	svc.create_authorization(NewGrant::new(group, zone).with_operations(["read"]))
		.await
		.unwrap();
	let after = svc.get_authorization(user, device).await.unwrap();

	assert!(before.operations.is_subset(&after.operations));
	assert!(after.is_updatable);

	svc.create_authorization(NewGrant::new(group, device).with_operations(["reboot"]).heritable(true))
		.await
		.unwrap();
	let widened = svc.get_authorization(user, device).await.unwrap();
	assert!(after.operations.is_subset(&widened.operations));
	assert!(widened.permits("reboot"));
	assert!(widened.is_heritable);
}

#[tokio::test]
async fn resource_cycle_terminates() {
	let (svc, pool) = memory_service().await;

	let user = svc.create_user(&[], "person").await.unwrap();
	let a = svc.create_resource(CreateResource::new("device")).await.unwrap();
	let b = svc
		.create_resource(CreateResource::new("device").with_relatives([a]))
		.await
		.unwrap();

	// Close the loop A -> B -> A behind the service's back.
	sqlx::query("INSERT INTO authz_resource_relatives (resource_id, relative_id) VALUES (?, ?)")
		.bind(a.into_inner())
		.bind(b.into_inner())
		.execute(&pool)
		.await
		.unwrap();

	assert!(svc.get_authorization(user, a).await.unwrap_err().is_unauthorized());

	svc.create_authorization(NewGrant::new(user, b).with_operations(["read"]))
		.await
		.unwrap();
	assert!(svc.is_allowed(user, a, "read").await.unwrap());
	assert!(svc.is_allowed(user, b, "read").await.unwrap());
}

#[tokio::test]
async fn user_cycle_terminates() {
	let (svc, pool) = memory_service().await;

	let first = svc.create_user(&[], "group").await.unwrap();
	let second = svc.create_user(&[first], "group").await.unwrap();
	sqlx::query("INSERT INTO authz_user_relatives (user_id, relative_id) VALUES (?, ?)")
		.bind(first.into_inner())
		.bind(second.into_inner())
		.execute(&pool)
		.await
		.unwrap();

	let device = svc.create_resource(CreateResource::new("device")).await.unwrap();
	svc.create_authorization(NewGrant::new(second, device).with_operations(["read"]))
		.await
		.unwrap();

	let effective = svc.get_authorization(first, device).await.unwrap();
	assert_eq!(effective.operations, ops(&["read"]));
}

#[tokio::test]
async fn cached_resolution_is_dropped_on_write() {
	let (svc, _pool) = memory_service().await;

	let user = svc.create_user(&[], "person").await.unwrap();
	let device = svc.create_resource(CreateResource::new("device")).await.unwrap();
	svc.create_authorization(NewGrant::new(user, device).with_operations(["read"]))
		.await
		.unwrap();

	svc.get_authorization(user, device).await.unwrap();
	assert_eq!(svc.cache().len(), 1);

	svc.delete_authorization(user, device).await.unwrap();
	assert!(svc.cache().is_empty());
	assert!(svc.get_authorization(user, device).await.unwrap_err().is_unauthorized());
	assert!(svc.cache().is_empty());
}
