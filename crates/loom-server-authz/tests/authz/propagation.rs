// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use loom_server_authz::{CreateResource, NewGrant};

use super::support::memory_service;

#[tokio::test]
async fn public_child_receives_snapshot_of_heritable_grants() {
	let (svc, _pool) = memory_service().await;

	let user = svc.create_user(&[], "person").await.unwrap();
	let parent = svc.create_resource(CreateResource::new("site")).await.unwrap();
	svc.create_authorization(
		NewGrant::new(user, parent)
			.with_operations(["read", "write"])
			.heritable(true)
			.updatable(true),
	)
	.await
	.unwrap();

	let child = svc
		.create_resource(CreateResource::new("device").with_parents([parent]).public(true))
		.await
		.unwrap();

	let on_parent = svc.get_authorization(user, parent).await.unwrap();
	let on_child = svc.get_authorization(user, child).await.unwrap();
	assert_eq!(on_child.operations, on_parent.operations);
	assert_eq!(on_child.is_heritable, on_parent.is_heritable);
	assert_eq!(on_child.is_updatable, on_parent.is_updatable);
	assert_eq!(on_child.is_deletable, on_parent.is_deletable);

	// The child grant is a real direct row.
	let direct = svc.list_authorizations(user).await.unwrap();
	assert_eq!(direct.len(), 2);
}

#[tokio::test]
async fn later_parent_grants_do_not_reach_existing_children() {
	let (svc, _pool) = memory_service().await;

	let early = svc.create_user(&[], "person").await.unwrap();
	let late = svc.create_user(&[], "person").await.unwrap();
	let parent = svc.create_resource(CreateResource::new("site")).await.unwrap();
	svc.create_authorization(NewGrant::new(early, parent).with_operations(["read"]).heritable(true))
		.await
		.unwrap();

	let child = svc
		.create_resource(CreateResource::new("device").with_parents([parent]).public(true))
		.await
		.unwrap();

	svc.create_authorization(NewGrant::new(late, parent).with_operations(["read"]).heritable(true))
		.await
		.unwrap();

	assert!(svc.is_allowed(early, child, "read").await.unwrap());
	assert!(svc.get_authorization(late, child).await.unwrap_err().is_unauthorized());
}

#[tokio::test]
async fn non_heritable_and_private_do_not_propagate() {
	let (svc, _pool) = memory_service().await;

	let heritable = svc.create_user(&[], "person").await.unwrap();
	let plain = svc.create_user(&[], "person").await.unwrap();
	let parent = svc.create_resource(CreateResource::new("site")).await.unwrap();
	svc.create_authorization(NewGrant::new(heritable, parent).heritable(true))
		.await
		.unwrap();
	svc.create_authorization(NewGrant::new(plain, parent).with_operations(["read"]))
		.await
		.unwrap();

	let public_child = svc
		.create_resource(CreateResource::new("device").with_parents([parent]).public(true))
		.await
		.unwrap();
	assert!(svc.get_authorization(heritable, public_child).await.is_ok());
	assert!(svc.get_authorization(plain, public_child).await.unwrap_err().is_unauthorized());

	let private_child = svc
		.create_resource(CreateResource::new("device").with_parents([parent]))
		.await
		.unwrap();
	assert!(svc
		.get_authorization(heritable, private_child)
		.await
		.unwrap_err()
		.is_unauthorized());
}

#[tokio::test]
async fn ownership_is_not_propagated() {
	let (svc, _pool) = memory_service().await;

	let owner = svc.create_user(&[], "person").await.unwrap();
	let parent = svc
		.create_resource(CreateResource::new("site").owned_by(owner))
		.await
		.unwrap();
	let child = svc
		.create_resource(CreateResource::new("device").with_parents([parent]).public(true))
		.await
		.unwrap();

	let on_child = svc.get_authorization(owner, child).await.unwrap();
	assert!(!on_child.is_owner);
	assert!(on_child.is_heritable && on_child.is_updatable && on_child.is_deletable);
}

#[tokio::test]
async fn propagation_chains_through_generations() {
	let (svc, _pool) = memory_service().await;

	let user = svc.create_user(&[], "person").await.unwrap();
	let site = svc.create_resource(CreateResource::new("site")).await.unwrap();
	svc.create_authorization(NewGrant::new(user, site).with_operations(["read"]).heritable(true))
		.await
		.unwrap();

	let zone = svc
		.create_resource(CreateResource::new("zone").with_parents([site]).public(true))
		.await
		.unwrap();
	let device = svc
		.create_resource(CreateResource::new("device").with_parents([zone]).public(true))
		.await
		.unwrap();

	assert!(svc.is_allowed(user, device, "read").await.unwrap());
}

#[tokio::test]
async fn owner_of_public_child_keeps_inherited_operations() {
	let (svc, _pool) = memory_service().await;

	let owner = svc.create_user(&[], "person").await.unwrap();
	let peer = svc.create_user(&[], "person").await.unwrap();
	let site = svc.create_resource(CreateResource::new("site")).await.unwrap();
	for user in [owner, peer] {
		svc.create_authorization(
			NewGrant::new(user, site)
				.with_operations(["read", "write"])
				.heritable(true),
		)
		.await
		.unwrap();
	}

	let device = svc
		.create_resource(
			CreateResource::new("device")
				.with_parents([site])
				.public(true)
				.owned_by(owner),
		)
		.await
		.unwrap();

	let on_site = svc.get_authorization(owner, site).await.unwrap();
	let as_owner = svc.get_authorization(owner, device).await.unwrap();
	let as_peer = svc.get_authorization(peer, device).await.unwrap();

	assert!(as_owner.is_owner);
	assert!(as_owner.is_heritable && as_owner.is_updatable && as_owner.is_deletable);
	assert_eq!(as_owner.operations, on_site.operations);
	assert_eq!(as_owner.operations, as_peer.operations);
	assert!(svc.is_allowed(owner, device, "read").await.unwrap());
	assert!(!as_peer.is_owner);

	// One merged row for the owner, one propagated row for the peer.
	assert_eq!(svc.list_users_for_resource(device).await.unwrap(), vec![owner, peer]);
}

#[tokio::test]
async fn owner_unions_operations_from_every_parent() {
	let (svc, _pool) = memory_service().await;

	let owner = svc.create_user(&[], "person").await.unwrap();
	let site = svc.create_resource(CreateResource::new("site")).await.unwrap();
	let zone = svc.create_resource(CreateResource::new("zone")).await.unwrap();
	svc.create_authorization(NewGrant::new(owner, site).with_operations(["read"]).heritable(true))
		.await
		.unwrap();
	svc.create_authorization(NewGrant::new(owner, zone).with_operations(["write"]).heritable(true))
		.await
		.unwrap();

	let device = svc
		.create_resource(
			CreateResource::new("device")
				.with_parents([site, zone])
				.public(true)
				.owned_by(owner),
		)
		.await
		.unwrap();

	let direct = svc.get_direct_authorization(owner, device).await.unwrap();
	assert!(direct.is_owner);
	assert!(direct.operations.contains("read"));
	assert!(direct.operations.contains("write"));
}
