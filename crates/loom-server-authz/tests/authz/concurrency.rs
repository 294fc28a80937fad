// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use loom_server_authz::{CreateResource, NewGrant};

use super::support::file_service;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_grants_leave_one_row() {
	let (svc, _dir) = file_service().await;

	let user = svc.create_user(&[], "role").await.unwrap();
	let device = svc.create_resource(CreateResource::new("device")).await.unwrap();

	let mut handles = Vec::new();
	for _ in 0..8 {
		let svc = svc.clone();
		handles.push(tokio::spawn(async move {
			svc.create_authorization(NewGrant::new(user, device).with_operations(["read", "write"]))
				.await
		}));
	}

	let mut created = 0;
	for handle in handles {
		if handle.await.unwrap().unwrap().is_created() {
			created += 1;
		}
	}

	assert_eq!(created, 1);
	let grants = svc.list_authorizations(user).await.unwrap();
	assert_eq!(grants.len(), 1);
	assert_eq!(grants[0].operations.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_run_alongside_writers() {
	let (svc, _dir) = file_service().await;

	let group = svc.create_user(&[], "group").await.unwrap();
	let member = svc.create_user(&[group], "person").await.unwrap();
	let device = svc.create_resource(CreateResource::new("device")).await.unwrap();
	svc.create_authorization(NewGrant::new(group, device).with_operations(["read"]))
		.await
		.unwrap();

	let writer = {
		let svc = svc.clone();
		tokio::spawn(async move {
			for i in 0..10 {
				let resource = svc
					.create_resource(CreateResource::new("device"))
					.await
					.unwrap();
				svc.create_authorization(
					NewGrant::new(group, resource).with_operations([format!("op-{i}")]),
				)
				.await
				.unwrap();
			}
		})
	};

	let mut readers = Vec::new();
	for _ in 0..4 {
		let svc = svc.clone();
		readers.push(tokio::spawn(async move {
			for _ in 0..10 {
				assert!(svc.is_allowed(member, device, "read").await.unwrap());
			}
		}));
	}

	writer.await.unwrap();
	for reader in readers {
		reader.await.unwrap();
	}

	assert_eq!(svc.list_authorizations(group).await.unwrap().len(), 11);
}
