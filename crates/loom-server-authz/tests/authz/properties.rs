// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resolution against a brute-force reference on random, possibly cyclic graphs.

use std::collections::{BTreeSet, HashSet};

use loom_server_authz::{CreateResource, NewGrant};
use proptest::prelude::*;

use super::support::memory_service;

const USERS: usize = 4;
const RESOURCES: usize = 4;

#[derive(Debug, Clone)]
struct GrantSpec {
	user: usize,
	resource: usize,
	heritable: bool,
	updatable: bool,
	deletable: bool,
	operations: BTreeSet<String>,
}

#[derive(Debug, Clone)]
struct Graph {
	user_edges: Vec<(usize, usize)>,
	resource_edges: Vec<(usize, usize)>,
	grants: Vec<GrantSpec>,
}

fn arb_graph() -> impl Strategy<Value = Graph> {
	let edge = |n: usize| (0..n, 0..n);
	let grant = (
		0..USERS,
		0..RESOURCES,
		any::<(bool, bool, bool)>(),
		proptest::collection::btree_set("[a-d]", 0..3),
	)
		.prop_map(|(user, resource, (heritable, updatable, deletable), operations)| GrantSpec {
			user,
			resource,
			heritable,
			updatable,
			deletable,
			operations,
		});

	(
		proptest::collection::vec(edge(USERS), 0..6),
		proptest::collection::vec(edge(RESOURCES), 0..6),
		proptest::collection::vec(grant, 0..6),
	)
		.prop_map(|(user_edges, resource_edges, grants)| Graph {
			user_edges,
			resource_edges,
			grants,
		})
}

/// Fixed-point reachability, independent of the engine's walk.
fn reachable(start: usize, edges: &[(usize, usize)]) -> HashSet<usize> {
	let mut seen = HashSet::from([start]);
	loop {
		let before = seen.len();
		for (from, to) in edges {
			if seen.contains(from) {
				seen.insert(*to);
			}
		}
		if seen.len() == before {
			return seen;
		}
	}
}

async fn check(graph: Graph) {
	let (svc, pool) = memory_service().await;

	let mut users = Vec::new();
	for _ in 0..USERS {
		users.push(svc.create_user(&[], "person").await.unwrap());
	}
	let mut resources = Vec::new();
	for _ in 0..RESOURCES {
		resources.push(svc.create_resource(CreateResource::new("device")).await.unwrap());
	}

	for (from, to) in &graph.user_edges {
		sqlx::query("INSERT OR IGNORE INTO authz_user_relatives (user_id, relative_id) VALUES (?, ?)")
			.bind(users[*from].into_inner())
			.bind(users[*to].into_inner())
			.execute(&pool)
			.await
			.unwrap();
	}
	for (from, to) in &graph.resource_edges {
		sqlx::query(
			"INSERT OR IGNORE INTO authz_resource_relatives (resource_id, relative_id) VALUES (?, ?)",
		)
		.bind(resources[*from].into_inner())
		.bind(resources[*to].into_inner())
		.execute(&pool)
		.await
		.unwrap();
	}

	// The first grant per pair wins; later ones are no-ops.
	let mut stored: Vec<&GrantSpec> = Vec::new();
	for planned in &graph.grants {
		let grant = NewGrant::new(users[planned.user], resources[planned.resource])
			.with_operations(planned.operations.iter().cloned())
			.heritable(planned.heritable)
			.updatable(planned.updatable)
			.deletable(planned.deletable);
		if svc.create_authorization(grant).await.unwrap().is_created() {
			stored.push(planned);
		}
	}

	for u in 0..USERS {
		let candidate_users = reachable(u, &graph.user_edges);
		for r in 0..RESOURCES {
			let reachable_resources = reachable(r, &graph.resource_edges);
			let matching: Vec<&&GrantSpec> = stored
				.iter()
				.filter(|g| candidate_users.contains(&g.user) && reachable_resources.contains(&g.resource))
				.collect();

			let result = svc.get_authorization(users[u], resources[r]).await;

			if matching.is_empty() {
				assert!(result.unwrap_err().is_unauthorized(), "expected unauthorized for ({u}, {r})");
				continue;
			}

			let effective = result.unwrap();
			let operations: BTreeSet<String> =
				matching.iter().flat_map(|g| g.operations.iter().cloned()).collect();
			assert_eq!(effective.user_id, users[u]);
			assert_eq!(effective.resource_id, resources[r]);
			assert_eq!(effective.is_heritable, matching.iter().any(|g| g.heritable));
			assert_eq!(effective.is_updatable, matching.iter().any(|g| g.updatable));
			assert_eq!(effective.is_deletable, matching.iter().any(|g| g.deletable));
			assert!(!effective.is_owner);
			assert_eq!(effective.operations, operations);
		}
	}
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(24))]

	#[test]
	fn resolution_matches_reference(graph in arb_graph()) {
		let runtime = tokio::runtime::Builder::new_current_thread()
			.enable_all()
			.build()
			.unwrap();
		runtime.block_on(check(graph));
	}
}
