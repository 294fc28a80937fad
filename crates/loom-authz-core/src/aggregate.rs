// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! OR/union aggregation of reachable grants.
//!
//! Grants only ever widen access: flags are ORed and operation sets are
//! unioned, so the result does not depend on the order grants were found in.
//! Ownership is the exception. It is local to the grant that carries it and
//! is only reported when the direct grant on the queried pair is an owner
//! grant.

use crate::types::{Authorization, EffectiveAuthorization, ResourceId, UserId};

/// Aggregate `grants` into the effective authorization for `(user_id, resource_id)`.
///
/// Returns `None` when `grants` is empty; callers treat that as unauthorized.
pub fn aggregate<'a, I>(
	user_id: UserId,
	resource_id: ResourceId,
	grants: I,
) -> Option<EffectiveAuthorization>
where
	I: IntoIterator<Item = &'a Authorization>,
{
	let mut effective: Option<EffectiveAuthorization> = None;

	for grant in grants {
		let acc = effective.get_or_insert_with(|| EffectiveAuthorization {
			user_id,
			resource_id,
			is_owner: false,
			is_heritable: false,
			is_updatable: false,
			is_deletable: false,
			operations: Default::default(),
		});

		if grant.user_id == user_id && grant.resource_id == resource_id && grant.is_owner {
			acc.is_owner = true;
		}
		acc.is_heritable |= grant.is_heritable;
		acc.is_updatable |= grant.is_updatable;
		acc.is_deletable |= grant.is_deletable;
		acc.operations.extend(grant.operations.iter().cloned());
	}

	effective
}
