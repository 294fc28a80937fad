// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `loom-authz` - administer the authorization graph from the command line.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use loom_server_authz::{
	load_config, AuthzConfig, AuthzService, CreateResource, LogFormat, NewGrant, ResourceId,
	UserId,
};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
	name = "loom-authz",
	about = "Manage Loom authorization users, resources and grants",
	version
)]
struct Cli {
	/// TOML configuration file
	#[arg(long, global = true, env = "LOOM_AUTHZ_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Manage authorization users
	#[command(subcommand)]
	User(UserCommand),
	/// Manage resources
	#[command(subcommand)]
	Resource(ResourceCommand),
	/// Manage grants
	#[command(subcommand)]
	Grant(GrantCommand),
	/// Resolve the effective authorization of a user on a resource
	Check {
		#[arg(long)]
		user: UserId,
		#[arg(long)]
		resource: ResourceId,
		/// Only report whether this operation is allowed
		#[arg(long = "op")]
		operation: Option<String>,
	},
}

#[derive(Subcommand, Debug)]
enum UserCommand {
	Create {
		#[arg(long = "type")]
		user_type: String,
		/// Users whose grants the new user also holds
		#[arg(long = "relative")]
		relatives: Vec<UserId>,
	},
	Show {
		id: UserId,
	},
	Delete {
		id: UserId,
	},
}

#[derive(Subcommand, Debug)]
enum ResourceCommand {
	Create {
		#[arg(long = "type")]
		resource_type: String,
		#[arg(long = "parent")]
		parents: Vec<ResourceId>,
		#[arg(long = "relative")]
		relatives: Vec<ResourceId>,
		/// Copy heritable grants from the parents
		#[arg(long)]
		public: bool,
		#[arg(long)]
		owner: Option<UserId>,
	},
	Show {
		id: ResourceId,
	},
	Delete {
		id: ResourceId,
	},
}

#[derive(Subcommand, Debug)]
enum GrantCommand {
	Create(GrantCreateArgs),
	/// Show the direct grant on one pair
	Show {
		#[arg(long)]
		user: UserId,
		#[arg(long)]
		resource: ResourceId,
	},
	Delete {
		#[arg(long)]
		user: UserId,
		#[arg(long)]
		resource: ResourceId,
	},
	/// List a user's direct grants
	List {
		#[arg(long)]
		user: UserId,
		#[arg(long = "type")]
		resource_type: Option<String>,
	},
}

#[derive(Args, Debug)]
struct GrantCreateArgs {
	#[arg(long)]
	user: UserId,
	#[arg(long)]
	resource: ResourceId,
	#[arg(long = "op")]
	operations: Vec<String>,
	#[arg(long)]
	heritable: bool,
	#[arg(long)]
	updatable: bool,
	#[arg(long)]
	deletable: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();
	let config = load_config(cli.config.clone())?;
	init_tracing(&config);

	tracing::debug!(database = %config.database.url, "starting loom-authz");

	let service = AuthzService::connect(&config).await?;
	run(&service, cli.command).await
}

fn init_tracing(config: &AuthzConfig) {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

	// Results go to stdout, so logs go to stderr.
	match config.logging.format {
		LogFormat::Json => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().json().with_writer(std::io::stderr))
				.init();
		}
		LogFormat::Pretty => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().with_writer(std::io::stderr))
				.init();
		}
	}
}

async fn run(service: &AuthzService, command: Command) -> Result<()> {
	match command {
		Command::User(UserCommand::Create {
			user_type,
			relatives,
		}) => {
			let id = service.create_user(&relatives, &user_type).await?;
			print_json(&json!({ "id": id }))
		}
		Command::User(UserCommand::Show { id }) => print_json(&service.get_user_info(id).await?),
		Command::User(UserCommand::Delete { id }) => {
			service.delete_user(id).await?;
			print_json(&json!({ "deleted": id }))
		}
		Command::Resource(ResourceCommand::Create {
			resource_type,
			parents,
			relatives,
			public,
			owner,
		}) => {
			let id = service
				.create_resource(CreateResource {
					resource_type,
					parent_ids: parents,
					relative_ids: relatives,
					is_public: public,
					owner,
				})
				.await?;
			print_json(&json!({ "id": id }))
		}
		Command::Resource(ResourceCommand::Show { id }) => {
			print_json(&service.get_resource(id).await?)
		}
		Command::Resource(ResourceCommand::Delete { id }) => {
			service.delete_resource(id).await?;
			print_json(&json!({ "deleted": id }))
		}
		Command::Grant(GrantCommand::Create(args)) => {
			let grant = NewGrant::new(args.user, args.resource)
				.with_operations(args.operations)
				.heritable(args.heritable)
				.updatable(args.updatable)
				.deletable(args.deletable);
			print_json(&service.create_authorization(grant).await?)
		}
		Command::Grant(GrantCommand::Show { user, resource }) => {
			print_json(&service.get_direct_authorization(user, resource).await?)
		}
		Command::Grant(GrantCommand::Delete { user, resource }) => {
			service.delete_authorization(user, resource).await?;
			print_json(&json!({ "deleted": { "user_id": user, "resource_id": resource } }))
		}
		Command::Grant(GrantCommand::List {
			user,
			resource_type: Some(resource_type),
		}) => print_json(
			&service
				.list_authorizations_by_resource_type(user, &resource_type)
				.await?,
		),
		Command::Grant(GrantCommand::List {
			user,
			resource_type: None,
		}) => print_json(&service.list_authorizations(user).await?),
		Command::Check {
			user,
			resource,
			operation: Some(operation),
		} => {
			let allowed = service.is_allowed(user, resource, &operation).await?;
			print_json(&json!({ "operation": operation, "allowed": allowed }))
		}
		Command::Check {
			user,
			resource,
			operation: None,
		} => print_json(&service.get_authorization(user, resource).await?),
	}
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}
