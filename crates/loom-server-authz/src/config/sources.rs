// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, TOML files and environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use super::sections::{
	CacheConfigLayer, DatabaseConfigLayer, EventsConfigLayer, LogFormat, LoggingConfigLayer,
};
use super::{AuthzConfigLayer, ConfigError};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<AuthzConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<AuthzConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(AuthzConfigLayer::default())
	}
}

/// TOML file source. A missing file is skipped, an unreadable one is an error.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<AuthzConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(AuthzConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: AuthzConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: LOOM_AUTHZ_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<AuthzConfigLayer, ConfigError> {
		debug!("loading environment variables");
		load_from_lookup(|name| std::env::var(name).ok())
	}
}

/// Build a layer from any variable lookup. Empty values count as unset.
pub(crate) fn load_from_lookup<F>(lookup: F) -> Result<AuthzConfigLayer, ConfigError>
where
	F: Fn(&str) -> Option<String>,
{
	let var = |name: &str| lookup(name).filter(|s| !s.is_empty());

	Ok(AuthzConfigLayer {
		database: Some(DatabaseConfigLayer {
			url: var("LOOM_AUTHZ_DATABASE_URL"),
			max_connections: parse_var(&var, "LOOM_AUTHZ_DATABASE_MAX_CONNECTIONS")?,
		}),
		cache: Some(CacheConfigLayer {
			enabled: parse_bool(&var, "LOOM_AUTHZ_CACHE_ENABLED")?,
		}),
		events: Some(EventsConfigLayer {
			channel_capacity: parse_var(&var, "LOOM_AUTHZ_EVENTS_CHANNEL_CAPACITY")?,
		}),
		logging: Some(LoggingConfigLayer {
			level: var("LOOM_AUTHZ_LOG_LEVEL"),
			format: parse_var::<LogFormat, _>(&var, "LOOM_AUTHZ_LOG_FORMAT")?,
		}),
	})
}

fn parse_var<T, F>(var: &F, name: &str) -> Result<Option<T>, ConfigError>
where
	T: FromStr,
	F: Fn(&str) -> Option<String>,
{
	match var(name) {
		Some(v) => v.trim().parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("cannot parse '{v}'"),
		}),
		None => Ok(None),
	}
}

fn parse_bool<F>(var: &F, name: &str) -> Result<Option<bool>, ConfigError>
where
	F: Fn(&str) -> Option<String>,
{
	match var(name).map(|v| v.trim().to_ascii_lowercase()) {
		Some(v) if v == "true" || v == "1" => Ok(Some(true)),
		Some(v) if v == "false" || v == "0" => Ok(Some(false)),
		Some(v) => Err(ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid boolean '{v}'"),
		}),
		None => Ok(None),
	}
}
