// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for the authorization engine.
//!
//! Sources are applied in precedence order (defaults, then an optional TOML
//! file, then `LOOM_AUTHZ_*` environment variables) and merged field by field
//! before being finalized and validated.
//!
//! ```toml
//! [database]
//! url = "sqlite:/var/lib/loom/authz.db"
//! max_connections = 5
//!
//! [cache]
//! enabled = true
//!
//! [events]
//! channel_capacity = 1024
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

mod sections;
mod sources;

use std::path::PathBuf;

use serde::Deserialize;
use tracing::debug;

pub use sections::{
	CacheConfig, CacheConfigLayer, DatabaseConfig, DatabaseConfigLayer, EventsConfig,
	EventsConfigLayer, LogFormat, LoggingConfig, LoggingConfigLayer,
};
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },

	#[error("Failed to parse TOML config at {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("Failed to read config file {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Validation error: {0}")]
	Validation(String),
}

/// Fully resolved configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthzConfig {
	pub database: DatabaseConfig,
	pub cache: CacheConfig,
	pub events: EventsConfig,
	pub logging: LoggingConfig,
}

/// Configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthzConfigLayer {
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub cache: Option<CacheConfigLayer>,
	#[serde(default)]
	pub events: Option<EventsConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl AuthzConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: AuthzConfigLayer) {
		merge_option(&mut self.database, other.database, DatabaseConfigLayer::merge);
		merge_option(&mut self.cache, other.cache, CacheConfigLayer::merge);
		merge_option(&mut self.events, other.events, EventsConfigLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}

	pub fn finalize(self) -> Result<AuthzConfig, ConfigError> {
		let config = AuthzConfig {
			database: self.database.unwrap_or_default().finalize(),
			cache: self.cache.unwrap_or_default().finalize(),
			events: self.events.unwrap_or_default().finalize(),
			logging: self.logging.unwrap_or_default().finalize(),
		};
		validate_config(&config)?;
		Ok(config)
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}

fn validate_config(config: &AuthzConfig) -> Result<(), ConfigError> {
	if config.database.max_connections == 0 {
		return Err(ConfigError::Validation(
			"database.max_connections must be at least 1".to_string(),
		));
	}
	if config.events.channel_capacity == 0 {
		return Err(ConfigError::Validation(
			"events.channel_capacity must be at least 1".to_string(),
		));
	}
	Ok(())
}

/// Load configuration from defaults, an optional TOML file and the environment.
pub fn load_config(config_path: Option<PathBuf>) -> Result<AuthzConfig, ConfigError> {
	let mut sources: Vec<Box<dyn ConfigSource>> = vec![Box::new(DefaultsSource), Box::new(EnvSource)];
	if let Some(path) = config_path {
		sources.push(Box::new(TomlSource::new(path)));
	}
	load_from_sources(sources)
}

/// Merge `sources` in precedence order, regardless of the order given.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<AuthzConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = AuthzConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	merged.finalize()
}
