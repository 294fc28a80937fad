// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections. Each has a runtime struct and a mergeable layer.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::events::DEFAULT_CHANNEL_CAPACITY;

const DEFAULT_DATABASE_URL: &str = "sqlite:./loom-authz.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_LOG_LEVEL: &str = "info";

// =============================================================================
// Database
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
	pub url: String,
	pub max_connections: u32,
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		DatabaseConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfigLayer {
	#[serde(default)]
	pub url: Option<String>,
	#[serde(default)]
	pub max_connections: Option<u32>,
}

impl DatabaseConfigLayer {
	pub fn merge(&mut self, other: DatabaseConfigLayer) {
		if other.url.is_some() {
			self.url = other.url;
		}
		if other.max_connections.is_some() {
			self.max_connections = other.max_connections;
		}
	}

	pub fn finalize(self) -> DatabaseConfig {
		DatabaseConfig {
			url: self.url.unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
			max_connections: self.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS),
		}
	}
}

// =============================================================================
// Cache
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
	pub enabled: bool,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self { enabled: true }
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfigLayer {
	#[serde(default)]
	pub enabled: Option<bool>,
}

impl CacheConfigLayer {
	pub fn merge(&mut self, other: CacheConfigLayer) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
	}

	pub fn finalize(self) -> CacheConfig {
		CacheConfig {
			enabled: self.enabled.unwrap_or(true),
		}
	}
}

// =============================================================================
// Events
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct EventsConfig {
	pub channel_capacity: usize,
}

impl Default for EventsConfig {
	fn default() -> Self {
		Self {
			channel_capacity: DEFAULT_CHANNEL_CAPACITY,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsConfigLayer {
	#[serde(default)]
	pub channel_capacity: Option<usize>,
}

impl EventsConfigLayer {
	pub fn merge(&mut self, other: EventsConfigLayer) {
		if other.channel_capacity.is_some() {
			self.channel_capacity = other.channel_capacity;
		}
	}

	pub fn finalize(self) -> EventsConfig {
		EventsConfig {
			channel_capacity: self.channel_capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY),
		}
	}
}

// =============================================================================
// Logging
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
	#[default]
	Pretty,
	Json,
}

impl FromStr for LogFormat {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"pretty" => Ok(LogFormat::Pretty),
			"json" => Ok(LogFormat::Json),
			other => Err(format!("unknown log format '{other}', expected 'pretty' or 'json'")),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
	pub level: String,
	pub format: LogFormat,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		LoggingConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfigLayer {
	#[serde(default)]
	pub level: Option<String>,
	#[serde(default)]
	pub format: Option<LogFormat>,
}

impl LoggingConfigLayer {
	pub fn merge(&mut self, other: LoggingConfigLayer) {
		if other.level.is_some() {
			self.level = other.level;
		}
		if other.format.is_some() {
			self.format = other.format;
		}
	}

	pub fn finalize(self) -> LoggingConfig {
		LoggingConfig {
			level: self.level.unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
			format: self.format.unwrap_or_default(),
		}
	}
}
