// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Topic-based change notifications for authorization entities.
//!
//! Events are published after the write they describe has committed. They are
//! informational only (UI refresh, audit fan-out); nothing in resolution
//! depends on them, and publishing with no subscribers is not an error.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
	#[serde(rename = "auth_resource")]
	Resource,
	#[serde(rename = "auth_user")]
	User,
	#[serde(rename = "auth_authorization")]
	Authorization,
}

impl Topic {
	pub fn as_str(&self) -> &'static str {
		match self {
			Topic::Resource => "auth_resource",
			Topic::User => "auth_user",
			Topic::Authorization => "auth_authorization",
		}
	}
}

impl fmt::Display for Topic {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
	Created,
	Updated,
	Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthzEvent {
	pub topic: Topic,
	pub status: EventStatus,
	pub data: serde_json::Value,
	/// Free-form origin of the change, e.g. `"propagated"` for inherited grants.
	pub context: Option<String>,
}

impl AuthzEvent {
	pub fn new(topic: Topic, status: EventStatus, data: serde_json::Value) -> Self {
		Self {
			topic,
			status,
			data,
			context: None,
		}
	}

	pub fn with_context(mut self, context: impl Into<String>) -> Self {
		self.context = Some(context.into());
		self
	}
}

/// Broadcast hub for [`AuthzEvent`]s.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<AuthzEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(1));
		Self { sender }
	}

	/// Publish an event. Returns the number of receivers it reached.
	pub fn publish(&self, event: AuthzEvent) -> usize {
		tracing::trace!(topic = %event.topic, status = ?event.status, "publishing event");
		// No subscribers is fine.
		self.sender.send(event).unwrap_or(0)
	}

	/// Receive only events for `topic`.
	pub fn subscribe_topic(&self, topic: Topic) -> TopicSubscription {
		TopicSubscription {
			topic,
			receiver: self.sender.subscribe(),
		}
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(DEFAULT_CHANNEL_CAPACITY)
	}
}

pub struct TopicSubscription {
	topic: Topic,
	receiver: broadcast::Receiver<AuthzEvent>,
}

impl TopicSubscription {
	/// Wait for the next event on this topic.
	///
	/// A lagging subscriber skips what it missed and keeps going. Returns
	/// `None` once the bus is dropped.
	pub async fn recv(&mut self) -> Option<AuthzEvent> {
		loop {
			match self.receiver.recv().await {
				Ok(event) if event.topic == self.topic => return Some(event),
				Ok(_) => continue,
				Err(broadcast::error::RecvError::Lagged(skipped)) => {
					tracing::warn!(topic = %self.topic, skipped, "event subscriber lagged");
				}
				Err(broadcast::error::RecvError::Closed) => return None,
			}
		}
	}

	/// Take the next already-queued event on this topic, if any.
	pub fn try_recv(&mut self) -> Option<AuthzEvent> {
		loop {
			match self.receiver.try_recv() {
				Ok(event) if event.topic == self.topic => return Some(event),
				Ok(_) => continue,
				Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
					tracing::warn!(topic = %self.topic, skipped, "event subscriber lagged");
				}
				Err(_) => return None,
			}
		}
	}
}
