//! Outbound publishing over the broker session.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use entity_bridge_common::TopicBuilder;

use crate::error::Result;

/// Seam between the publisher and the broker client.
///
/// Every send is at-least-once (QoS 1). [`ConnectionManager`] is the
/// production implementation.
///
/// [`ConnectionManager`]: crate::ConnectionManager
#[async_trait]
pub trait Transport: Send + Sync {
    /// Whether the session is currently connected.
    fn is_connected(&self) -> bool;

    /// Queue a QoS 1 message. Backpressure comes from the client's own buffer.
    async fn send(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<()>;
}

/// What happened to a single publish request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the broker client.
    Sent,
    /// Dropped because the session was not connected.
    Skipped,
}

/// Publisher for sending retained JSON payloads to MQTT.
///
/// Wraps a [`Transport`] and the bridge's [`TopicBuilder`]. While the session
/// is not connected every publish is a no-op that logs a warning.
#[derive(Clone)]
pub struct Publisher {
    transport: Arc<dyn Transport>,
    topics: TopicBuilder,
}

impl Publisher {
    /// Create a new publisher.
    pub fn new(transport: Arc<dyn Transport>, topics: TopicBuilder) -> Self {
        Self { transport, topics }
    }

    /// Get the topic builder.
    pub fn topics(&self) -> &TopicBuilder {
        &self.topics
    }

    /// Whether the underlying session is connected.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Publish raw bytes as a retained QoS 1 message.
    pub async fn publish_raw(&self, topic: &str, payload: Vec<u8>) -> Result<Delivery> {
        if !self.transport.is_connected() {
            tracing::warn!(topic = %topic, "Not connected, skipping publish");
            return Ok(Delivery::Skipped);
        }

        self.transport.send(topic, payload, true).await?;
        tracing::debug!(topic = %topic, "Published");

        Ok(Delivery::Sent)
    }

    /// Publish a JSON value as a retained QoS 1 message.
    pub async fn publish_json<T: Serialize>(&self, topic: &str, value: &T) -> Result<Delivery> {
        let payload = serde_json::to_vec(value)?;
        self.publish_raw(topic, payload).await
    }
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("prefix", &self.topics.prefix())
            .field("connected", &self.transport.is_connected())
            .finish()
    }
}

/// Statistics from a batch publish operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    /// Number of fully published entities.
    pub success: usize,
    /// Number of entities with at least one failed or skipped send.
    pub failed: usize,
    /// Number of entities the store had no state for.
    pub missing: usize,
}

impl PublishStats {
    /// Total number of attempted publishes.
    pub fn total(&self) -> usize {
        self.success + self.failed + self.missing
    }

    /// Success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            100.0
        } else {
            (self.success as f64 / self.total() as f64) * 100.0
        }
    }
}
