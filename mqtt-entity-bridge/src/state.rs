//! Per-entity publishing of the discovery descriptor and the state payload.

use entity_bridge_common::EntitySnapshot;
use entity_bridge_framework::{BridgeError, Delivery, Publisher, Result};

use crate::discovery;

/// Outcome of publishing one entity.
///
/// The two sends are independent: a failed descriptor publish does not
/// prevent the state publish and vice versa.
#[derive(Debug)]
pub struct PublishReport {
    pub entity_id: String,
    pub config: Result<Delivery>,
    pub state: Result<Delivery>,
}

impl PublishReport {
    /// Both messages were handed to the broker client.
    pub fn is_complete(&self) -> bool {
        matches!(self.config, Ok(Delivery::Sent)) && matches!(self.state, Ok(Delivery::Sent))
    }

    /// Whether anything was skipped because the session was down.
    pub fn was_skipped(&self) -> bool {
        matches!(self.config, Ok(Delivery::Skipped)) || matches!(self.state, Ok(Delivery::Skipped))
    }
}

/// Publishes entity snapshots as retained descriptor and state messages.
#[derive(Debug, Clone)]
pub struct StatePublisher {
    publisher: Publisher,
}

impl StatePublisher {
    pub fn new(publisher: Publisher) -> Self {
        Self { publisher }
    }

    /// Get the underlying publisher.
    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Publish the descriptor to the config topic, then the snapshot to the state topic.
    ///
    /// Only a malformed entity id fails both halves up front. Nothing is
    /// published for such an entity.
    pub async fn publish(&self, snapshot: &EntitySnapshot) -> PublishReport {
        let entity_id = snapshot.entity_id.clone();

        let id = match snapshot.id() {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(entity_id = %entity_id, error = %e, "Skipping entity with invalid id");
                return PublishReport {
                    entity_id,
                    config: Err(BridgeError::InvalidEntityId(snapshot.entity_id.clone())),
                    state: Err(BridgeError::InvalidEntityId(snapshot.entity_id.clone())),
                };
            }
        };

        let topics = self.publisher.topics();
        let descriptor = discovery::synthesize(topics, &id, snapshot);

        let config_topic = topics.config_topic(&id);
        let config = self.publisher.publish_json(&config_topic, &descriptor).await;
        if let Err(e) = &config {
            tracing::warn!(entity_id = %entity_id, topic = %config_topic, error = %e, "Failed to publish discovery descriptor");
        }

        let state_topic = topics.state_topic(&id);
        let state = self.publisher.publish_json(&state_topic, snapshot).await;
        if let Err(e) = &state {
            tracing::warn!(entity_id = %entity_id, topic = %state_topic, error = %e, "Failed to publish state");
        }

        PublishReport {
            entity_id,
            config,
            state,
        }
    }
}
