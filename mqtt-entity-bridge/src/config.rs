//! MQTT entity bridge configuration.

use serde::{Deserialize, Serialize};

use entity_bridge_common::{DEFAULT_PREFIX, EntityId, EntitySnapshot};
use entity_bridge_framework::{
    BridgeConfig, BridgeError, LoggingConfig, MqttConfig, Result, validate_common,
};

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityBridgeConfig {
    /// Broker connection settings.
    pub mqtt: MqttConfig,

    /// Bridge settings.
    #[serde(default)]
    pub bridge: BridgeSettings,

    /// Entities to seed the in-memory host with.
    #[serde(default)]
    pub entities: Vec<EntitySnapshot>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Topic and membership settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSettings {
    /// Prefix for every topic the bridge publishes or subscribes to.
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    /// Entity ids published on startup and on every reconnect.
    #[serde(default)]
    pub published_entities: Vec<String>,

    /// Commands waiting for the host before new ones are dropped.
    #[serde(default = "default_command_queue_capacity")]
    pub command_queue_capacity: usize,
}

fn default_topic_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_command_queue_capacity() -> usize {
    64
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            topic_prefix: default_topic_prefix(),
            published_entities: Vec::new(),
            command_queue_capacity: default_command_queue_capacity(),
        }
    }
}

impl BridgeConfig for EntityBridgeConfig {
    fn mqtt(&self) -> &MqttConfig {
        &self.mqtt
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn topic_prefix(&self) -> &str {
        &self.bridge.topic_prefix
    }

    fn validate(&self) -> Result<()> {
        validate_common(self)?;

        if self.bridge.command_queue_capacity == 0 {
            return Err(BridgeError::validation(
                "bridge.command_queue_capacity must be at least 1",
            ));
        }

        for id in &self.bridge.published_entities {
            EntityId::parse(id).map_err(|_| {
                BridgeError::validation(format!("bridge.published_entities: invalid entity id '{}'", id))
            })?;
        }

        for snapshot in &self.entities {
            snapshot.id().map_err(|_| {
                BridgeError::validation(format!("entities: invalid entity id '{}'", snapshot.entity_id))
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config = EntityBridgeConfig::from_json5(r#"{ mqtt: { host: "broker.local" } }"#).unwrap();

        assert_eq!(config.mqtt.host, "broker.local");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.client_id, "mqtt-entity-bridge");
        assert_eq!(config.bridge.topic_prefix, "homeassistant");
        assert_eq!(config.bridge.command_queue_capacity, 64);
        assert!(config.bridge.published_entities.is_empty());
        assert!(config.entities.is_empty());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            mqtt: {
                host: "broker.local",
                port: 8883,
                username: "bridge",
                password: "secret",
                keep_alive_secs: 30,
            },
            bridge: {
                topic_prefix: "home",
                published_entities: ["light.kitchen", "switch.fan"],
                command_queue_capacity: 8,
            },
            entities: [
                { entity_id: "light.kitchen", state: "on", attributes: { brightness: 120 } },
                { entity_id: "switch.fan", state: "off" },
            ],
            logging: { level: "debug", format: "json" },
        }"#;

        let config = EntityBridgeConfig::from_json5(json).unwrap();
        assert_eq!(config.mqtt.credentials(), Some(("bridge", "secret")));
        assert_eq!(config.topic_prefix(), "home");
        assert_eq!(config.bridge.published_entities, vec!["light.kitchen", "switch.fan"]);
        assert_eq!(config.entities.len(), 2);
        assert_eq!(config.entities[0].attributes["brightness"].as_f64(), Some(120.0));
        assert!(config.entities[1].last_changed.is_none());
        assert_eq!(config.logging.format, entity_bridge_common::LogFormat::Json);
    }

    #[test]
    fn test_rejects_invalid_published_entity() {
        let json = r#"{ mqtt: { host: "b" }, bridge: { published_entities: ["kitchen"] } }"#;
        let result = EntityBridgeConfig::from_json5(json);
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));
    }

    #[test]
    fn test_rejects_invalid_seed_entity() {
        let json = r#"{ mqtt: { host: "b" }, entities: [{ entity_id: "nodot", state: "on" }] }"#;
        let result = EntityBridgeConfig::from_json5(json);
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));
    }

    #[test]
    fn test_rejects_zero_queue_capacity() {
        let json = r#"{ mqtt: { host: "b" }, bridge: { command_queue_capacity: 0 } }"#;
        let result = EntityBridgeConfig::from_json5(json);
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));
    }

    #[test]
    fn test_rejects_wildcard_prefix() {
        let json = r#"{ mqtt: { host: "b" }, bridge: { topic_prefix: "home/#" } }"#;
        let result = EntityBridgeConfig::from_json5(json);
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));
    }
}
