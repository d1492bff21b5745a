//! Configuration traits and utilities.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{BridgeError, Result};
use crate::{LoggingConfig, MqttConfig};

/// Trait for bridge configuration types.
///
/// Implement this trait for your bridge's configuration struct to get
/// automatic loading, validation, and access to common config fields.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use entity_bridge_framework::{BridgeConfig, MqttConfig, LoggingConfig};
///
/// #[derive(Debug, Deserialize)]
/// pub struct MyBridgeConfig {
///     pub mqtt: MqttConfig,
///     pub logging: LoggingConfig,
///     pub topic_prefix: String,
/// }
///
/// impl BridgeConfig for MyBridgeConfig {
///     fn mqtt(&self) -> &MqttConfig {
///         &self.mqtt
///     }
///
///     fn logging(&self) -> &LoggingConfig {
///         &self.logging
///     }
///
///     fn topic_prefix(&self) -> &str {
///         &self.topic_prefix
///     }
/// }
/// ```
pub trait BridgeConfig: Sized + DeserializeOwned {
    /// Get the MQTT broker configuration.
    fn mqtt(&self) -> &MqttConfig;

    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Get the topic prefix for this bridge.
    fn topic_prefix(&self) -> &str;

    /// Validate the configuration.
    ///
    /// Called automatically after loading. The default checks the broker
    /// settings and the topic prefix; override to add bridge-specific rules
    /// and call [`validate_common`] from the override.
    fn validate(&self) -> Result<()> {
        validate_common(self)
    }

    /// Load configuration from a file path.
    ///
    /// Supports JSON5 format. Calls [`validate`](Self::validate) after loading.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_json5(&content)
    }

    /// Parse and validate configuration from a JSON5 string.
    fn from_json5(content: &str) -> Result<Self> {
        let config: Self = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

/// Checks shared by every bridge configuration.
pub fn validate_common<C: BridgeConfig>(config: &C) -> Result<()> {
    let mqtt = config.mqtt();

    if mqtt.host.trim().is_empty() {
        return Err(BridgeError::validation("mqtt.host must not be empty"));
    }
    if mqtt.port == 0 {
        return Err(BridgeError::validation("mqtt.port must not be 0"));
    }
    if mqtt.client_id.trim().is_empty() {
        return Err(BridgeError::validation("mqtt.client_id must not be empty"));
    }
    if mqtt.keep_alive_secs == 0 {
        return Err(BridgeError::validation(
            "mqtt.keep_alive_secs must be at least 1",
        ));
    }
    if mqtt.connect_timeout_secs == 0 {
        return Err(BridgeError::validation(
            "mqtt.connect_timeout_secs must be at least 1",
        ));
    }

    let prefix = config.topic_prefix();
    if prefix.is_empty() {
        return Err(BridgeError::validation("topic prefix must not be empty"));
    }
    if prefix.contains(['+', '#']) {
        return Err(BridgeError::validation(format!(
            "topic prefix '{}' must not contain MQTT wildcards",
            prefix
        )));
    }
    if prefix.starts_with('/') || prefix.ends_with('/') {
        return Err(BridgeError::validation(format!(
            "topic prefix '{}' must not start or end with '/'",
            prefix
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        mqtt: MqttConfig,
        #[serde(default)]
        logging: LoggingConfig,
        topic_prefix: String,
    }

    impl BridgeConfig for TestConfig {
        fn mqtt(&self) -> &MqttConfig {
            &self.mqtt
        }

        fn logging(&self) -> &LoggingConfig {
            &self.logging
        }

        fn topic_prefix(&self) -> &str {
            &self.topic_prefix
        }
    }

    #[test]
    fn test_config_not_found() {
        let result = TestConfig::load("/nonexistent/path.json5");
        assert!(matches!(result, Err(BridgeError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_config_parse_error() {
        let result = TestConfig::from_json5("{ mqtt: ");
        assert!(matches!(result, Err(BridgeError::ConfigParse(_))));
    }

    #[test]
    fn test_valid_config() {
        let config =
            TestConfig::from_json5(r#"{ mqtt: { host: "broker" }, topic_prefix: "home/bridge" }"#)
                .unwrap();
        assert_eq!(config.topic_prefix(), "home/bridge");
    }

    #[test]
    fn test_rejects_bad_prefixes() {
        for prefix in ["", "home/#", "home/+/x", "home/", "/home"] {
            let json5 = format!(
                r#"{{ mqtt: {{ host: "broker" }}, topic_prefix: "{}" }}"#,
                prefix
            );
            let result = TestConfig::from_json5(&json5);
            assert!(
                matches!(result, Err(BridgeError::ConfigValidation(_))),
                "prefix '{}' should be rejected",
                prefix
            );
        }
    }

    #[test]
    fn test_rejects_bad_broker_settings() {
        let result = TestConfig::from_json5(r#"{ mqtt: { host: " " }, topic_prefix: "home" }"#);
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));

        let result =
            TestConfig::from_json5(r#"{ mqtt: { host: "b", port: 0 }, topic_prefix: "home" }"#);
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));

        let result = TestConfig::from_json5(
            r#"{ mqtt: { host: "b", keep_alive_secs: 0 }, topic_prefix: "home" }"#,
        );
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));
    }

    #[test]
    fn test_rejects_zero_connect_timeout() {
        let result = TestConfig::from_json5(
            r#"{ mqtt: { host: "b", connect_timeout_secs: 0 }, topic_prefix: "home" }"#,
        );
        match result {
            Err(BridgeError::ConfigValidation(msg)) => {
                assert!(msg.contains("connect_timeout_secs"), "{}", msg)
            }
            other => panic!("expected a validation error, got {:?}", other),
        }

        let config = TestConfig::from_json5(
            r#"{ mqtt: { host: "b", connect_timeout_secs: 1 }, topic_prefix: "home" }"#,
        )
        .unwrap();
        assert_eq!(config.mqtt().connect_timeout_secs, 1);
    }
}
