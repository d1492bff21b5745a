//! Error types for the bridge framework.

use thiserror::Error;

use crate::connection::ConnectErrorCode;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in a bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// Broker refused or never answered the connection. Terminal for the session.
    #[error("MQTT connection failed: {code}")]
    Connection { code: ConnectErrorCode },

    /// No connection outcome arrived in time.
    #[error("Timed out after {secs}s waiting for the MQTT connection")]
    ConnectTimeout { secs: u64 },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Publishing error.
    #[error("Failed to publish to {topic}: {message}")]
    Publish { topic: String, message: String },

    /// The entity store has no state for this id.
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// The entity id does not split into `category.object_id`.
    #[error("Invalid entity id: {0}")]
    InvalidEntityId(String),

    /// Inbound command payload could not be decoded.
    #[error("Malformed command payload on {topic}: {message}")]
    MalformedCommandPayload { topic: String, message: String },

    /// The action-invocation collaborator reported a failure.
    #[error("Action {action} failed for {entity_id}: {message}")]
    Action {
        action: String,
        entity_id: String,
        message: String,
    },

    /// Worker error.
    #[error("Worker error: {0}")]
    Worker(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }

    /// Create a worker error.
    pub fn worker(msg: impl Into<String>) -> Self {
        Self::Worker(msg.into())
    }

    /// Create an action failure.
    pub fn action(
        action: impl Into<String>,
        entity_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Action {
            action: action.into(),
            entity_id: entity_id.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<json5::Error> for BridgeError {
    fn from(err: json5::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

impl From<entity_bridge_common::Error> for BridgeError {
    fn from(err: entity_bridge_common::Error) -> Self {
        use entity_bridge_common::Error;

        match err {
            Error::InvalidEntityId(id) => Self::InvalidEntityId(id),
            Error::Json(e) => Self::Serialization(e.to_string()),
            Error::Io(e) => Self::Io(e),
            Error::Config(msg) => Self::Config(msg),
        }
    }
}
