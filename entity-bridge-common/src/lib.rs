//! Entity Bridge Common Library
//!
//! Shared types and utilities for bridging a local entity registry to MQTT:
//!
//! - [`entity`] - Entity data model (`EntityId`, `EntitySnapshot`)
//! - [`topic`] - Topic builders and the inbound control-topic parser
//! - [`config`] - Broker and logging configuration sections
//! - [`error`] - Error types

pub mod config;
pub mod entity;
pub mod error;
pub mod topic;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig, MqttConfig};
pub use entity::{Attributes, EntityId, EntitySnapshot};
pub use error::{Error, Result};
pub use topic::{ControlTopic, DEFAULT_PREFIX, TopicBuilder};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
