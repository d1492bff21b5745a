//! Entity Bridge Framework
//!
//! Common abstractions for bridges that expose local state over MQTT.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`ConnectionManager`] for the broker session lifecycle (connect,
//!   keep-alive, resubscription, disconnect)
//! - [`Publisher`] for retained QoS 1 JSON publishing over a [`Transport`]
//! - [`BridgeRunner`] for process lifecycle (logging, tasks, Ctrl+C)
//! - [`BridgeArgs`] for common CLI argument parsing
//!
//! # Example
//!
//! ```ignore
//! use entity_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = BridgeArgs::parse_with_default("mybridge.json5");
//!     let config = MyBridgeConfig::load(&args.config)?;
//!
//!     let runner = BridgeRunner::new_with_args("mybridge", config, Some(&args))?;
//!
//!     // Run until Ctrl+C
//!     runner.run(async {}).await
//! }
//! ```

mod args;
mod config;
mod connection;
mod error;
mod publisher;
mod runner;

pub use args::BridgeArgs;
pub use config::{BridgeConfig, validate_common};
pub use connection::{ConnectErrorCode, ConnectionManager, ConnectionState, MessageHandler};
pub use error::{BridgeError, Result};
pub use publisher::{Delivery, PublishStats, Publisher, Transport};
pub use runner::BridgeRunner;

// Re-export commonly used types from entity-bridge-common
pub use entity_bridge_common::{
    EntityId, EntitySnapshot, LogFormat, LoggingConfig, MqttConfig, TopicBuilder,
};
