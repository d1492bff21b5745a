//! MQTT bridge for a local entity registry.
//!
//! Publishes entity snapshots with discovery metadata and turns inbound
//! control messages into host actions.
//!
//! # Topic Format
//!
//! Outbound, retained at QoS 1:
//! ```text
//! {prefix}/{category}/{object_id}/config
//! {prefix}/{category}/{object_id}/state
//! ```
//!
//! Inbound:
//! ```text
//! {prefix}/control/{category}/{object_id}/{command}
//! ```
//!
//! For example:
//! ```text
//! home/light/kitchen/config
//! home/control/switch/fan/set
//! ```

pub mod bridge;
pub mod category;
pub mod commands;
pub mod config;
pub mod discovery;
pub mod host;
pub mod memory;
pub mod registry;
pub mod state;

pub use bridge::BridgeHandle;
pub use category::{Action, Category};
pub use commands::{ActionRequest, CommandPayload, CommandRouter, RouteOutcome};
pub use config::{BridgeSettings, EntityBridgeConfig};
pub use discovery::{DiscoveryDescriptor, synthesize};
pub use host::{ActionInvoker, EntityStore};
pub use memory::{Invocation, MemoryHost};
pub use registry::PublishedEntities;
pub use state::{PublishReport, StatePublisher};
