//! MQTT entity bridge.
//!
//! Loads the configured entities into an in-memory host, publishes them with
//! discovery metadata and applies inbound on/off commands until Ctrl+C.

use std::sync::Arc;

use anyhow::{Context, Result};
use entity_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner, ConnectionState};
use mqtt_entity_bridge::{BridgeHandle, EntityBridgeConfig, EntityStore, MemoryHost};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = BridgeArgs::parse_with_default("mqtt-entity-bridge.json5");

    // Load configuration
    let config = EntityBridgeConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    let mut runner = BridgeRunner::new_with_args("mqtt-entity-bridge", config, Some(&args))?;

    let host = Arc::new(MemoryHost::from_snapshots(runner.config().entities.clone()));
    tracing::info!(entities = host.list_entity_ids().len(), "In-memory host seeded");

    let handle = BridgeHandle::start(runner.config(), host.clone(), host)
        .await
        .context("Failed to start bridge")?;

    let mut state = handle.watch_state();
    runner.spawn(async move {
        while state.changed().await.is_ok() {
            let current = *state.borrow_and_update();
            match current {
                ConnectionState::Error(code) => {
                    tracing::error!(error = %code, "Broker session failed, restart the bridge to reconnect")
                }
                other => tracing::debug!(state = %other, "Connection state changed"),
            }
        }
    });

    runner.run(handle.stop()).await?;

    Ok(())
}
