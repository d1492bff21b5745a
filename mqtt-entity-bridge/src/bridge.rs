//! The running bridge.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use entity_bridge_common::{EntityId, TopicBuilder};
use entity_bridge_framework::{
    BridgeError, ConnectionManager, ConnectionState, PublishStats, Publisher, Result,
};

use crate::commands::{CommandRouter, spawn_command_worker};
use crate::config::EntityBridgeConfig;
use crate::host::{ActionInvoker, EntityStore};
use crate::registry::PublishedEntities;
use crate::state::{PublishReport, StatePublisher};

/// Handle to one bridge instance, returned by [`start`](Self::start).
///
/// Owns the broker session, the membership registry and the background
/// tasks. Dropping the handle aborts the tasks; [`stop`](Self::stop) also
/// closes the session cleanly.
pub struct BridgeHandle {
    connection: Arc<ConnectionManager>,
    publisher: StatePublisher,
    registry: Arc<PublishedEntities>,
    store: Arc<dyn EntityStore>,
    connect_timeout: Duration,
    tasks: Vec<JoinHandle<()>>,
}

impl BridgeHandle {
    /// Connect to the broker and start routing commands.
    ///
    /// Resolves once the broker accepted the session. A refused or
    /// unreachable broker is returned as an error after all tasks are
    /// cleaned up. The configured membership is published on every
    /// successful (re)connect.
    pub async fn start(
        config: &EntityBridgeConfig,
        store: Arc<dyn EntityStore>,
        invoker: Arc<dyn ActionInvoker>,
    ) -> Result<Self> {
        let topics = TopicBuilder::new(config.bridge.topic_prefix.clone());
        let registry = Arc::new(PublishedEntities::new(
            config.bridge.published_entities.clone(),
        )?);

        let (queue_tx, queue_rx) = mpsc::channel(config.bridge.command_queue_capacity.max(1));
        let router = Arc::new(CommandRouter::new(topics.clone(), queue_tx));
        let connection = Arc::new(ConnectionManager::new(
            config.mqtt.clone(),
            topics.clone(),
            router,
        ));
        let publisher = StatePublisher::new(Publisher::new(connection.clone(), topics));

        let worker = spawn_command_worker(queue_rx, invoker);
        let republisher = spawn_republish_on_connect(
            connection.watch_state(),
            registry.clone(),
            store.clone(),
            publisher.clone(),
        );

        let mut handle = Self {
            connection,
            publisher,
            registry,
            store,
            connect_timeout: Duration::from_secs(config.mqtt.connect_timeout_secs),
            tasks: vec![worker, republisher],
        };

        if let Err(e) = handle.establish().await {
            handle.shutdown().await;
            return Err(e);
        }

        tracing::info!(
            prefix = %handle.publisher.publisher().topics().prefix(),
            entities = handle.registry.len(),
            "Bridge started"
        );

        Ok(handle)
    }

    /// Cancel in-flight command handling and close the session.
    pub async fn stop(mut self) {
        self.shutdown().await;
        tracing::info!("Bridge stopped");
    }

    /// Open a fresh session after a terminal connection error.
    pub async fn reconnect(&self) -> Result<()> {
        self.establish().await
    }

    /// Publish one entity, whether or not it is in the membership.
    pub async fn publish_entity(&self, entity_id: &str) -> Result<PublishReport> {
        EntityId::parse(entity_id)?;

        let snapshot = self.store.get_state(entity_id).ok_or_else(|| {
            tracing::warn!(entity_id = %entity_id, "Entity not found, nothing published");
            BridgeError::EntityNotFound(entity_id.to_string())
        })?;

        Ok(self.publisher.publish(&snapshot).await)
    }

    /// Publish every member of the registry.
    pub async fn publish_all(&self) -> PublishStats {
        self.registry
            .publish_all(self.store.as_ref(), &self.publisher)
            .await
    }

    /// Replace the membership. Nothing is published until the next
    /// [`publish_all`](Self::publish_all) or reconnect.
    pub fn update_published_entities(&self, ids: Vec<String>) -> Result<()> {
        for id in &ids {
            if self.store.get_state(id).is_none() {
                tracing::warn!(entity_id = %id, "Published entity is unknown to the host");
            }
        }
        self.registry.replace_all(ids)
    }

    /// Current membership.
    pub fn published_entities(&self) -> Vec<String> {
        self.registry.get_all()
    }

    /// Current session state.
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Watch session state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.watch_state()
    }

    async fn establish(&self) -> Result<()> {
        self.connection.connect()?;
        self.connection.wait_connected(self.connect_timeout).await
    }

    async fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.connection.disconnect().await;
    }
}

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl std::fmt::Debug for BridgeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeHandle")
            .field("connection", &self.connection)
            .field("published", &self.registry.len())
            .finish()
    }
}

/// Publish the registry each time the session becomes connected.
fn spawn_republish_on_connect(
    mut state: watch::Receiver<ConnectionState>,
    registry: Arc<PublishedEntities>,
    store: Arc<dyn EntityStore>,
    publisher: StatePublisher,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut previous = *state.borrow_and_update();
        if previous == ConnectionState::Connected {
            registry.publish_all(store.as_ref(), &publisher).await;
        }

        while state.changed().await.is_ok() {
            let current = *state.borrow_and_update();
            if current == ConnectionState::Connected && previous != ConnectionState::Connected {
                registry.publish_all(store.as_ref(), &publisher).await;
            }
            previous = current;
        }
    })
}
