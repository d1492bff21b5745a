//! Seams to the host platform that owns the entities.

use async_trait::async_trait;

use entity_bridge_common::EntitySnapshot;
use entity_bridge_framework::Result;

use crate::category::Action;

/// Read access to the host's entity states.
pub trait EntityStore: Send + Sync {
    /// Current snapshot of an entity, or `None` if the host does not know it.
    fn get_state(&self, entity_id: &str) -> Option<EntitySnapshot>;

    /// Ids of every entity the host knows about.
    fn list_entity_ids(&self) -> Vec<String>;
}

/// Invokes actions on the host platform.
///
/// Called from the command worker, never from the network loop.
#[async_trait]
pub trait ActionInvoker: Send + Sync {
    async fn invoke_action(&self, category: &str, action: Action, entity_id: &str) -> Result<()>;
}
