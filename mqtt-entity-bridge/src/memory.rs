//! In-memory host platform.
//!
//! Backs the standalone binary and the tests. Turn-on/turn-off invocations
//! update the stored state, and every invocation is recorded.

use std::collections::BTreeMap;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use entity_bridge_common::EntitySnapshot;
use entity_bridge_framework::{BridgeError, Result};

use crate::category::Action;
use crate::host::{ActionInvoker, EntityStore};

/// One recorded action invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub category: String,
    pub action: Action,
    pub entity_id: String,
}

/// Entity store and action invoker kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryHost {
    states: RwLock<BTreeMap<String, EntitySnapshot>>,
    invocations: Mutex<Vec<Invocation>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the host with snapshots, keyed by their entity id.
    pub fn from_snapshots(snapshots: impl IntoIterator<Item = EntitySnapshot>) -> Self {
        let host = Self::new();
        for snapshot in snapshots {
            host.set_state(snapshot);
        }
        host
    }

    /// Insert or replace an entity's snapshot.
    pub fn set_state(&self, snapshot: EntitySnapshot) {
        self.states
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(snapshot.entity_id.clone(), snapshot);
    }

    /// Every invocation so far, oldest first.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn apply(&self, action: Action, entity_id: &str) -> Result<()> {
        let mut states = self.states.write().unwrap_or_else(|e| e.into_inner());
        let snapshot = states
            .get_mut(entity_id)
            .ok_or_else(|| BridgeError::EntityNotFound(entity_id.to_string()))?;

        let new_state = match action {
            Action::TurnOn => "on",
            Action::TurnOff => "off",
        };

        let now = Utc::now();
        if snapshot.state != new_state {
            snapshot.state = new_state.to_string();
            snapshot.last_changed = Some(now);
        }
        snapshot.last_updated = Some(now);

        Ok(())
    }
}

impl EntityStore for MemoryHost {
    fn get_state(&self, entity_id: &str) -> Option<EntitySnapshot> {
        self.states
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(entity_id)
            .cloned()
    }

    fn list_entity_ids(&self) -> Vec<String> {
        self.states
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ActionInvoker for MemoryHost {
    async fn invoke_action(&self, category: &str, action: Action, entity_id: &str) -> Result<()> {
        self.invocations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Invocation {
                category: category.to_string(),
                action,
                entity_id: entity_id.to_string(),
            });

        self.apply(action, entity_id)
            .map_err(|e| BridgeError::action(action.as_str(), entity_id, e.to_string()))
    }
}
