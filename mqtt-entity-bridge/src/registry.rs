//! The set of entity ids under bridge management.

use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use entity_bridge_common::EntityId;
use entity_bridge_framework::{BridgeError, PublishStats, Result};

use crate::host::EntityStore;
use crate::state::StatePublisher;

/// Ordered membership list of published entities.
///
/// Replacement is a full swap under the write lock, last writer wins.
#[derive(Debug, Default)]
pub struct PublishedEntities {
    ids: RwLock<Vec<String>>,
}

impl PublishedEntities {
    /// Create a registry with an initial membership.
    pub fn new(ids: Vec<String>) -> Result<Self> {
        let registry = Self::default();
        registry.replace_all(ids)?;
        Ok(registry)
    }

    /// Current membership in insertion order.
    pub fn get_all(&self) -> Vec<String> {
        self.read().clone()
    }

    /// Number of published entities.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no entity is published.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Replace the whole membership.
    ///
    /// Every id must be a valid `category.object_id`; on error the previous
    /// membership is kept untouched. Duplicates keep their first position.
    pub fn replace_all(&self, ids: Vec<String>) -> Result<()> {
        if let Some(invalid) = ids.iter().find(|id| EntityId::parse(id).is_err()) {
            return Err(BridgeError::InvalidEntityId(invalid.clone()));
        }

        let mut seen = HashSet::new();
        let ids: Vec<String> = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();

        tracing::debug!(count = ids.len(), "Published entities replaced");
        *self.write() = ids;
        Ok(())
    }

    /// Publish every member sequentially.
    ///
    /// Works on a copy of the membership taken at the start, so a concurrent
    /// replacement only affects the next batch. Failures are counted, never
    /// propagated.
    pub async fn publish_all(&self, store: &dyn EntityStore, publisher: &StatePublisher) -> PublishStats {
        let ids = self.get_all();
        let mut stats = PublishStats::default();

        for id in &ids {
            let Some(snapshot) = store.get_state(id) else {
                let err = BridgeError::EntityNotFound(id.clone());
                tracing::warn!(entity_id = %id, error = %err, "Skipping entity");
                stats.missing += 1;
                continue;
            };

            if publisher.publish(&snapshot).await.is_complete() {
                stats.success += 1;
            } else {
                stats.failed += 1;
            }
        }

        tracing::info!(
            success = stats.success,
            failed = stats.failed,
            missing = stats.missing,
            "Published entities"
        );

        stats
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<String>> {
        self.ids.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<String>> {
        self.ids.write().unwrap_or_else(|e| e.into_inner())
    }
}
