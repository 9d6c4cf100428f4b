//! In-process cache of resolved models

use crate::store::{normalize_item_id, ModelArtifact};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Loaded or freshly trained artifacts keyed by normalised item identifier.
///
/// Entries are never evicted; they are replaced only when the forecast
/// service retrains an item.
#[derive(Debug, Default)]
pub struct ModelCache {
    entries: Mutex<HashMap<String, Arc<ModelArtifact>>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Arc<ModelArtifact>>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, item_id: &str) -> Option<Arc<ModelArtifact>> {
        self.entries().get(&normalize_item_id(item_id)).cloned()
    }

    pub fn insert(&self, item_id: &str, artifact: Arc<ModelArtifact>) {
        self.entries().insert(normalize_item_id(item_id), artifact);
    }

    /// Drop the entry for `item_id`, returning it if present
    pub fn invalidate(&self, item_id: &str) -> Option<Arc<ModelArtifact>> {
        self.entries().remove(&normalize_item_id(item_id))
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
