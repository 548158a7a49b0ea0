use std::{
    collections::BTreeMap,
    sync::{PoisonError, RwLock},
};

use serde_json::{Map, Value};

use crate::document::QueryKey;

/// Query results keyed by [`QueryKey`].
///
/// Entries are stored whole; no normalization into individual objects
/// takes place.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<BTreeMap<QueryKey, Value>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, key: &QueryKey) -> Option<Value> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn write(&self, key: QueryKey, data: Value) {
        tracing::trace!(%key, "cache write");
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, data);
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Serialize every entry, e.g. for shipping server state to a client.
    pub fn extract(&self) -> Map<String, Value> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(key, data)| (key.to_string(), data.clone()))
            .collect()
    }

    /// Replace all entries with a previously extracted state.
    pub fn restore(&self, state: Map<String, Value>) {
        let restored = state
            .into_iter()
            .map(|(key, data)| (QueryKey::from_raw(key), data))
            .collect();
        *self.entries.write().unwrap_or_else(PoisonError::into_inner) = restored;
    }
}
