use crate::analysis::AnalysisResult;
use crate::store::{KeyValueStore, HISTORY_KEY};
use log::{debug, error, warn};
use std::collections::HashSet;
use std::sync::Arc;

pub const MAX_HISTORY_ENTRIES: usize = 10;

/// Past results, newest first, persisted as a whole after every mutation.
pub struct HistoryCache {
    store: Arc<dyn KeyValueStore>,
    entries: Vec<AnalysisResult>,
}

impl HistoryCache {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let entries = match store.get(HISTORY_KEY) {
            Some(raw) => parse_entries(&raw),
            None => Vec::new(),
        };
        debug!("Loaded {} history entries", entries.len());
        Self { store, entries }
    }

    pub fn add(&mut self, result: AnalysisResult) {
        self.entries.insert(0, result);
        self.entries.truncate(MAX_HISTORY_ENTRIES);
        self.persist();
    }

    /// Removes the entry with that id. Returns `false` when there is none.
    pub fn delete(&mut self, id: &str) -> bool {
        let Some(index) = self.entries.iter().position(|entry| entry.id() == id) else {
            return false;
        };
        self.entries.remove(index);
        self.persist();
        true
    }

    pub fn list(&self) -> &[AnalysisResult] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&AnalysisResult> {
        self.entries.iter().find(|entry| entry.id() == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn persist(&self) {
        let encoded = match serde_json::to_string(&self.entries) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!("Failed to encode analysis history: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.set(HISTORY_KEY, encoded) {
            error!("Failed to persist analysis history: {}", e);
        }
    }
}

fn parse_entries(raw: &str) -> Vec<AnalysisResult> {
    let values = match serde_json::from_str::<Vec<serde_json::Value>>(raw) {
        Ok(values) => values,
        Err(e) => {
            warn!("Stored analysis history is unreadable, starting empty: {}", e);
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let mut entries: Vec<AnalysisResult> = values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<AnalysisResult>(value) {
            Ok(entry) if seen.insert(entry.id().to_string()) => Some(entry),
            Ok(entry) => {
                warn!("Dropping duplicate history entry {}", entry.id());
                None
            }
            Err(e) => {
                warn!("Dropping invalid history entry: {}", e);
                None
            }
        })
        .collect();
    entries.truncate(MAX_HISTORY_ENTRIES);
    entries
}
