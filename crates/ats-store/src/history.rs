//! Recent-search history, most recent first.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::storage::{read_json, write_json, KeyValueStore, BLOB_VERSION};

pub const HISTORY_KEY_PREFIX: &str = "search-history-";
pub const DEFAULT_HISTORY_CAP: usize = 10;
pub const DEFAULT_MIN_QUERY_LEN: usize = 2;

#[derive(Serialize)]
struct StoredHistoryOut<'a> {
    version: &'static str,
    queries: &'a [String],
}

#[derive(Deserialize)]
struct StoredHistoryIn {
    #[serde(default)]
    queries: Vec<String>,
}

pub struct SearchHistory {
    context: String,
    entries: Vec<String>,
    cap: usize,
    min_len: usize,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl std::fmt::Debug for SearchHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchHistory")
            .field("context", &self.context)
            .field("entries", &self.entries)
            .field("cap", &self.cap)
            .finish_non_exhaustive()
    }
}

impl SearchHistory {
    #[must_use]
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            entries: Vec::new(),
            cap: DEFAULT_HISTORY_CAP,
            min_len: DEFAULT_MIN_QUERY_LEN,
            store: None,
        }
    }

    /// History loaded from `search-history-<context>`. Unreadable blobs are
    /// logged and treated as empty.
    #[must_use]
    pub fn with_store(context: impl Into<String>, store: Arc<dyn KeyValueStore>) -> Self {
        let mut history = Self::new(context);
        let key = history.storage_key();
        match read_json::<StoredHistoryIn>(store.as_ref(), &key) {
            Ok(Some(saved)) => {
                history.entries = saved.queries;
                history.entries.truncate(history.cap);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(key = %key, error = %e, "ignoring saved search history"),
        }
        history.store = Some(store);
        history
    }

    /// Overrides the entry cap and minimum query length.
    #[must_use]
    pub fn with_limits(mut self, cap: usize, min_len: usize) -> Self {
        self.cap = cap;
        self.min_len = min_len;
        self.entries.truncate(cap);
        self
    }

    #[must_use]
    pub fn storage_key(&self) -> String {
        format!("{HISTORY_KEY_PREFIX}{}", self.context)
    }

    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    #[must_use]
    pub fn min_len(&self) -> usize {
        self.min_len
    }

    /// Records `query` at the front, dropping any earlier copy. Blank or
    /// too-short queries are ignored.
    pub fn add(&mut self, query: &str) {
        if query.trim().is_empty() || query.chars().count() < self.min_len {
            return;
        }
        self.entries.retain(|entry| entry != query);
        self.entries.insert(0, query.to_owned());
        self.entries.truncate(self.cap);
        self.persist();
    }

    pub fn remove(&mut self, query: &str) {
        self.entries.retain(|entry| entry != query);
        self.persist();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        if let Some(store) = &self.store {
            let key = self.storage_key();
            if let Err(e) = store.remove(&key) {
                tracing::warn!(key = %key, error = %e, "failed to clear search history");
            }
        }
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let key = self.storage_key();
        let blob = StoredHistoryOut {
            version: BLOB_VERSION,
            queries: &self.entries,
        };
        if let Err(e) = write_json(store.as_ref(), &key, &blob) {
            tracing::warn!(key = %key, error = %e, "failed to save search history");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn most_recent_first_without_duplicates() {
        let mut history = SearchHistory::new("search");
        history.add("ron");
        history.add("vodka");
        history.add("ron");
        assert_eq!(history.entries(), ["ron", "vodka"]);
    }

    #[test]
    fn short_and_blank_queries_are_ignored() {
        let mut history = SearchHistory::new("search");
        history.add("a");
        history.add("   ");
        assert!(history.entries().is_empty());
    }

    #[test]
    fn capped_at_ten() {
        let mut history = SearchHistory::new("search");
        for i in 0..15 {
            history.add(&format!("query {i}"));
        }
        assert_eq!(history.entries().len(), 10);
        assert_eq!(history.entries()[0], "query 14");
        assert_eq!(history.entries()[9], "query 5");
    }

    #[test]
    fn persists_and_clears() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut history = SearchHistory::with_store("search", store.clone());
        history.add("tequila");
        history.add("pisco");
        history.remove("tequila");

        let reloaded = SearchHistory::with_store("search", store.clone());
        assert_eq!(reloaded.entries(), ["pisco"]);

        history.clear();
        assert!(store.get("search-history-search").unwrap().is_none());
    }

    #[test]
    fn custom_limits() {
        let mut history = SearchHistory::new("search").with_limits(2, 4);
        history.add("ron");
        history.add("whisky");
        history.add("tequila");
        history.add("cerveza");
        assert_eq!(history.entries(), ["cerveza", "tequila"]);
    }
}
