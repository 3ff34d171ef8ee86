//! Preference store trait and the in-memory implementation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::types::{now_string, MemoryError, Namespace, PreferenceRecord};

/// Key/value store for preference records.
///
/// Every operation is scoped to one namespace; nothing written under one
/// namespace is visible under another. There is no delete.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Whether this store persists data across restarts.
    fn is_persistent(&self) -> bool;

    async fn get(
        &self,
        namespace: &Namespace,
        key: &str,
    ) -> Result<Option<PreferenceRecord>, MemoryError>;

    /// Create or replace a record. `created_at` survives replacement.
    async fn put(
        &self,
        namespace: &Namespace,
        key: &str,
        value: serde_json::Value,
    ) -> Result<PreferenceRecord, MemoryError>;

    /// All records in a namespace, ordered by key.
    async fn list(&self, namespace: &Namespace) -> Result<Vec<PreferenceRecord>, MemoryError>;
}

pub type SharedPreferenceStore = Arc<dyn PreferenceStore>;

pub(super) type Records = HashMap<Namespace, BTreeMap<String, PreferenceRecord>>;

/// Insert or replace `key`, keeping the original creation time.
pub(super) fn upsert(
    records: &mut Records,
    namespace: &Namespace,
    key: &str,
    value: serde_json::Value,
) -> PreferenceRecord {
    let entries = records.entry(namespace.clone()).or_default();
    let record = match entries.get(key) {
        Some(existing) => PreferenceRecord {
            value,
            updated_at: now_string(),
            ..existing.clone()
        },
        None => PreferenceRecord::new(namespace.clone(), key, value),
    };
    entries.insert(key.to_string(), record.clone());
    record
}

/// In-memory store (non-persistent).
#[derive(Clone, Default)]
pub struct InMemoryPreferenceStore {
    records: Arc<RwLock<Records>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn get(
        &self,
        namespace: &Namespace,
        key: &str,
    ) -> Result<Option<PreferenceRecord>, MemoryError> {
        Ok(self
            .records
            .read()
            .await
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn put(
        &self,
        namespace: &Namespace,
        key: &str,
        value: serde_json::Value,
    ) -> Result<PreferenceRecord, MemoryError> {
        let mut records = self.records.write().await;
        Ok(upsert(&mut records, namespace, key, value))
    }

    async fn list(&self, namespace: &Namespace) -> Result<Vec<PreferenceRecord>, MemoryError> {
        Ok(self
            .records
            .read()
            .await
            .get(namespace)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::AssistantId;
    use serde_json::json;

    fn ns(id: &str) -> Namespace {
        Namespace::for_assistant(&AssistantId::new(id).unwrap())
    }

    #[tokio::test]
    async fn records_are_partitioned_by_assistant() {
        let store = InMemoryPreferenceStore::new();
        store
            .put(&ns("a"), "agent.json", json!({"style": "tabs"}))
            .await
            .unwrap();

        assert!(store.get(&ns("b"), "agent.json").await.unwrap().is_none());
        assert!(store.list(&ns("b")).await.unwrap().is_empty());
        let rec = store.get(&ns("a"), "agent.json").await.unwrap().unwrap();
        assert_eq!(rec.value, json!({"style": "tabs"}));
    }

    #[tokio::test]
    async fn put_replaces_value_and_keeps_created_at() {
        let store = InMemoryPreferenceStore::new();
        let first = store.put(&ns("a"), "k", json!(1)).await.unwrap();
        let second = store.put(&ns("a"), "k", json!(2)).await.unwrap();
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.value, json!(2));
        assert_eq!(store.list(&ns("a")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_is_ordered_by_key() {
        let store = InMemoryPreferenceStore::new();
        store.put(&ns("a"), "b.md", json!(null)).await.unwrap();
        store.put(&ns("a"), "a.md", json!(null)).await.unwrap();
        let keys: Vec<_> = store
            .list(&ns("a"))
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["a.md", "b.md"]);
    }
}
