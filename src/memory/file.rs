//! JSON file-based preference store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};

use super::store::{upsert, PreferenceStore, Records};
use super::types::{MemoryError, Namespace, PreferenceRecord};

const STORE_FILE: &str = "preferences.json";

#[derive(Debug, Serialize, Deserialize, Default)]
struct PreferenceSnapshot {
    records: Vec<PreferenceRecord>,
}

#[derive(Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
    records: Arc<RwLock<Records>>,
    persist_lock: Arc<Mutex<()>>,
}

impl FilePreferenceStore {
    /// Open (or create) the store in `base_dir`.
    ///
    /// A store file that does not parse is moved aside to
    /// `preferences.json.corrupt-<timestamp>` and the store starts empty.
    /// Read errors other than a missing file are returned.
    pub async fn new(base_dir: &Path) -> Result<Self, MemoryError> {
        fs::create_dir_all(base_dir).await?;
        let path = base_dir.join(STORE_FILE);
        let snapshot = match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<PreferenceSnapshot>(&bytes) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    let aside = corrupt_path(&path);
                    fs::rename(&path, &aside).await?;
                    tracing::warn!(
                        "Failed to parse preference store {}: {}; moved to {}",
                        path.display(),
                        e,
                        aside.display()
                    );
                    PreferenceSnapshot::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => PreferenceSnapshot::default(),
            Err(err) => return Err(err.into()),
        };

        let mut records = Records::new();
        for record in snapshot.records {
            records
                .entry(record.namespace.clone())
                .or_default()
                .insert(record.key.clone(), record);
        }
        tracing::debug!(
            "Opened preference store {} ({} namespaces)",
            path.display(),
            records.len()
        );

        Ok(Self {
            path,
            records: Arc::new(RwLock::new(records)),
            persist_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Write `records` to disk. Callers hold `persist_lock`.
    async fn write_snapshot(&self, records: &Records) -> Result<(), MemoryError> {
        let snapshot = PreferenceSnapshot {
            records: records
                .values()
                .flat_map(|entries| entries.values().cloned())
                .collect(),
        };
        let data = serde_json::to_vec_pretty(&snapshot)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, data).await?;
        fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

fn corrupt_path(path: &Path) -> PathBuf {
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".corrupt-{}", stamp));
    PathBuf::from(name)
}

#[async_trait]
impl PreferenceStore for FilePreferenceStore {
    fn is_persistent(&self) -> bool {
        true
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
        // Commit in memory only after the snapshot is on disk.
        let _guard = self.persist_lock.lock().await;
        let mut next = self.records.read().await.clone();
        let record = upsert(&mut next, namespace, key, value);
        self.write_snapshot(&next).await?;
        *self.records.write().await = next;
        Ok(record)
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
    use tempfile::TempDir;

    fn ns(id: &str) -> Namespace {
        Namespace::for_assistant(&AssistantId::new(id).unwrap())
    }

    #[tokio::test]
    async fn survives_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let store = FilePreferenceStore::new(tmp.path()).await.unwrap();
            store
                .put(&ns("a"), "agent.json", json!({"content": "use 4 spaces"}))
                .await
                .unwrap();
        }
        let store = FilePreferenceStore::new(tmp.path()).await.unwrap();
        let rec = store.get(&ns("a"), "agent.json").await.unwrap().unwrap();
        assert_eq!(rec.file_content(), Some("use 4 spaces"));
        assert!(store.get(&ns("b"), "agent.json").await.unwrap().is_none());
        assert!(store.is_persistent());
    }

    #[tokio::test]
    async fn corrupt_file_is_kept_aside() {
        let tmp = TempDir::new().unwrap();
        {
            let store = FilePreferenceStore::new(tmp.path()).await.unwrap();
            store
                .put(&ns("a"), "agent.json", json!({"content": "use tabs"}))
                .await
                .unwrap();
        }
        let path = tmp.path().join(STORE_FILE);
        let mut raw = std::fs::read_to_string(&path).unwrap();
        raw.push_str("\n,");
        std::fs::write(&path, &raw).unwrap();

        let store = FilePreferenceStore::new(tmp.path()).await.unwrap();
        assert!(store.list(&ns("a")).await.unwrap().is_empty());
        store
            .put(&ns("b"), "agent.json", json!({"content": "use spaces"}))
            .await
            .unwrap();

        let aside: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.to_string_lossy().contains(".corrupt-"))
            .collect();
        assert_eq!(aside.len(), 1);
        assert_eq!(std::fs::read_to_string(&aside[0]).unwrap(), raw);
        assert!(std::fs::read_to_string(&path).unwrap().contains("use spaces"));
    }

    #[tokio::test]
    async fn unreadable_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join(STORE_FILE)).unwrap();
        assert!(FilePreferenceStore::new(tmp.path()).await.is_err());
    }

    #[tokio::test]
    async fn failed_write_leaves_store_unchanged() {
        let tmp = TempDir::new().unwrap();
        let store = FilePreferenceStore::new(tmp.path()).await.unwrap();
        store
            .put(&ns("a"), "agent.json", json!({"content": "v1"}))
            .await
            .unwrap();

        // A directory where the temp file goes makes the next write fail.
        std::fs::create_dir(tmp.path().join("preferences.json.tmp")).unwrap();
        assert!(store
            .put(&ns("a"), "agent.json", json!({"content": "v2"}))
            .await
            .is_err());
        assert!(store.put(&ns("a"), "notes.json", json!({})).await.is_err());

        let rec = store.get(&ns("a"), "agent.json").await.unwrap().unwrap();
        assert_eq!(rec.file_content(), Some("v1"));
        assert_eq!(store.list(&ns("a")).await.unwrap().len(), 1);
    }
}
