//! The preference store seen as files under `/<assistant id>/`.
//!
//! Each file is one record keyed by its path below the assistant directory,
//! holding `{"content": "<text>"}`. Paths naming another assistant are
//! rejected, so one assistant can never read or write another's memories.

use async_trait::async_trait;
use serde_json::json;

use super::FilesystemBackend;
use crate::memory::{AssistantId, MemoryError, Namespace, SharedPreferenceStore};

pub struct StoreFilesystem {
    store: SharedPreferenceStore,
    assistant_id: AssistantId,
    namespace: Namespace,
}

impl StoreFilesystem {
    pub fn new(store: SharedPreferenceStore, assistant_id: AssistantId) -> Self {
        let namespace = Namespace::for_assistant(&assistant_id);
        Self {
            store,
            assistant_id,
            namespace,
        }
    }

    /// Key below the assistant directory, or `None` for the directory itself.
    fn key_for<'a>(&self, path: &'a str) -> Result<Option<&'a str>, MemoryError> {
        let trimmed = path.trim_start_matches('/');
        let (owner, rest) = match trimmed.split_once('/') {
            Some((owner, rest)) => (owner, rest),
            None => (trimmed, ""),
        };
        if owner != self.assistant_id.as_str() {
            return Err(MemoryError::OutsideNamespace(path.to_string()));
        }
        let rest = rest.trim_end_matches('/');
        Ok(if rest.is_empty() { None } else { Some(rest) })
    }

    fn file_key<'a>(&self, path: &'a str) -> anyhow::Result<&'a str> {
        self.key_for(path)?
            .ok_or_else(|| anyhow::anyhow!("'{}' is a directory", path))
    }
}

#[async_trait]
impl FilesystemBackend for StoreFilesystem {
    async fn ls(&self, path: &str) -> anyhow::Result<Vec<String>> {
        if path.trim_matches('/').is_empty() {
            return Ok(vec![format!("{}/", self.assistant_id)]);
        }
        let dir = match self.key_for(path)? {
            Some(sub) => format!("{}/", sub),
            None => String::new(),
        };

        let mut entries: Vec<String> = self
            .store
            .list(&self.namespace)
            .await?
            .into_iter()
            .filter_map(|record| {
                let rest = record.key.strip_prefix(dir.as_str())?;
                Some(match rest.split_once('/') {
                    Some((sub, _)) => format!("{}/", sub),
                    None => rest.to_string(),
                })
            })
            .collect();
        entries.dedup();
        Ok(entries)
    }

    async fn read(&self, path: &str) -> anyhow::Result<String> {
        let key = self.file_key(path)?;
        let record = self
            .store
            .get(&self.namespace, key)
            .await?
            .ok_or_else(|| anyhow::anyhow!("File '{}' not found", path))?;
        Ok(match record.file_content() {
            Some(text) => text.to_string(),
            None => serde_json::to_string_pretty(&record.value)?,
        })
    }

    async fn write(&self, path: &str, content: &str) -> anyhow::Result<()> {
        let key = self.file_key(path)?;
        self.store
            .put(&self.namespace, key, json!({ "content": content }))
            .await?;
        tracing::debug!("Stored memory file {} for {}", key, self.assistant_id);
        Ok(())
    }
}
