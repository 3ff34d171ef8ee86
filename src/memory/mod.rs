//! Long-term memory: user preferences scoped by assistant.
//!
//! Preferences live in a key/value store under the namespace
//! `("memories", <assistant id>)`. The agent sees them as files under
//! `/memories/<assistant id>/` (see [`crate::backend::StoreFilesystem`]), and
//! [`MemoryMiddleware`] injects `agent.json` into the system prompt.
//!
//! ```text
//!  MemoryMiddleware ──get agent.json──┐
//!                                     ▼
//!  StoreFilesystem ──put/list──▶ PreferenceStore ─┬─ InMemoryPreferenceStore
//!                                                 └─ FilePreferenceStore
//! ```

mod file;
mod middleware;
mod store;
mod types;

pub use file::FilePreferenceStore;
pub use middleware::MemoryMiddleware;
pub use store::{InMemoryPreferenceStore, PreferenceStore, SharedPreferenceStore};
pub use types::*;

use std::sync::Arc;

use crate::config::Config;

/// Open the store selected by configuration.
///
/// Uses the JSON file store when `MEMORY_STORE_PATH` is set, otherwise an
/// in-memory store that lasts for the process lifetime.
pub async fn open_store(config: &Config) -> Result<SharedPreferenceStore, MemoryError> {
    match &config.memory_store_path {
        Some(dir) => {
            let store = FilePreferenceStore::new(dir).await?;
            tracing::info!("Memory store: {}", dir.display());
            Ok(Arc::new(store))
        }
        None => {
            tracing::info!("Memory store: in-memory (set MEMORY_STORE_PATH to persist)");
            Ok(Arc::new(InMemoryPreferenceStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SandboxCredentials;
    use tempfile::TempDir;

    #[tokio::test]
    async fn open_store_follows_store_path() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::new(
            SandboxCredentials::Daytona {
                api_key: "k".to_string(),
                api_url: "http://localhost".to_string(),
            },
            tmp.path().join("skills"),
        );
        assert!(!open_store(&config).await.unwrap().is_persistent());

        config.memory_store_path = Some(tmp.path().join("memories"));
        assert!(open_store(&config).await.unwrap().is_persistent());
    }
}
