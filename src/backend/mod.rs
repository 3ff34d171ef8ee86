//! Filesystem view the agent works through.
//!
//! The agent addresses one absolute path space. [`CompositeBackend`] routes
//! each path by longest matching prefix: `/memories/` goes to the preference
//! store, everything else to the sandbox.

mod sandbox_fs;
mod store_fs;

pub use sandbox_fs::SandboxFilesystem;
pub use store_fs::StoreFilesystem;

use std::sync::Arc;

use async_trait::async_trait;

/// Prefix routed to the preference store.
pub const MEMORIES_ROUTE: &str = "/memories/";

/// File operations over some storage.
///
/// `ls` returns entry names, directories suffixed with `/`.
#[async_trait]
pub trait FilesystemBackend: Send + Sync {
    async fn ls(&self, path: &str) -> anyhow::Result<Vec<String>>;

    async fn read(&self, path: &str) -> anyhow::Result<String>;

    /// Create or overwrite a file.
    async fn write(&self, path: &str, content: &str) -> anyhow::Result<()>;

    /// Replace `old` with `new`. Unless `replace_all` is set, `old` must occur
    /// exactly once. Returns the number of replacements.
    async fn edit(
        &self,
        path: &str,
        old: &str,
        new: &str,
        replace_all: bool,
    ) -> anyhow::Result<usize> {
        if old.is_empty() {
            anyhow::bail!("old_string must not be empty");
        }
        let content = self.read(path).await?;
        let occurrences = content.matches(old).count();
        if occurrences == 0 {
            anyhow::bail!("String not found in file '{}'", path);
        }
        if occurrences > 1 && !replace_all {
            anyhow::bail!(
                "String appears {} times in file '{}'. Use replace_all or provide more context",
                occurrences,
                path
            );
        }
        let updated = if replace_all {
            content.replace(old, new)
        } else {
            content.replacen(old, new, 1)
        };
        self.write(path, &updated).await?;
        Ok(occurrences)
    }
}

pub type SharedFilesystem = Arc<dyn FilesystemBackend>;

/// Routes paths to backends by prefix.
pub struct CompositeBackend {
    default: SharedFilesystem,
    /// Sorted longest prefix first.
    routes: Vec<(String, SharedFilesystem)>,
}

impl CompositeBackend {
    pub fn new(default: SharedFilesystem) -> Self {
        Self {
            default,
            routes: Vec::new(),
        }
    }

    /// Route paths starting with `prefix` (which must end in `/`) to `backend`.
    pub fn route(mut self, prefix: &str, backend: SharedFilesystem) -> Self {
        let prefix = if prefix.ends_with('/') {
            prefix.to_string()
        } else {
            format!("{}/", prefix)
        };
        self.routes.push((prefix, backend));
        self.routes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        self
    }

    /// Pick the backend for `path` and the path as that backend sees it.
    ///
    /// Routed backends receive the remainder after the prefix, rooted at `/`.
    fn resolve<'a>(&'a self, path: &str) -> (&'a SharedFilesystem, String) {
        for (prefix, backend) in &self.routes {
            let bare = prefix.trim_end_matches('/');
            if path == bare {
                return (backend, "/".to_string());
            }
            if let Some(rest) = path.strip_prefix(prefix.as_str()) {
                return (backend, format!("/{}", rest));
            }
        }
        (&self.default, path.to_string())
    }
}

#[async_trait]
impl FilesystemBackend for CompositeBackend {
    async fn ls(&self, path: &str) -> anyhow::Result<Vec<String>> {
        let (backend, inner) = self.resolve(path);
        let mut entries = backend.ls(&inner).await?;
        if path.trim_end_matches('/').is_empty() {
            for (prefix, _) in &self.routes {
                let top = format!("{}/", prefix.trim_matches('/'));
                if !entries.contains(&top) {
                    entries.push(top);
                }
            }
            entries.sort();
        }
        Ok(entries)
    }

    async fn read(&self, path: &str) -> anyhow::Result<String> {
        let (backend, inner) = self.resolve(path);
        backend.read(&inner).await
    }

    async fn write(&self, path: &str, content: &str) -> anyhow::Result<()> {
        let (backend, inner) = self.resolve(path);
        backend.write(&inner, content).await
    }

    async fn edit(
        &self,
        path: &str,
        old: &str,
        new: &str,
        replace_all: bool,
    ) -> anyhow::Result<usize> {
        let (backend, inner) = self.resolve(path);
        backend.edit(&inner, old, new, replace_all).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{AssistantId, InMemoryPreferenceStore};
    use crate::sandbox::testing::FakeSandbox;

    fn composite(fake: Arc<FakeSandbox>) -> CompositeBackend {
        let store = Arc::new(InMemoryPreferenceStore::new());
        let memories = StoreFilesystem::new(store, AssistantId::new("asst").unwrap());
        CompositeBackend::new(Arc::new(SandboxFilesystem::new(fake)))
            .route(MEMORIES_ROUTE, Arc::new(memories))
    }

    #[tokio::test]
    async fn memories_prefix_goes_to_store() {
        let fake = Arc::new(FakeSandbox::new());
        let fs = composite(fake.clone());

        fs.write("/memories/asst/agent.json", "{\"indent\": 2}")
            .await
            .unwrap();
        assert_eq!(
            fs.read("/memories/asst/agent.json").await.unwrap(),
            "{\"indent\": 2}"
        );
        assert!(fake.files.read().await.is_empty());
        assert_eq!(fs.ls("/memories/asst").await.unwrap(), vec!["agent.json"]);
    }

    #[tokio::test]
    async fn other_paths_go_to_sandbox() {
        let fake = Arc::new(FakeSandbox::new());
        let fs = composite(fake.clone());

        fs.write("/home/daytona/main.py", "print('hi')").await.unwrap();
        assert!(fake
            .files
            .read()
            .await
            .contains_key("/home/daytona/main.py"));
        assert_eq!(fs.read("/home/daytona/main.py").await.unwrap(), "print('hi')");
    }

    #[tokio::test]
    async fn root_listing_includes_routes() {
        let fake = Arc::new(FakeSandbox::new());
        fake.files
            .write()
            .await
            .insert("/home/x".to_string(), Vec::new());
        let fs = composite(fake);
        let entries = fs.ls("/").await.unwrap();
        assert_eq!(entries, vec!["home/", "memories/"]);
    }

    #[tokio::test]
    async fn edit_requires_unique_match() {
        let fake = Arc::new(FakeSandbox::new());
        let fs = composite(fake);
        fs.write("/w/a.py", "x = 1\nx = 1\n").await.unwrap();

        let err = fs.edit("/w/a.py", "x = 1", "x = 2", false).await.unwrap_err();
        assert!(err.to_string().contains("appears 2 times"));

        assert_eq!(fs.edit("/w/a.py", "x = 1", "x = 2", true).await.unwrap(), 2);
        assert_eq!(fs.read("/w/a.py").await.unwrap(), "x = 2\nx = 2\n");

        assert!(fs.edit("/w/a.py", "missing", "y", false).await.is_err());
    }
}
