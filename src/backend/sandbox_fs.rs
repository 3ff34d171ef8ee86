//! File operations carried out inside the sandbox.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::FilesystemBackend;
use crate::sandbox::{shell_quote, FileUpload, SandboxBackend};

const FS_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SandboxFilesystem {
    sandbox: Arc<dyn SandboxBackend>,
}

impl SandboxFilesystem {
    pub fn new(sandbox: Arc<dyn SandboxBackend>) -> Self {
        Self { sandbox }
    }
}

fn parent_dir(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => None,
        Some(idx) => Some(&trimmed[..idx]),
    }
}

#[async_trait]
impl FilesystemBackend for SandboxFilesystem {
    async fn ls(&self, path: &str) -> anyhow::Result<Vec<String>> {
        let resp = self
            .sandbox
            .execute(
                &format!("ls -1Ap {}", shell_quote(path)),
                Some(FS_COMMAND_TIMEOUT),
            )
            .await?;
        if resp.exit_code != 0 {
            anyhow::bail!("ls {} failed: {}", path, resp.output.trim());
        }
        Ok(resp
            .output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn read(&self, path: &str) -> anyhow::Result<String> {
        let mut responses = self.sandbox.download_files(&[path.to_string()]).await;
        let resp = responses
            .pop()
            .ok_or_else(|| anyhow::anyhow!("No download response for {}", path))?;
        if let Some(err) = resp.error {
            anyhow::bail!("File '{}' not found: {}", path, err);
        }
        let bytes = resp.content.unwrap_or_default();
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn write(&self, path: &str, content: &str) -> anyhow::Result<()> {
        if let Some(dir) = parent_dir(path) {
            let resp = self
                .sandbox
                .execute(
                    &format!("mkdir -p {}", shell_quote(dir)),
                    Some(FS_COMMAND_TIMEOUT),
                )
                .await?;
            if resp.exit_code != 0 {
                anyhow::bail!("mkdir {} failed: {}", dir, resp.output.trim());
            }
        }

        let mut responses = self
            .sandbox
            .upload_files(vec![FileUpload {
                destination: path.to_string(),
                content: content.as_bytes().to_vec(),
            }])
            .await;
        match responses.pop() {
            Some(resp) => match resp.error {
                Some(err) => anyhow::bail!("Failed to write '{}': {}", path, err),
                None => Ok(()),
            },
            None => anyhow::bail!("No upload response for {}", path),
        }
    }
}
