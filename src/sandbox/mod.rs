//! Remote code-execution sandboxes.
//!
//! A sandbox is created per task, has the skills directory uploaded into it,
//! and is deleted when the task ends. Providers implement [`SandboxBackend`];
//! [`SandboxSession`] owns the lifecycle.
//!
//! ```text
//!   SandboxSession::start
//!        │  collect skill files (local disk)
//!        │  create sandbox (provider API)
//!        │  poll `echo ready` until exit code 0
//!        │  upload skills
//!        ▼
//!   agent uses backend ──▶ shutdown() deletes the sandbox
//! ```

mod daytona;
mod error;
mod runloop;

pub use daytona::DaytonaSandbox;
pub use error::{classify_http_status, SandboxError, SandboxErrorKind};
pub use runloop::RunloopSandbox;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{Config, SandboxConfig, SandboxCredentials, SandboxProvider};
use crate::skills;

/// Timeout for a single readiness probe.
const READY_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of running a shell command in the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    /// Combined stdout and stderr
    pub output: String,
    pub exit_code: i32,
    /// Whether `output` was cut short by the provider
    pub truncated: bool,
}

/// A file to place in the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    /// Absolute path inside the sandbox
    pub destination: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUploadResponse {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDownloadResponse {
    pub path: String,
    pub content: Option<Vec<u8>>,
    pub error: Option<String>,
}

/// A live sandbox at some provider.
///
/// Batch operations report per-file failures in their responses instead of
/// failing the whole batch. Response order matches input order.
#[async_trait]
pub trait SandboxBackend: Send + Sync {
    /// Provider-assigned sandbox id.
    fn id(&self) -> &str;

    fn provider(&self) -> SandboxProvider;

    /// Run a shell command.
    async fn execute(
        &self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<ExecuteResponse, SandboxError>;

    async fn upload_files(&self, files: Vec<FileUpload>) -> Vec<FileUploadResponse>;

    async fn download_files(&self, paths: &[String]) -> Vec<FileDownloadResponse>;

    /// Destroy the sandbox at the provider.
    async fn delete(&self) -> Result<(), SandboxError>;
}

/// Create a sandbox at the configured provider. The sandbox may not be ready yet.
pub async fn create_backend(
    config: &SandboxConfig,
) -> Result<Arc<dyn SandboxBackend>, SandboxError> {
    match &config.credentials {
        SandboxCredentials::Daytona { api_key, api_url } => {
            let sandbox = DaytonaSandbox::create(api_url, api_key).await?;
            Ok(Arc::new(sandbox))
        }
        SandboxCredentials::Runloop { api_key, api_url } => {
            let sandbox = RunloopSandbox::create(api_url, api_key).await?;
            Ok(Arc::new(sandbox))
        }
        SandboxCredentials::Modal { .. } => Err(SandboxError::unsupported(
            SandboxProvider::Modal.as_str(),
        )),
    }
}

/// A ready sandbox with skills uploaded.
pub struct SandboxSession {
    backend: Arc<dyn SandboxBackend>,
}

impl SandboxSession {
    /// Collect skills, create a sandbox and wait for it to become ready.
    ///
    /// Skill files are read from disk before the sandbox is created, so every
    /// file scheduled for upload exists at that point.
    pub async fn start(config: &Config) -> anyhow::Result<Self> {
        let uploads =
            skills::collect_skill_uploads(&config.skills.dir, &config.sandbox.skills_path())
                .await?;

        tracing::info!(
            "Starting {} sandbox ({} skill files queued)",
            config.sandbox.provider(),
            uploads.len()
        );
        let backend = create_backend(&config.sandbox).await?;

        let session = Self::start_with(
            backend,
            uploads,
            config.sandbox.ready_attempts,
            config.sandbox.ready_interval,
        )
        .await?;
        Ok(session)
    }

    /// Wait for an already-created sandbox and upload `uploads` into it.
    ///
    /// Transient probe errors are retried. A permanent error (bad credentials,
    /// unknown sandbox) or running out of attempts deletes the sandbox (best
    /// effort) before returning.
    pub async fn start_with(
        backend: Arc<dyn SandboxBackend>,
        uploads: Vec<FileUpload>,
        ready_attempts: u32,
        ready_interval: Duration,
    ) -> Result<Self, SandboxError> {
        let mut last_error = None;
        for attempt in 1..=ready_attempts {
            match backend.execute("echo ready", Some(READY_PROBE_TIMEOUT)).await {
                Ok(resp) if resp.exit_code == 0 => {
                    upload_skills(backend.as_ref(), uploads).await;
                    tracing::info!("Sandbox ready: {}", backend.id());
                    return Ok(Self { backend });
                }
                Ok(resp) => {
                    tracing::debug!(
                        "Sandbox {} not ready (attempt {}, exit code {})",
                        backend.id(),
                        attempt,
                        resp.exit_code
                    );
                    last_error = Some(format!("exit code {}", resp.exit_code));
                }
                Err(e) if !e.is_transient() => {
                    tracing::warn!("Sandbox {} rejected readiness probe: {}", backend.id(), e);
                    discard(backend.as_ref()).await;
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!("Error waiting for sandbox {}: retrying: {}", backend.id(), e);
                    last_error = Some(e.to_string());
                }
            }
            if attempt < ready_attempts {
                tokio::time::sleep(ready_interval).await;
            }
        }

        discard(backend.as_ref()).await;
        Err(SandboxError::start_timeout(
            ready_interval.saturating_mul(ready_attempts),
            last_error.as_deref(),
        ))
    }

    pub fn id(&self) -> &str {
        self.backend.id()
    }

    pub fn backend(&self) -> Arc<dyn SandboxBackend> {
        Arc::clone(&self.backend)
    }

    /// Delete the sandbox. Failures are logged, not returned.
    pub async fn shutdown(self) {
        let id = self.backend.id().to_string();
        tracing::info!("Deleting sandbox {}...", id);
        match self.backend.delete().await {
            Ok(()) => tracing::info!("Sandbox {} terminated", id),
            Err(e) => tracing::warn!("Cleanup failed for sandbox {}: {}", id, e),
        }
    }
}

async fn discard(backend: &dyn SandboxBackend) {
    if let Err(e) = backend.delete().await {
        tracing::warn!("Cleanup of sandbox {} failed: {}", backend.id(), e);
    }
}

/// Upload skills into the sandbox. Failures are logged and do not abort the session.
async fn upload_skills(backend: &dyn SandboxBackend, uploads: Vec<FileUpload>) {
    if uploads.is_empty() {
        return;
    }
    let total = uploads.len();
    let results = backend.upload_files(uploads).await;
    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();
    for f in &failed {
        tracing::warn!(
            "Failed to upload skill file {}: {}",
            f.path,
            f.error.as_deref().unwrap_or("unknown error")
        );
    }
    tracing::info!(
        "Uploaded {}/{} skill files to sandbox {}",
        total - failed.len(),
        total,
        backend.id()
    );
}

/// Quote a string for POSIX shells.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}


#[cfg(test)]
mod tests {
    use super::testing::FakeSandbox;
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::Ordering;

    fn upload(dest: &str, body: &str) -> FileUpload {
        FileUpload {
            destination: dest.to_string(),
            content: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn start_uploads_skills_once_ready() {
        let fake = Arc::new(FakeSandbox::not_ready_for(2));
        let session = SandboxSession::start_with(
            fake.clone(),
            vec![upload("/home/daytona/skills/a/SKILL.md", "x")],
            5,
            Duration::from_millis(1),
        )
        .await
        .unwrap();

        assert_eq!(session.id(), "fake-sandbox");
        let probes = fake
            .commands
            .read()
            .await
            .iter()
            .filter(|c| c.as_str() == "echo ready")
            .count();
        assert_eq!(probes, 3);
        assert!(fake
            .files
            .read()
            .await
            .contains_key("/home/daytona/skills/a/SKILL.md"));
        assert!(!fake.deleted.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn start_times_out_and_deletes() {
        let fake = Arc::new(FakeSandbox::not_ready_for(10));
        let err = SandboxSession::start_with(fake.clone(), vec![], 3, Duration::from_millis(1))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind, SandboxErrorKind::StartTimeout);
        assert!(err.message.contains("last error: server error (503): starting"));
        assert!(fake.deleted.load(Ordering::SeqCst));
        assert!(fake.files.read().await.is_empty());
    }

    #[tokio::test]
    async fn permanent_probe_error_stops_polling() {
        let mut fake = FakeSandbox::not_ready_for(10);
        fake.probe_status = 401;
        let fake = Arc::new(fake);
        let err = SandboxSession::start_with(fake.clone(), vec![], 5, Duration::from_millis(1))
            .await
            .err()
            .unwrap();

        assert_eq!(err.kind, SandboxErrorKind::ClientError);
        assert_eq!(err.status_code, Some(401));
        assert_eq!(fake.commands.read().await.len(), 1);
        assert!(fake.deleted.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn upload_failures_do_not_abort_start() {
        let mut fake = FakeSandbox::new();
        fake.fail_uploads = true;
        let fake = Arc::new(fake);
        let session = SandboxSession::start_with(
            fake.clone(),
            vec![upload("/home/daytona/skills/a/SKILL.md", "x")],
            1,
            Duration::from_millis(1),
        )
        .await;
        assert!(session.is_ok());
    }

    #[tokio::test]
    async fn shutdown_deletes_sandbox() {
        let fake = Arc::new(FakeSandbox::new());
        let session = SandboxSession::start_with(fake.clone(), vec![], 1, Duration::from_millis(1))
            .await
            .unwrap();
        session.shutdown().await;
        assert!(fake.deleted.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn modal_is_reported_unsupported() {
        let config = Config::new(
            SandboxCredentials::Modal {
                token_id: "id".to_string(),
                token_secret: "secret".to_string(),
            },
            PathBuf::from("does-not-exist"),
        );
        let err = match create_backend(&config.sandbox).await {
            Ok(_) => panic!("modal should not produce a backend"),
            Err(e) => e,
        };
        assert_eq!(err.kind, SandboxErrorKind::Unsupported);
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }
}
