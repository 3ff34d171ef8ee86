//! Runloop devbox client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::daytona::check;
use super::{
    ExecuteResponse, FileDownloadResponse, FileUpload, FileUploadResponse, SandboxBackend,
    SandboxError,
};
use crate::config::SandboxProvider;

#[derive(Debug, Deserialize)]
struct Devbox {
    id: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExecuteSyncRequest<'a> {
    command: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExecutionResult {
    #[serde(default)]
    exit_status: Option<i32>,
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
}

#[derive(Debug, Serialize)]
struct DownloadRequest<'a> {
    path: &'a str,
}

pub struct RunloopSandbox {
    client: Client,
    api_url: String,
    api_key: String,
    id: String,
}

impl RunloopSandbox {
    /// Create a new devbox.
    pub async fn create(api_url: &str, api_key: &str) -> Result<Self, SandboxError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        let api_url = api_url.trim_end_matches('/').to_string();

        let response = client
            .post(format!("{}/v1/devboxes", api_url))
            .bearer_auth(api_key)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let devbox: Devbox = check(response).await?.json().await?;
        tracing::info!(
            "Created Runloop devbox {} (status: {})",
            devbox.id,
            devbox.status.as_deref().unwrap_or("unknown")
        );

        Ok(Self {
            client,
            api_url,
            api_key: api_key.to_string(),
            id: devbox.id,
        })
    }

    fn devbox_url(&self, action: &str) -> String {
        format!("{}/v1/devboxes/{}/{}", self.api_url, self.id, action)
    }

    async fn upload_one(&self, file: FileUpload) -> Result<(), SandboxError> {
        let form = reqwest::multipart::Form::new()
            .text("path", file.destination.clone())
            .part("file", reqwest::multipart::Part::bytes(file.content));
        let response = self
            .client
            .post(self.devbox_url("upload_file"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn download_one(&self, path: &str) -> Result<Vec<u8>, SandboxError> {
        let response = self
            .client
            .post(self.devbox_url("download_file"))
            .bearer_auth(&self.api_key)
            .json(&DownloadRequest { path })
            .send()
            .await?;
        Ok(check(response).await?.bytes().await?.to_vec())
    }
}

#[async_trait]
impl SandboxBackend for RunloopSandbox {
    fn id(&self) -> &str {
        &self.id
    }

    fn provider(&self) -> SandboxProvider {
        SandboxProvider::Runloop
    }

    async fn execute(
        &self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<ExecuteResponse, SandboxError> {
        tracing::debug!("Runloop {} exec: {}", self.id, command);
        let mut request = self
            .client
            .post(self.devbox_url("execute_sync"))
            .bearer_auth(&self.api_key)
            .json(&ExecuteSyncRequest { command });
        if let Some(t) = timeout {
            request = request.timeout(t);
        }
        let result: ExecutionResult = check(request.send().await?).await?.json().await?;

        let mut output = result.stdout;
        if !result.stderr.is_empty() {
            if !output.is_empty() && !output.ends_with('\n') {
                output.push('\n');
            }
            output.push_str(&result.stderr);
        }
        Ok(ExecuteResponse {
            output,
            exit_code: result.exit_status.unwrap_or(-1),
            truncated: false,
        })
    }

    async fn upload_files(&self, files: Vec<FileUpload>) -> Vec<FileUploadResponse> {
        let mut responses = Vec::with_capacity(files.len());
        for file in files {
            let path = file.destination.clone();
            let error = self.upload_one(file).await.err().map(|e| e.to_string());
            responses.push(FileUploadResponse { path, error });
        }
        responses
    }

    async fn download_files(&self, paths: &[String]) -> Vec<FileDownloadResponse> {
        let mut responses = Vec::with_capacity(paths.len());
        for path in paths {
            let (content, error) = match self.download_one(path).await {
                Ok(bytes) => (Some(bytes), None),
                Err(e) => (None, Some(e.to_string())),
            };
            responses.push(FileDownloadResponse {
                path: path.clone(),
                content,
                error,
            });
        }
        responses
    }

    async fn delete(&self) -> Result<(), SandboxError> {
        let response = self
            .client
            .post(self.devbox_url("shutdown"))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}
