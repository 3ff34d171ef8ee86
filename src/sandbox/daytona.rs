//! Daytona sandbox client.
//!
//! Talks to the Daytona REST API: sandboxes are created and deleted through
//! `/sandbox`, commands and files go through the per-sandbox toolbox at
//! `/toolbox/{id}/toolbox/...`. Daytona combines stdout and stderr.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{
    ExecuteResponse, FileDownloadResponse, FileUpload, FileUploadResponse, SandboxBackend,
    SandboxError,
};
use crate::config::SandboxProvider;

#[derive(Debug, Serialize)]
struct CreateSandboxRequest {
    language: &'static str,
}

#[derive(Debug, Deserialize)]
struct SandboxInfo {
    id: String,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    command: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DaytonaExecuteResponse {
    exit_code: i32,
    #[serde(default)]
    result: String,
}

pub struct DaytonaSandbox {
    client: Client,
    api_url: String,
    api_key: String,
    id: String,
}

impl DaytonaSandbox {
    /// Create a new sandbox.
    pub async fn create(api_url: &str, api_key: &str) -> Result<Self, SandboxError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        let api_url = api_url.trim_end_matches('/').to_string();

        let response = client
            .post(format!("{}/sandbox", api_url))
            .bearer_auth(api_key)
            .json(&CreateSandboxRequest { language: "python" })
            .send()
            .await?;
        let info: SandboxInfo = check(response).await?.json().await?;
        tracing::info!(
            "Created Daytona sandbox {} (state: {})",
            info.id,
            info.state.as_deref().unwrap_or("unknown")
        );

        Ok(Self {
            client,
            api_url,
            api_key: api_key.to_string(),
            id: info.id,
        })
    }

    /// Attach to an existing sandbox by id.
    pub fn connect(api_url: &str, api_key: &str, id: &str) -> Result<Self, SandboxError> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()?,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            id: id.to_string(),
        })
    }

    fn toolbox_url(&self, path: &str) -> String {
        format!("{}/toolbox/{}/toolbox/{}", self.api_url, self.id, path)
    }

    async fn upload_one(&self, file: FileUpload) -> Result<(), SandboxError> {
        let part = reqwest::multipart::Part::bytes(file.content).file_name(
            file.destination
                .rsplit('/')
                .next()
                .unwrap_or("file")
                .to_string(),
        );
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self
            .client
            .post(self.toolbox_url("files/upload"))
            .bearer_auth(&self.api_key)
            .query(&[("path", file.destination.as_str())])
            .multipart(form)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn download_one(&self, path: &str) -> Result<Vec<u8>, SandboxError> {
        let response = self
            .client
            .get(self.toolbox_url("files/download"))
            .bearer_auth(&self.api_key)
            .query(&[("path", path)])
            .send()
            .await?;
        Ok(check(response).await?.bytes().await?.to_vec())
    }
}

/// Turn a non-success response into a classified error.
pub(super) async fn check(response: reqwest::Response) -> Result<reqwest::Response, SandboxError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SandboxError::from_status(status.as_u16(), &body))
}

#[async_trait]
impl SandboxBackend for DaytonaSandbox {
    fn id(&self) -> &str {
        &self.id
    }

    fn provider(&self) -> SandboxProvider {
        SandboxProvider::Daytona
    }

    async fn execute(
        &self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<ExecuteResponse, SandboxError> {
        tracing::debug!("Daytona {} exec: {}", self.id, command);
        let mut request = self
            .client
            .post(self.toolbox_url("process/execute"))
            .bearer_auth(&self.api_key)
            .json(&ExecuteRequest {
                command,
                timeout: timeout.map(|t| t.as_secs()),
            });
        if let Some(t) = timeout {
            // Leave headroom for the HTTP round trip on top of the command timeout.
            request = request.timeout(t.saturating_add(Duration::from_secs(10)));
        }
        let parsed: DaytonaExecuteResponse = check(request.send().await?).await?.json().await?;
        Ok(ExecuteResponse {
            output: parsed.result,
            exit_code: parsed.exit_code,
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
            responses.push(match self.download_one(path).await {
                Ok(content) => FileDownloadResponse {
                    path: path.clone(),
                    content: Some(content),
                    error: None,
                },
                Err(e) => FileDownloadResponse {
                    path: path.clone(),
                    content: None,
                    error: Some(e.to_string()),
                },
            });
        }
        responses
    }

    async fn delete(&self) -> Result<(), SandboxError> {
        let response = self
            .client
            .delete(format!("{}/sandbox/{}", self.api_url, self.id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}
