//! Generic HTTP request tool for calling APIs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Map, Value};
use url::Url;

use super::{required_str, Tool};

/// Make an HTTP request and report status, headers and body as JSON.
///
/// Non-2xx responses are returned (with `"success": false`), not raised, so
/// the agent can inspect API error bodies.
pub struct HttpRequest;

impl HttpRequest {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_url(raw: &str, params: &Value) -> anyhow::Result<Url> {
    let mut url = Url::parse(raw).map_err(|e| anyhow::anyhow!("Invalid URL '{}': {}", raw, e))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("Unsupported URL scheme '{}'", url.scheme());
    }
    if let Some(params) = params.as_object().filter(|p| !p.is_empty()) {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            match value {
                Value::String(s) => pairs.append_pair(key, s),
                other => pairs.append_pair(key, &other.to_string()),
            };
        }
    }
    Ok(url)
}

#[async_trait]
impl Tool for HttpRequest {
    fn name(&self) -> &str {
        "http_request"
    }

    fn description(&self) -> &str {
        "Make an HTTP request to an API or web service. Supports any method, custom headers, query parameters and a JSON or text body. Returns the status code, response headers and body."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Target URL (http or https)"
                },
                "method": {
                    "type": "string",
                    "description": "HTTP method (default: GET)"
                },
                "headers": {
                    "type": "object",
                    "description": "Request headers"
                },
                "data": {
                    "description": "Request body: an object is sent as JSON, a string as-is"
                },
                "params": {
                    "type": "object",
                    "description": "Query parameters"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in seconds (default: 30)"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let url = parse_url(required_str(&args, "url")?, &args["params"])?;
        let method_name = args["method"].as_str().unwrap_or("GET").to_uppercase();
        let method = Method::from_bytes(method_name.as_bytes())
            .map_err(|_| anyhow::anyhow!("Invalid HTTP method '{}'", method_name))?;
        let timeout = args["timeout"].as_u64().unwrap_or(30);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()?;

        let mut request = client.request(method.clone(), url.clone());
        if let Some(headers) = args["headers"].as_object() {
            for (name, value) in headers {
                let value = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
                request = request.header(name.as_str(), value);
            }
        }
        request = match &args["data"] {
            Value::Null => request,
            Value::String(text) => request.body(text.clone()),
            other => request.json(other),
        };

        tracing::debug!("http_request: {} {}", method, url);
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                let kind = if e.is_timeout() { "timed out" } else { "failed" };
                return Ok(json!({
                    "success": false,
                    "status_code": 0,
                    "headers": {},
                    "content": format!("Request {}: {}", kind, e),
                    "url": url.as_str(),
                })
                .to_string());
            }
        };

        let status = response.status();
        let final_url = response.url().to_string();
        let headers: Map<String, Value> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.to_string(), Value::String(v.to_str().ok()?.to_string()))))
            .collect();
        let text = response.text().await?;
        let content = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        Ok(serde_json::to_string_pretty(&json!({
            "success": status.is_success(),
            "status_code": status.as_u16(),
            "headers": headers,
            "content": content,
            "url": final_url,
        }))?)
    }
}
