//! Web access tools: search and fetch URLs.
//!
//! Web search uses the Tavily API with the key from configuration.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{required_str, Tool};

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; code-assistant/0.1)";

/// Search the web using the Tavily API.
pub struct WebSearch {
    api_key: String,
    endpoint: String,
}

impl WebSearch {
    pub fn new(api_key: &str) -> Self {
        Self::with_endpoint(api_key, TAVILY_SEARCH_URL)
    }

    pub fn with_endpoint(api_key: &str, endpoint: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            endpoint: endpoint.to_string(),
        }
    }
}

/// Tavily API request body.
#[derive(Debug, Serialize)]
struct TavilySearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u32,
    topic: &'a str,
    include_answer: bool,
    include_raw_content: bool,
}

/// Tavily API response.
#[derive(Debug, Deserialize)]
struct TavilySearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyResult>,
}

/// A single result from Tavily.
#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    content: String,
}

#[async_trait]
impl Tool for WebSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for real-time information. Returns search results with titles, snippets and URLs. Use for finding documentation, current events, examples, or any information you need."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default: 5, max: 10)"
                },
                "topic": {
                    "type": "string",
                    "enum": ["general", "news", "finance"],
                    "description": "Search topic (default: general)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let query = required_str(&args, "query")?;
        let max_results = args["max_results"].as_u64().unwrap_or(5).clamp(1, 10) as u32;
        let topic = args["topic"].as_str().unwrap_or("general");

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let request = TavilySearchRequest {
            api_key: &self.api_key,
            query,
            max_results,
            topic,
            include_answer: true,
            include_raw_content: false,
        };

        tracing::debug!("web_search: {}", query);
        let response = client.post(&self.endpoint).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Tavily API error ({}): {}", status, error_text);
        }

        let tavily_response: TavilySearchResponse = response.json().await?;
        Ok(format_search_results(query, tavily_response))
    }
}

fn format_search_results(query: &str, response: TavilySearchResponse) -> String {
    if response.results.is_empty() {
        return format!("No results found for: {}", query);
    }

    let mut output = String::new();

    if let Some(answer) = response.answer.filter(|a| !a.is_empty()) {
        output.push_str("## Quick Answer\n\n");
        output.push_str(&answer);
        output.push_str("\n\n---\n\n## Sources\n\n");
    }

    for (i, result) in response.results.iter().enumerate() {
        output.push_str(&format!(
            "### {}. {}\n**URL:** {}\n\n{}\n\n",
            i + 1,
            result.title,
            result.url,
            result.content
        ));
    }

    output
}

/// Fetch content from a URL.
///
/// HTML is reduced to its text. Responses over [`MAX_INLINE_SIZE`] are saved
/// to a temp file and only a preview is returned.
pub struct FetchUrl {
    spill_dir: PathBuf,
}

const MAX_INLINE_SIZE: usize = 20_000;
const PREVIEW_CHARS: usize = 2_000;

impl FetchUrl {
    pub fn new() -> Self {
        Self {
            spill_dir: std::env::temp_dir(),
        }
    }

    pub fn with_spill_dir(dir: PathBuf) -> Self {
        Self { spill_dir: dir }
    }
}

impl Default for FetchUrl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FetchUrl {
    fn name(&self) -> &str {
        "fetch_url"
    }

    fn description(&self) -> &str {
        "Fetch the content of a URL. HTML pages are converted to plain text. Small responses are returned directly; large ones are saved to a local file and a preview is returned. Useful for reading documentation or downloading data."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Request timeout in seconds (default: 30)"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let url = required_str(&args, "url")?;
        let timeout = args["timeout"].as_u64().unwrap_or(30);

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout))
            .build()?;

        let response = client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            anyhow::bail!("HTTP error: {}", status);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_default();

        let body = response.text().await?;

        let display_content = if content_type.contains("text/html") {
            extract_text_from_html(&body)
        } else {
            body.clone()
        };

        if body.len() <= MAX_INLINE_SIZE {
            return Ok(display_content);
        }

        let file_path = self.spill_dir.join(format!(
            "fetch_{}.{}",
            uuid::Uuid::new_v4(),
            extension_for(&content_type)
        ));
        tokio::fs::write(&file_path, &body).await?;

        let preview: String = display_content.chars().take(PREVIEW_CHARS).collect();
        let more = if display_content.chars().count() > PREVIEW_CHARS {
            "\n..."
        } else {
            ""
        };
        Ok(format!(
            "Response too large ({} bytes). Full content saved to: {}\n\nPreview:\n{}{}",
            body.len(),
            file_path.display(),
            preview,
            more
        ))
    }
}

fn extension_for(content_type: &str) -> &'static str {
    if content_type.contains("application/json") {
        "json"
    } else if content_type.contains("text/html") {
        "html"
    } else if content_type.contains("text/csv") {
        "csv"
    } else if content_type.contains("xml") {
        "xml"
    } else {
        "txt"
    }
}

/// Basic HTML entity decoding.
fn html_decode(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Remove `<tag ...>...</tag>` blocks.
fn strip_blocks(html: &str, tag: &str) -> String {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let mut text = html.to_string();
    while let Some(start) = text.find(&open) {
        match text[start..].find(&close) {
            Some(end) => text.replace_range(start..start + end + close.len(), ""),
            None => break,
        }
    }
    text
}

/// Extract readable text from HTML.
fn extract_text_from_html(html: &str) -> String {
    let text = strip_blocks(&strip_blocks(html, "script"), "style");

    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                result.push(' ');
            }
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }

    let result = result.split_whitespace().collect::<Vec<_>>().join(" ");
    html_decode(&result)
}
