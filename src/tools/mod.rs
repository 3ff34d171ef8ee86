//! Tool system for the agent.
//!
//! Tools are the agent's way to act: the web tools reach out to the internet,
//! the filesystem tools work through the [`CompositeBackend`](crate::backend::CompositeBackend)
//! (so `/memories/` paths land in the preference store) and `execute` runs
//! shell commands inside the sandbox.

mod filesystem;
mod http;
mod shell;
mod web;

pub use filesystem::{EditFile, ListFiles, ReadFile, WriteFile};
pub use http::HttpRequest;
pub use shell::Execute;
pub use web::{FetchUrl, WebSearch};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::SharedFilesystem;
use crate::sandbox::SandboxBackend;

/// Tool definition in the function-calling format model providers accept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

/// Function definition with schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Information about a tool for display purposes.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Trait for implementing tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does.
    fn description(&self) -> &str;

    /// JSON schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value) -> anyhow::Result<String>;
}

/// Pull a required string argument out of tool args.
pub(crate) fn required_str<'a>(args: &'a Value, name: &str) -> anyhow::Result<&'a str> {
    args[name]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("Missing '{}' argument", name))
}

/// Registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry (no built-in tools).
    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// The agent's tool set: web access plus file and shell access through
    /// the given backend and sandbox.
    pub fn for_agent(
        tavily_api_key: &str,
        filesystem: SharedFilesystem,
        sandbox: Arc<dyn SandboxBackend>,
    ) -> Self {
        let mut registry = Self::empty();

        // Web
        registry.register(Arc::new(HttpRequest::new()));
        registry.register(Arc::new(FetchUrl::new()));
        registry.register(Arc::new(WebSearch::new(tavily_api_key)));

        // Files
        registry.register(Arc::new(ListFiles::new(Arc::clone(&filesystem))));
        registry.register(Arc::new(ReadFile::new(Arc::clone(&filesystem))));
        registry.register(Arc::new(WriteFile::new(Arc::clone(&filesystem))));
        registry.register(Arc::new(EditFile::new(filesystem)));

        // Shell
        registry.register(Arc::new(Execute::new(sandbox)));

        tracing::debug!("Tool registry complete with {} tools", registry.tools.len());
        registry
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// List all available tools, sorted by name.
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        let mut tools: Vec<ToolInfo> = self
            .tools
            .values()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Check if a tool exists by name.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get tool schemas in LLM-compatible format.
    pub fn get_tool_schemas(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition {
                tool_type: "function".to_string(),
                function: FunctionDefinition {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.parameters_schema(),
                },
            })
            .collect()
    }

    /// Execute a tool by name.
    pub async fn execute(&self, name: &str, args: Value) -> anyhow::Result<String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", name))?;

        tool.execute(args).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SandboxFilesystem;
    use crate::sandbox::testing::FakeSandbox;
    use serde_json::json;

    fn registry() -> ToolRegistry {
        let fake = Arc::new(FakeSandbox::new());
        ToolRegistry::for_agent(
            "tvly-test",
            Arc::new(SandboxFilesystem::new(fake.clone())),
            fake,
        )
    }

    #[test]
    fn agent_tool_set() {
        let names: Vec<String> = registry().list_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "edit_file",
                "execute",
                "fetch_url",
                "http_request",
                "ls",
                "read_file",
                "web_search",
                "write_file"
            ]
        );
    }

    #[test]
    fn schemas_are_function_objects() {
        for def in registry().get_tool_schemas() {
            assert_eq!(def.tool_type, "function");
            assert_eq!(def.function.parameters["type"], "object");
        }
    }

    #[tokio::test]
    async fn unknown_tool_errors() {
        let err = registry().execute("rm_rf", json!({})).await.unwrap_err();
        assert!(err.to_string().contains("Unknown tool: rm_rf"));
    }
}
