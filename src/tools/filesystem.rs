//! File tools over the agent's composite filesystem.
//!
//! Paths are absolute. `/memories/...` goes to the preference store, every
//! other path into the sandbox.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{required_str, Tool};
use crate::backend::SharedFilesystem;

/// Maximum lines returned by a single `read_file` call.
const DEFAULT_READ_LIMIT: usize = 2000;

fn require_absolute(path: &str) -> anyhow::Result<()> {
    if !path.starts_with('/') {
        anyhow::bail!("Path must be absolute, got '{}'", path);
    }
    Ok(())
}

/// List the entries of a directory.
pub struct ListFiles {
    fs: SharedFilesystem,
}

impl ListFiles {
    pub fn new(fs: SharedFilesystem) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for ListFiles {
    fn name(&self) -> &str {
        "ls"
    }

    fn description(&self) -> &str {
        "List files and directories at an absolute path. Directories end with '/'."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute directory path (default: /)"
                }
            }
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let path = args["path"].as_str().unwrap_or("/");
        require_absolute(path)?;
        let entries = self.fs.ls(path).await?;
        if entries.is_empty() {
            return Ok(format!("{} is empty", path));
        }
        Ok(entries.join("\n"))
    }
}

/// Read a file with line numbers.
pub struct ReadFile {
    fs: SharedFilesystem,
}

impl ReadFile {
    pub fn new(fs: SharedFilesystem) -> Self {
        Self { fs }
    }
}

/// Number lines `cat -n` style, starting at `offset` (0-based).
fn number_lines(content: &str, offset: usize, limit: usize) -> String {
    content
        .lines()
        .enumerate()
        .skip(offset)
        .take(limit)
        .map(|(i, line)| format!("{:6}\t{}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Tool for ReadFile {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a file. Output is numbered by line. Use offset and limit to page through long files."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Absolute path of the file"
                },
                "offset": {
                    "type": "integer",
                    "description": "Line to start from, 0-based (default: 0)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines (default: 2000)"
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let path = required_str(&args, "file_path")?;
        require_absolute(path)?;
        let offset = args["offset"].as_u64().unwrap_or(0) as usize;
        let limit = args["limit"].as_u64().unwrap_or(DEFAULT_READ_LIMIT as u64) as usize;

        let content = self.fs.read(path).await?;
        if content.is_empty() {
            return Ok("(file is empty)".to_string());
        }
        let total = content.lines().count();
        if offset >= total {
            anyhow::bail!("Offset {} exceeds file length ({} lines)", offset, total);
        }
        Ok(number_lines(&content, offset, limit))
    }
}

/// Create or overwrite a file.
pub struct WriteFile {
    fs: SharedFilesystem,
}

impl WriteFile {
    pub fn new(fs: SharedFilesystem) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for WriteFile {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating parent directories as needed. Overwrites an existing file."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Absolute path of the file"
                },
                "content": {
                    "type": "string",
                    "description": "Full file content"
                }
            },
            "required": ["file_path", "content"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let path = required_str(&args, "file_path")?;
        let content = required_str(&args, "content")?;
        require_absolute(path)?;

        self.fs.write(path, content).await?;
        Ok(format!("Wrote {} bytes to {}", content.len(), path))
    }
}

/// Exact string replacement within a file.
pub struct EditFile {
    fs: SharedFilesystem,
}

impl EditFile {
    pub fn new(fs: SharedFilesystem) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for EditFile {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace an exact string in a file. old_string must be unique in the file unless replace_all is true."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Absolute path of the file"
                },
                "old_string": {
                    "type": "string",
                    "description": "Text to replace"
                },
                "new_string": {
                    "type": "string",
                    "description": "Replacement text"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace every occurrence (default: false)"
                }
            },
            "required": ["file_path", "old_string", "new_string"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let path = required_str(&args, "file_path")?;
        let old = required_str(&args, "old_string")?;
        let new = required_str(&args, "new_string")?;
        let replace_all = args["replace_all"].as_bool().unwrap_or(false);
        require_absolute(path)?;

        let count = self.fs.edit(path, old, new, replace_all).await?;
        Ok(format!("Replaced {} occurrence(s) in {}", count, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CompositeBackend, SandboxFilesystem, StoreFilesystem, MEMORIES_ROUTE};
    use crate::memory::{AssistantId, InMemoryPreferenceStore};
    use crate::sandbox::testing::FakeSandbox;
    use std::sync::Arc;

    fn filesystem() -> SharedFilesystem {
        let store = Arc::new(InMemoryPreferenceStore::new());
        let memories = StoreFilesystem::new(store, AssistantId::new("asst").unwrap());
        Arc::new(
            CompositeBackend::new(Arc::new(SandboxFilesystem::new(Arc::new(FakeSandbox::new()))))
                .route(MEMORIES_ROUTE, Arc::new(memories)),
        )
    }

    #[test]
    fn numbers_lines_from_offset() {
        assert_eq!(number_lines("a\nb\nc", 1, 1), "     2\tb");
    }

    #[tokio::test]
    async fn write_read_edit_cycle() {
        let fs = filesystem();
        let write = WriteFile::new(fs.clone());
        let read = ReadFile::new(fs.clone());
        let edit = EditFile::new(fs.clone());

        let out = write
            .execute(json!({"file_path": "/memories/asst/agent.json", "content": "tabs\nwide"}))
            .await
            .unwrap();
        assert_eq!(out, "Wrote 9 bytes to /memories/asst/agent.json");

        edit.execute(json!({
            "file_path": "/memories/asst/agent.json",
            "old_string": "tabs",
            "new_string": "spaces"
        }))
        .await
        .unwrap();

        let out = read
            .execute(json!({"file_path": "/memories/asst/agent.json"}))
            .await
            .unwrap();
        assert_eq!(out, "     1\tspaces\n     2\twide");
    }

    #[tokio::test]
    async fn relative_paths_are_rejected() {
        let fs = filesystem();
        let err = ReadFile::new(fs)
            .execute(json!({"file_path": "notes.txt"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must be absolute"));
    }

    #[tokio::test]
    async fn ls_root_shows_memories() {
        let out = ListFiles::new(filesystem()).execute(json!({})).await.unwrap();
        assert_eq!(out, "memories/");
    }
}
