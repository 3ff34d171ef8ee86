//! Types for the memory subsystem.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Namespace root for user preferences.
pub const MEMORIES_ROOT: &str = "memories";

/// Key of the preference document loaded at session start.
pub const AGENT_MEMORY_KEY: &str = "agent.json";

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Invalid assistant id '{0}': {1}")]
    InvalidAssistantId(String, &'static str),

    #[error("Path {0} is outside this assistant's memory")]
    OutsideNamespace(String),

    #[error("Failed to persist memory store: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize memory store: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Identity of a deployed assistant. Preferences are partitioned by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssistantId(String);

impl AssistantId {
    /// Validate and wrap an assistant id.
    ///
    /// Ids are trimmed; empty ids and ids containing `/` or control characters
    /// are rejected since they become path segments under `/memories/`.
    pub fn new(id: impl AsRef<str>) -> Result<Self, MemoryError> {
        let raw = id.as_ref();
        let id = raw.trim();
        if id.is_empty() {
            return Err(MemoryError::InvalidAssistantId(raw.to_string(), "empty"));
        }
        if id.contains('/') {
            return Err(MemoryError::InvalidAssistantId(
                raw.to_string(),
                "contains '/'",
            ));
        }
        if id.chars().any(char::is_control) {
            return Err(MemoryError::InvalidAssistantId(
                raw.to_string(),
                "contains control characters",
            ));
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AssistantId {
    type Error = MemoryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AssistantId> for String {
    fn from(id: AssistantId) -> Self {
        id.0
    }
}

impl fmt::Display for AssistantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hierarchical key prefix in the store, e.g. `("memories", "<assistant id>")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace(Vec<String>);

impl Namespace {
    /// The preference namespace of one assistant.
    pub fn for_assistant(id: &AssistantId) -> Self {
        Self(vec![MEMORIES_ROOT.to_string(), id.as_str().to_string()])
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// A stored preference document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceRecord {
    pub namespace: Namespace,
    pub key: String,
    pub value: serde_json::Value,
    pub created_at: String,
    pub updated_at: String,
}

impl PreferenceRecord {
    pub fn new(namespace: Namespace, key: &str, value: serde_json::Value) -> Self {
        let now = now_string();
        Self {
            namespace,
            key: key.to_string(),
            value,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Text content if the record holds a file written by the agent.
    pub fn file_content(&self) -> Option<&str> {
        self.value.get("content").and_then(|v| v.as_str())
    }
}

/// Current timestamp as RFC3339 string.
pub fn now_string() -> String {
    Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_id_validation() {
        assert_eq!(AssistantId::new("  asst-1 ").unwrap().as_str(), "asst-1");
        assert!(AssistantId::new("").is_err());
        assert!(AssistantId::new("   ").is_err());
        assert!(AssistantId::new("a/b").is_err());
        assert!(AssistantId::new("a\nb").is_err());
    }

    #[test]
    fn assistant_id_deserialization_validates() {
        let ok: AssistantId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(ok.as_str(), "abc");
        assert!(serde_json::from_str::<AssistantId>("\"a/b\"").is_err());
    }

    #[test]
    fn namespace_is_per_assistant() {
        let a = Namespace::for_assistant(&AssistantId::new("a").unwrap());
        let b = Namespace::for_assistant(&AssistantId::new("b").unwrap());
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "memories/a");
        assert_eq!(a.parts(), &["memories".to_string(), "a".to_string()]);
    }
}
