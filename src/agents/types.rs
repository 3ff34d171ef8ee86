//! Core types shared by the agent definition and its middleware.

use serde::{Deserialize, Serialize};

use crate::skills::SkillMetadata;

/// Per-session state that middleware hooks populate before the agent runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentState {
    /// Skills discovered at the start of the interaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills_metadata: Option<Vec<SkillMetadata>>,

    /// Serialized user preferences loaded from the memory store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_memory: Option<String>,
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// The request a middleware sees when the runtime is about to call the model.
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    pub system_prompt: Option<String>,
}

impl ModelRequest {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let prompt = system_prompt.into();
        Self {
            system_prompt: if prompt.is_empty() { None } else { Some(prompt) },
        }
    }

    /// Copy of this request with the system prompt replaced.
    pub fn with_system_prompt(&self, system_prompt: String) -> Self {
        Self {
            system_prompt: Some(system_prompt),
        }
    }
}
