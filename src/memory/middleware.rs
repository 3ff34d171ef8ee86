//! Loads the assistant's long-term preferences into the system prompt.

use async_trait::async_trait;

use super::store::SharedPreferenceStore;
use super::types::{AssistantId, Namespace, PreferenceRecord, AGENT_MEMORY_KEY};
use crate::agents::middleware::AgentMiddleware;
use crate::agents::{AgentState, ModelRequest};
use crate::backend::MEMORIES_ROUTE;

const LONGTERM_MEMORY_SYSTEM_PROMPT: &str = r#"## Long-term Memory

Your long-term memory is stored in files on the filesystem and persists across sessions.

**User Memory Location**: `{agent_dir_absolute}`

**When to CHECK/READ memories (CRITICAL - do this FIRST):**
- **At the start of ANY new session**: Check memories
  - `ls {agent_dir_absolute}`
- **BEFORE answering questions**: If asked "what do you know about X?" or "how do I do Y?", check user memories FIRST
- **When user asks you to do something**: Check if you have specific guides or examples
- **When user references past work**: Search memory files for related context

**Memory-first response pattern:**
1. User asks a question → Check user memory directory first: `ls {agent_dir_absolute}`
2. If relevant files exist → Read them with `read_file '{agent_dir_absolute}/[filename]'`
3. Base your answer on saved knowledge supplemented by general knowledge

**When to update memories:**
- **IMMEDIATELY when the user describes your role or how you should behave**
- **IMMEDIATELY when the user gives feedback on your work** - Update memories to capture what was wrong and how to do it better
- When the user explicitly asks you to remember something
- When patterns or preferences emerge (coding styles, conventions, workflows)
- After significant work where context would help in future sessions

**Learning from feedback:**
- When user says something is better/worse, capture WHY and encode it as a pattern
- Each correction is a chance to improve permanently - don't just fix the immediate issue, update your instructions
- When user says "you should remember X" or "be careful about Y", treat this as HIGH PRIORITY - update memories IMMEDIATELY
- Look for the underlying principle behind corrections, not just the specific mistake

## Deciding to Store Memory

When writing or updating agent memory, decide whether each fact, configuration, or behavior belongs in:

### User Agent File: `{agent_dir_absolute}/agent.json`
→ Describes the agent's **personality, style, and universal behavior** across all projects.

**Store here:**
- Your general tone and communication style
- Universal coding preferences (formatting, comment style, etc.)
- General workflows and methodologies you follow
- Tool usage patterns that apply everywhere
- Personal preferences that don't change per-project

**Examples:**
- "Be concise and direct in responses"
- "Always use type hints in Python"
- "Prefer functional programming patterns"

DO NOT store task-specific information unless you are confident it will be helpful across tasks.

### File Operations:

**User memory:**
```
ls {agent_dir_absolute}                                # List user memory files
write_file '{agent_dir_absolute}/agent.json'           # Create user preference files if it does not yet exist
read_file '{agent_dir_absolute}/agent.json'            # Read user preferences
edit_file '{agent_dir_absolute}/agent.json' ...        # Update user preferences
```
"#;

const NO_USER_MEMORY: &str = "(No user agent.md)";

/// Render a stored preference document for the prompt.
///
/// File-shaped records show their text; anything else is shown as JSON.
fn render_record(record: &PreferenceRecord) -> String {
    match record.file_content() {
        Some(text) => text.to_string(),
        None => record.value.to_string(),
    }
}

/// Middleware for agent-specific long-term memory.
///
/// `agent.json` is loaded once per session and kept in state; every model
/// call then sees the user memory ahead of the base prompt and the memory
/// usage instructions after it.
pub struct MemoryMiddleware {
    store: SharedPreferenceStore,
    namespace: Namespace,
    agent_dir_absolute: String,
}

impl MemoryMiddleware {
    pub fn new(store: SharedPreferenceStore, assistant_id: &AssistantId) -> Self {
        Self {
            store,
            namespace: Namespace::for_assistant(assistant_id),
            agent_dir_absolute: format!("{}{}", MEMORIES_ROUTE, assistant_id),
        }
    }

    pub fn agent_dir(&self) -> &str {
        &self.agent_dir_absolute
    }

    fn build_system_prompt(&self, state: &AgentState, base: Option<&str>) -> String {
        let user_memory = state
            .user_memory
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(NO_USER_MEMORY);

        let mut prompt = format!("<user_memory>\n{}\n</user_memory>\n", user_memory);
        if let Some(base) = base.filter(|b| !b.is_empty()) {
            prompt.push_str("\n\n");
            prompt.push_str(base);
        }
        prompt.push_str("\n\n");
        prompt.push_str(
            &LONGTERM_MEMORY_SYSTEM_PROMPT.replace("{agent_dir_absolute}", &self.agent_dir_absolute),
        );
        prompt
    }
}

#[async_trait]
impl AgentMiddleware for MemoryMiddleware {
    fn name(&self) -> &str {
        "memory"
    }

    async fn before_agent(&self, state: &mut AgentState) -> anyhow::Result<()> {
        if state.user_memory.is_some() {
            return Ok(());
        }
        let record = self.store.get(&self.namespace, AGENT_MEMORY_KEY).await?;
        tracing::debug!(
            "Loaded user memory for {} (present: {})",
            self.namespace,
            record.is_some()
        );
        state.user_memory = Some(record.as_ref().map(render_record).unwrap_or_default());
        Ok(())
    }

    fn wrap_model_request(&self, state: &AgentState, request: ModelRequest) -> ModelRequest {
        let prompt = self.build_system_prompt(state, request.system_prompt.as_deref());
        request.with_system_prompt(prompt)
    }
}
