//! The runnable agent definition.
//!
//! This crate does not run the model loop. It assembles everything the agent
//! runtime needs: model, base prompt, middleware chain, tools, the composite
//! filesystem and the step limit. [`AgentBundle`] additionally owns the
//! sandbox session those tools run against.
//!
//! # Prompt composition
//! Middleware runs as `[memory, skills]`, so every model call sees:
//! user memory, base prompt, long-term memory instructions, then skills.

pub mod middleware;
mod prompt;
mod types;

pub use middleware::{apply_chain, run_before_agent, AgentMiddleware};
pub use prompt::base_system_prompt;
pub use types::{AgentState, ModelRequest};

use std::sync::Arc;

use crate::backend::{CompositeBackend, SandboxFilesystem, StoreFilesystem, MEMORIES_ROUTE};
use crate::config::{Config, ModelSpec};
use crate::memory::{AssistantId, MemoryMiddleware, SharedPreferenceStore};
use crate::sandbox::{SandboxBackend, SandboxSession};
use crate::skills::SkillsMiddleware;
use crate::tools::ToolRegistry;

/// Middleware chain for an assistant, memory first.
pub fn build_middleware(
    config: &Config,
    assistant_id: &AssistantId,
    store: SharedPreferenceStore,
) -> Vec<Box<dyn AgentMiddleware>> {
    vec![
        Box::new(MemoryMiddleware::new(store, assistant_id)),
        Box::new(SkillsMiddleware::new(
            config.skills.dir.clone(),
            config.skills.max_file_size,
            config.sandbox.skills_path(),
        )),
    ]
}

/// Everything the agent runtime needs to run one assistant.
pub struct AgentDefinition {
    pub assistant_id: AssistantId,
    pub model: ModelSpec,
    /// Base prompt; middleware adds memory and skills per call.
    pub system_prompt: String,
    pub middleware: Vec<Box<dyn AgentMiddleware>>,
    pub tools: ToolRegistry,
    pub backend: Arc<CompositeBackend>,
    pub recursion_limit: u32,
}

impl AgentDefinition {
    /// Assemble a definition around an already-running sandbox.
    pub fn build(
        config: &Config,
        assistant_id: AssistantId,
        store: SharedPreferenceStore,
        sandbox: Arc<dyn SandboxBackend>,
    ) -> Self {
        let memories = StoreFilesystem::new(Arc::clone(&store), assistant_id.clone());
        let backend = Arc::new(
            CompositeBackend::new(Arc::new(SandboxFilesystem::new(Arc::clone(&sandbox))))
                .route(MEMORIES_ROUTE, Arc::new(memories)),
        );
        let tools = ToolRegistry::for_agent(&config.tavily_api_key, backend.clone(), sandbox);

        Self {
            middleware: build_middleware(config, &assistant_id, store),
            assistant_id,
            model: config.model.clone(),
            system_prompt: base_system_prompt(&config.sandbox.base_path),
            tools,
            backend,
            recursion_limit: config.recursion_limit,
        }
    }

    /// Run every middleware `before_agent` hook.
    pub async fn prepare(&self, state: &mut AgentState) -> anyhow::Result<()> {
        run_before_agent(&self.middleware, state).await
    }

    /// The system prompt for the next model call.
    pub fn system_prompt(&self, state: &AgentState) -> String {
        compose(&self.middleware, &self.system_prompt, state)
    }
}

fn compose(middleware: &[Box<dyn AgentMiddleware>], base: &str, state: &AgentState) -> String {
    apply_chain(middleware, state, ModelRequest::new(base))
        .system_prompt
        .unwrap_or_default()
}

/// Compose the full system prompt without starting a sandbox.
pub async fn preview_system_prompt(
    config: &Config,
    assistant_id: &AssistantId,
    store: SharedPreferenceStore,
) -> anyhow::Result<String> {
    let middleware = build_middleware(config, assistant_id, store);
    let mut state = AgentState::new();
    run_before_agent(&middleware, &mut state).await?;
    Ok(compose(
        &middleware,
        &base_system_prompt(&config.sandbox.base_path),
        &state,
    ))
}

/// A definition together with the sandbox it runs in.
pub struct AgentBundle {
    definition: AgentDefinition,
    session: SandboxSession,
}

impl AgentBundle {
    /// Start a sandbox (skills uploaded) and build the agent around it.
    pub async fn start(
        config: &Config,
        assistant_id: AssistantId,
        store: SharedPreferenceStore,
    ) -> anyhow::Result<Self> {
        let session = SandboxSession::start(config).await?;
        tracing::info!(
            "Agent for {} ready in sandbox {} (model {})",
            assistant_id,
            session.id(),
            config.model
        );
        let definition = AgentDefinition::build(config, assistant_id, store, session.backend());
        Ok(Self {
            definition,
            session,
        })
    }

    pub fn definition(&self) -> &AgentDefinition {
        &self.definition
    }

    pub fn sandbox(&self) -> Arc<dyn SandboxBackend> {
        self.session.backend()
    }

    /// Tear down the sandbox session.
    pub async fn shutdown(self) {
        self.session.shutdown().await;
    }
}
