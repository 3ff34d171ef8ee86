//! Middleware hooks around the externally-run agent loop.
//!
//! The runtime calls `before_agent` once per interaction and routes every
//! model call through `wrap_model_request`. Middleware is applied in list
//! order: the first entry sees the runtime's request and hands its result to
//! the next one.

use async_trait::async_trait;

use super::types::{AgentState, ModelRequest};

#[async_trait]
pub trait AgentMiddleware: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Populate state before the agent starts. Default: no-op.
    async fn before_agent(&self, _state: &mut AgentState) -> anyhow::Result<()> {
        Ok(())
    }

    /// Rewrite the request for a single model call.
    fn wrap_model_request(&self, state: &AgentState, request: ModelRequest) -> ModelRequest;
}

/// Run every `before_agent` hook in order.
pub async fn run_before_agent(
    middleware: &[Box<dyn AgentMiddleware>],
    state: &mut AgentState,
) -> anyhow::Result<()> {
    for mw in middleware {
        tracing::debug!("Running before_agent for {}", mw.name());
        mw.before_agent(state).await?;
    }
    Ok(())
}

/// Pass a request through the middleware chain.
pub fn apply_chain(
    middleware: &[Box<dyn AgentMiddleware>],
    state: &AgentState,
    request: ModelRequest,
) -> ModelRequest {
    middleware
        .iter()
        .fold(request, |req, mw| mw.wrap_model_request(state, req))
}

/// Join an addition onto an optional existing prompt with a blank line.
pub(crate) fn append_section(existing: Option<&str>, section: &str) -> String {
    match existing {
        Some(prompt) if !prompt.is_empty() => format!("{}\n\n{}", prompt, section),
        _ => section.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tag(&'static str);

    #[async_trait]
    impl AgentMiddleware for Tag {
        fn name(&self) -> &str {
            self.0
        }

        fn wrap_model_request(&self, _state: &AgentState, request: ModelRequest) -> ModelRequest {
            let prompt = append_section(request.system_prompt.as_deref(), self.0);
            request.with_system_prompt(prompt)
        }
    }

    #[test]
    fn chain_applies_in_order() {
        let chain: Vec<Box<dyn AgentMiddleware>> =
            vec![Box::new(Tag("first")), Box::new(Tag("second"))];
        let out = apply_chain(&chain, &AgentState::new(), ModelRequest::new("base"));
        assert_eq!(out.system_prompt.as_deref(), Some("base\n\nfirst\n\nsecond"));
    }

    #[test]
    fn append_to_empty_prompt() {
        assert_eq!(append_section(None, "x"), "x");
        assert_eq!(append_section(Some(""), "x"), "x");
    }
}
