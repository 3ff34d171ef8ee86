//! Shell command execution inside the sandbox.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{required_str, Tool};
use crate::sandbox::SandboxBackend;

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const MAX_TIMEOUT_SECS: u64 = 3600;
const MAX_OUTPUT_CHARS: usize = 30_000;

/// Commands that would wreck the sandbox for the rest of the session.
const BLOCKED_PATTERNS: &[(&str, &str)] = &[
    ("rm -rf /", "This would destroy the sandbox filesystem"),
    ("rm -rf /*", "This would destroy the sandbox filesystem"),
    ("> /dev/", "Writing to device files is blocked"),
    ("dd if=/dev/", "Direct disk operations are blocked"),
    (":(){ :|:& };:", "Fork bombs are blocked"),
];

fn command_timeout(args: &Value) -> Duration {
    let secs = args["timeout_secs"]
        .as_u64()
        .unwrap_or(DEFAULT_TIMEOUT_SECS)
        .clamp(1, MAX_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

/// Returns Err with the reason when the command is blocked.
fn validate_command(cmd: &str) -> Result<(), String> {
    let cmd = cmd.trim();
    let cmd = ["sudo ", "time ", "nice ", "nohup "]
        .iter()
        .find_map(|prefix| cmd.strip_prefix(prefix))
        .unwrap_or(cmd);

    for (pattern, reason) in BLOCKED_PATTERNS {
        let exact_or_spaced = cmd == *pattern
            || cmd
                .strip_prefix(pattern)
                .map(|rest| rest.starts_with(' ') || rest.starts_with(';'))
                .unwrap_or(false);
        if exact_or_spaced {
            return Err(format!("Blocked command pattern '{}'. {}", pattern, reason));
        }
    }
    Ok(())
}

/// Drop control characters that confuse models, keeping newlines and tabs.
fn sanitize_output(text: &str) -> String {
    text.chars()
        .filter(|&c| c == '\n' || c == '\r' || c == '\t' || (c >= ' ' && c != '\u{FFFD}'))
        .collect()
}

/// Run a shell command in the sandbox.
pub struct Execute {
    sandbox: Arc<dyn SandboxBackend>,
}

impl Execute {
    pub fn new(sandbox: Arc<dyn SandboxBackend>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for Execute {
    fn name(&self) -> &str {
        "execute"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the sandbox. Use for running code, tests, builds and package installs. Returns combined output and the exit code."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Timeout in seconds (default: 120, max: 3600)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let command = required_str(&args, "command")?;
        if let Err(msg) = validate_command(command) {
            tracing::warn!("Blocked command: {}", command);
            anyhow::bail!(msg);
        }
        let timeout = command_timeout(&args);

        tracing::info!("Executing in sandbox {}: {}", self.sandbox.id(), command);
        let response = self.sandbox.execute(command, Some(timeout)).await?;
        tracing::debug!(
            "Command completed: exit={}, output_len={}",
            response.exit_code,
            response.output.len()
        );

        let mut output = sanitize_output(&response.output);
        let mut truncated = response.truncated;
        if output.chars().count() > MAX_OUTPUT_CHARS {
            output = output.chars().take(MAX_OUTPUT_CHARS).collect();
            truncated = true;
        }

        let mut result = output;
        if truncated {
            result.push_str("\n... [output truncated]");
        }
        result.push_str(&format!("\n[Command exited with code {}]", response.exit_code));
        Ok(result)
    }
}
