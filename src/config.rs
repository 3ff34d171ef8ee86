//! Configuration management for the coding assistant.
//!
//! Configuration is set via environment variables:
//! - `AGENT_MODEL` - Optional. `provider:model` spec. Defaults to `openai:gpt-5-mini`.
//! - `OPENAI_API_KEY` / `ANTHROPIC_API_KEY` / `GOOGLE_API_KEY` - Required. The key matching the model provider.
//! - `TAVILY_API_KEY` - Required. Web search key.
//! - `SANDBOX_PROVIDER` - Optional. `daytona` (default), `runloop` or `modal`.
//! - `DAYTONA_API_KEY` - Required when the provider is Daytona.
//! - `DAYTONA_API_URL` - Optional. Defaults to `https://app.daytona.io/api`.
//! - `RUNLOOP_API_KEY` - Required when the provider is Runloop.
//! - `RUNLOOP_API_URL` - Optional. Defaults to `https://api.runloop.ai`.
//! - `MODAL_TOKEN_ID` / `MODAL_TOKEN_SECRET` - Required when the provider is Modal.
//! - `SANDBOX_BASE_PATH` - Optional. Base dir inside the sandbox. Defaults to the provider's
//!   home dir (`/home/daytona`, `/home/user` on Runloop, `/root` on Modal).
//! - `SKILLS_DIR` - Optional. Local skills directory. Defaults to `./skills`.
//! - `MAX_SKILL_FILE_SIZE` - Optional. Max `SKILL.md` size in bytes. Defaults to 10 MiB.
//! - `SANDBOX_READY_ATTEMPTS` - Optional. Readiness polls. Defaults to `90`.
//! - `SANDBOX_READY_INTERVAL_SECS` - Optional. Seconds between polls. Defaults to `2`.
//! - `RECURSION_LIMIT` - Optional. Step limit handed to the runtime. Defaults to `1000`.
//! - `MEMORY_STORE_PATH` - Optional. Directory for the JSON preference store.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "openai:gpt-5-mini";
pub const DEFAULT_DAYTONA_API_URL: &str = "https://app.daytona.io/api";
pub const DEFAULT_RUNLOOP_API_URL: &str = "https://api.runloop.ai";
pub const DEFAULT_MAX_SKILL_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_RECURSION_LIMIT: u32 = 1000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Source of configuration values. The process environment in production,
/// a map in tests.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads from `std::env`.
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for std::collections::HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        std::collections::HashMap::get(self, key).cloned()
    }
}

/// Read a required variable. Unset and blank values are both rejected.
fn required(env: &dyn EnvSource, key: &str) -> Result<String, ConfigError> {
    match env.get(key) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::MissingEnvVar(key.to_string())),
    }
}

/// Read an optional variable, treating blank values as unset.
fn optional(env: &dyn EnvSource, key: &str) -> Option<String> {
    env.get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T>(env: &dyn EnvSource, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match optional(env, key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), format!("{}", e))),
        None => Ok(default),
    }
}

/// Model selection in `provider:model` form (e.g. `openai:gpt-5-mini`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub provider: String,
    pub model: String,
}

impl ModelSpec {
    /// Parse a model spec. A bare model name defaults to the `openai` provider.
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let spec = spec.trim();
        let (provider, model) = match spec.split_once(':') {
            Some((p, m)) => (p.trim(), m.trim()),
            None => ("openai", spec),
        };
        if provider.is_empty() || model.is_empty() {
            return Err(ConfigError::InvalidValue(
                "AGENT_MODEL".to_string(),
                format!("expected provider:model, got '{}'", spec),
            ));
        }
        Ok(Self {
            provider: provider.to_lowercase(),
            model: model.to_string(),
        })
    }

    /// Name of the environment variable carrying the provider's API key.
    pub fn api_key_env(&self) -> String {
        match self.provider.as_str() {
            "openai" => "OPENAI_API_KEY".to_string(),
            "anthropic" => "ANTHROPIC_API_KEY".to_string(),
            "google_genai" | "google" => "GOOGLE_API_KEY".to_string(),
            other => format!("{}_API_KEY", other.to_uppercase().replace('-', "_")),
        }
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.model)
    }
}

/// Which sandbox provider executes agent code. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxProvider {
    Daytona,
    Runloop,
    Modal,
}

impl SandboxProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daytona => "daytona",
            Self::Runloop => "runloop",
            Self::Modal => "modal",
        }
    }
}

impl FromStr for SandboxProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daytona" => Ok(Self::Daytona),
            "runloop" => Ok(Self::Runloop),
            "modal" => Ok(Self::Modal),
            other => Err(ConfigError::InvalidValue(
                "SANDBOX_PROVIDER".to_string(),
                format!("unknown provider '{}' (expected daytona, runloop or modal)", other),
            )),
        }
    }
}

impl fmt::Display for SandboxProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials and endpoint for the selected sandbox provider.
///
/// Holding the provider and its credentials in one enum keeps the selection
/// single-valued.
#[derive(Clone)]
pub enum SandboxCredentials {
    Daytona { api_key: String, api_url: String },
    Runloop { api_key: String, api_url: String },
    Modal { token_id: String, token_secret: String },
}

impl SandboxCredentials {
    pub fn provider(&self) -> SandboxProvider {
        match self {
            Self::Daytona { .. } => SandboxProvider::Daytona,
            Self::Runloop { .. } => SandboxProvider::Runloop,
            Self::Modal { .. } => SandboxProvider::Modal,
        }
    }

    /// Home directory of the default sandbox image.
    pub fn default_base_path(&self) -> &'static str {
        match self {
            Self::Daytona { .. } => "/home/daytona",
            Self::Runloop { .. } => "/home/user",
            Self::Modal { .. } => "/root",
        }
    }
}

impl fmt::Debug for SandboxCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daytona { api_url, .. } => f
                .debug_struct("Daytona")
                .field("api_url", api_url)
                .finish_non_exhaustive(),
            Self::Runloop { api_url, .. } => f
                .debug_struct("Runloop")
                .field("api_url", api_url)
                .finish_non_exhaustive(),
            Self::Modal { .. } => f.debug_struct("Modal").finish_non_exhaustive(),
        }
    }
}

/// Sandbox configuration.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub credentials: SandboxCredentials,

    /// Base directory inside the sandbox
    pub base_path: String,

    /// Readiness polls before giving up
    pub ready_attempts: u32,

    /// Delay between readiness polls
    pub ready_interval: Duration,
}

impl SandboxConfig {
    pub fn provider(&self) -> SandboxProvider {
        self.credentials.provider()
    }

    /// Where skills land inside the sandbox.
    pub fn skills_path(&self) -> String {
        format!("{}/skills", self.base_path.trim_end_matches('/'))
    }

    /// Total time allowed for the sandbox to become ready.
    pub fn ready_timeout(&self) -> Duration {
        self.ready_interval * self.ready_attempts
    }
}

/// Skills configuration.
#[derive(Debug, Clone)]
pub struct SkillsConfig {
    /// Local directory holding one subdirectory per skill
    pub dir: PathBuf,

    /// Larger `SKILL.md` files are skipped
    pub max_file_size: u64,
}

/// Agent configuration.
#[derive(Clone)]
pub struct Config {
    pub model: ModelSpec,

    /// Key for the model provider
    pub model_api_key: String,

    /// Tavily search key
    pub tavily_api_key: String,

    pub sandbox: SandboxConfig,

    pub skills: SkillsConfig,

    /// Step limit handed to the agent runtime
    pub recursion_limit: u32,

    /// Directory for the JSON preference store (in-memory store when unset)
    pub memory_store_path: Option<PathBuf>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("model", &self.model)
            .field("sandbox", &self.sandbox)
            .field("skills", &self.skills)
            .field("recursion_limit", &self.recursion_limit)
            .field("memory_store_path", &self.memory_store_path)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if any required key is unset or blank,
    /// and `ConfigError::InvalidValue` for unparsable values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&ProcessEnv)
    }

    /// Load configuration from an arbitrary source.
    pub fn from_source(env: &dyn EnvSource) -> Result<Self, ConfigError> {
        let model = ModelSpec::parse(
            &optional(env, "AGENT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        )?;
        let model_api_key = required(env, &model.api_key_env())?;
        let tavily_api_key = required(env, "TAVILY_API_KEY")?;

        let provider: SandboxProvider = optional(env, "SANDBOX_PROVIDER")
            .as_deref()
            .unwrap_or("daytona")
            .parse()?;

        let credentials = match provider {
            SandboxProvider::Daytona => SandboxCredentials::Daytona {
                api_key: required(env, "DAYTONA_API_KEY")?,
                api_url: optional(env, "DAYTONA_API_URL")
                    .unwrap_or_else(|| DEFAULT_DAYTONA_API_URL.to_string()),
            },
            SandboxProvider::Runloop => SandboxCredentials::Runloop {
                api_key: required(env, "RUNLOOP_API_KEY")?,
                api_url: optional(env, "RUNLOOP_API_URL")
                    .unwrap_or_else(|| DEFAULT_RUNLOOP_API_URL.to_string()),
            },
            SandboxProvider::Modal => SandboxCredentials::Modal {
                token_id: required(env, "MODAL_TOKEN_ID")?,
                token_secret: required(env, "MODAL_TOKEN_SECRET")?,
            },
        };

        let ready_attempts: u32 = parsed(env, "SANDBOX_READY_ATTEMPTS", 90)?;
        if ready_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "SANDBOX_READY_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let base_path = optional(env, "SANDBOX_BASE_PATH")
            .unwrap_or_else(|| credentials.default_base_path().to_string());
        let sandbox = SandboxConfig {
            credentials,
            base_path,
            ready_attempts,
            ready_interval: Duration::from_secs(parsed(env, "SANDBOX_READY_INTERVAL_SECS", 2)?),
        };

        let skills = SkillsConfig {
            dir: optional(env, "SKILLS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("skills")),
            max_file_size: parsed(env, "MAX_SKILL_FILE_SIZE", DEFAULT_MAX_SKILL_FILE_SIZE)?,
        };

        Ok(Self {
            model,
            model_api_key,
            tavily_api_key,
            sandbox,
            skills,
            recursion_limit: parsed(env, "RECURSION_LIMIT", DEFAULT_RECURSION_LIMIT)?,
            memory_store_path: optional(env, "MEMORY_STORE_PATH").map(PathBuf::from),
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(sandbox: SandboxCredentials, skills_dir: PathBuf) -> Self {
        Self {
            model: ModelSpec {
                provider: "openai".to_string(),
                model: "gpt-5-mini".to_string(),
            },
            model_api_key: String::new(),
            tavily_api_key: String::new(),
            sandbox: SandboxConfig {
                base_path: sandbox.default_base_path().to_string(),
                credentials: sandbox,
                ready_attempts: 90,
                ready_interval: Duration::from_secs(2),
            },
            skills: SkillsConfig {
                dir: skills_dir,
                max_file_size: DEFAULT_MAX_SKILL_FILE_SIZE,
            },
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            memory_store_path: None,
        }
    }
}
