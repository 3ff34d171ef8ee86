//! # code_assistant
//!
//! Configuration bundle for a sandboxed coding assistant.
//!
//! This library assembles what an agent runtime needs to run a coding
//! assistant against a remote sandbox:
//! - Credentials and settings from the environment
//! - A skills directory, uploaded into every new sandbox
//! - A sandbox provider (Daytona or Runloop) and its session lifecycle
//! - Long-term memory scoped per assistant id
//!
//! ## Architecture
//!
//! ```text
//!               ┌───────────────────────────────┐
//!               │        AgentDefinition        │
//!               │ model · prompt · middleware   │
//!               └───────┬───────────────┬───────┘
//!                       │ tools         │ middleware [memory, skills]
//!                       ▼               ▼
//!               ┌────────────────┐  ┌───────────────────┐
//!               │CompositeBackend│  │ PreferenceStore   │
//!               └──┬──────────┬──┘  │ ("memories", id)  │
//!        default   │          │     └─────────▲─────────┘
//!                  ▼          └──/memories/───┘
//!        ┌──────────────────┐
//!        │  SandboxBackend  │  Daytona │ Runloop
//!        └──────────────────┘
//! ```
//!
//! ## Modules
//! - `config`: Environment-driven configuration
//! - `skills`: SKILL.md discovery and the skills prompt middleware
//! - `sandbox`: Provider clients and the sandbox session lifecycle
//! - `memory`: Preference store and the memory prompt middleware
//! - `backend`: Filesystem routing between sandbox and memory store
//! - `tools`: Web, file and shell tools for the agent
//! - `agents`: The assembled agent definition

pub mod agents;
pub mod backend;
pub mod config;
pub mod memory;
pub mod sandbox;
pub mod skills;
pub mod tools;

pub use agents::{AgentBundle, AgentDefinition};
pub use config::Config;
pub use memory::AssistantId;
