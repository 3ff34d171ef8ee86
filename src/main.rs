//! code-assistant - command line entry point
//!
//! Validates configuration, inspects skills and the composed prompt, and runs
//! one-off commands in a fresh sandbox.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use code_assistant::agents::preview_system_prompt;
use code_assistant::config::{Config, SandboxProvider};
use code_assistant::memory::{self, AssistantId};
use code_assistant::sandbox::shell_quote;
use code_assistant::skills;
use code_assistant::AgentBundle;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sandboxed coding assistant configuration tool
#[derive(Parser, Debug)]
#[command(name = "code-assistant")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate configuration and skill files
    Check,

    /// List skills discovered in the skills directory
    Skills,

    /// Print the composed system prompt for an assistant
    Prompt {
        #[arg(long, env = "ASSISTANT_ID")]
        assistant_id: String,
    },

    /// Start a sandbox, run one command in it and tear it down
    Run {
        #[arg(long, env = "ASSISTANT_ID")]
        assistant_id: String,

        /// Command executed in the sandbox
        #[arg(trailing_var_arg = true, required = true, value_name = "COMMAND")]
        command: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "code_assistant=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: model={}, sandbox={}",
        config.model,
        config.sandbox.provider()
    );

    match cli.command {
        Commands::Check => check(&config).await,
        Commands::Skills => {
            let dir = config.skills.dir.clone();
            let max = config.skills.max_file_size;
            let found = tokio::task::spawn_blocking(move || skills::list_skills(&dir, max)).await??;
            if found.is_empty() {
                println!("No skills found in {}", config.skills.dir.display());
            }
            for skill in found {
                println!("{}\t{}\t{}", skill.name, skill.description, skill.path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Prompt { assistant_id } => {
            let assistant_id = AssistantId::new(&assistant_id)?;
            let store = memory::open_store(&config).await?;
            println!("{}", preview_system_prompt(&config, &assistant_id, store).await?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run {
            assistant_id,
            command,
        } => {
            let assistant_id = AssistantId::new(&assistant_id)?;
            let store = memory::open_store(&config).await?;
            let bundle = AgentBundle::start(&config, assistant_id, store).await?;

            let result = bundle.sandbox().execute(&command_line(&command), None).await;
            bundle.shutdown().await;

            let response = result?;
            print!("{}", response.output);
            Ok(ExitCode::from(exit_status(response.exit_code)))
        }
    }
}

/// Quote each argument so the sandbox shell sees the same argv.
fn command_line(args: &[String]) -> String {
    args.iter()
        .map(|a| shell_quote(a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Map a sandbox exit code to a process status. Unknown or negative codes
/// count as failure.
fn exit_status(code: i32) -> u8 {
    match code {
        0..=255 => code as u8,
        _ => 1,
    }
}

/// Configuration already loaded; verify skills can be read and uploaded.
async fn check(config: &Config) -> anyhow::Result<ExitCode> {
    let uploads =
        skills::collect_skill_uploads(&config.skills.dir, &config.sandbox.skills_path()).await?;
    let dir = config.skills.dir.clone();
    let max = config.skills.max_file_size;
    let found = tokio::task::spawn_blocking(move || skills::list_skills(&dir, max)).await??;
    let store = memory::open_store(config).await?;

    println!("model: {}", config.model);
    println!("sandbox: {}", config.sandbox.provider());
    println!(
        "memory: {}",
        if store.is_persistent() {
            "persistent"
        } else {
            "in-memory (lost on exit)"
        }
    );
    println!(
        "skills: {} ({} files) in {}",
        found.len(),
        uploads.len(),
        config.skills.dir.display()
    );

    if config.sandbox.provider() == SandboxProvider::Modal {
        tracing::warn!("Modal is configured but sandbox sessions need daytona or runloop");
    }
    println!("ok");
    Ok(ExitCode::SUCCESS)
}
