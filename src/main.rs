//! Kestrel: turns model output into file edits, shell commands and git operations.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use kestrel_channels::CliChannel;
use kestrel_core::{Agent, Config};
use kestrel_llm::{ChatStream, LlmError, LlmProvider, Message};
use kestrel_tools::{ToolDispatcher, ToolEvent, parse_tool_calls};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "kestrel", version)]
#[command(about = "Execute the tool calls in a model response", long_about = None)]
struct Cli {
    /// Config file (default: $KESTREL_CONFIG or config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tool invocations found in a saved model response as JSON
    Parse {
        file: PathBuf,
    },
    /// Run a saved model response through the agent, executing its tool calls
    Exec {
        file: PathBuf,
        /// Skip confirmation prompts (dangerous commands still ask)
        #[arg(short, long)]
        yes: bool,
        /// Working directory for relative paths and commands
        #[arg(long)]
        cwd: Option<PathBuf>,
    },
}

/// Answers every request with one saved response.
struct ReplayProvider {
    response: String,
}

impl LlmProvider for ReplayProvider {
    async fn chat(&self, _messages: &[Message]) -> Result<String, LlmError> {
        Ok(self.response.clone())
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        let response = self.chat(messages).await?;
        Ok(Box::pin(tokio_stream::once(Ok(response))))
    }

    fn supports_streaming(&self) -> bool {
        false
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "replay"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();
    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { file } => {
            let text = read_response(&file)?;
            let calls = parse_tool_calls(&text);
            println!("{}", serde_json::to_string_pretty(&calls)?);
            Ok(())
        }
        Commands::Exec { file, yes, cwd } => {
            let config_path = resolve_config_path(cli.config);
            let mut config = Config::load(&config_path)
                .with_context(|| format!("loading {}", config_path.display()))?;
            if yes {
                config.agent.auto_approve = true;
            }
            let cwd = match cwd {
                Some(dir) => dir,
                None => std::env::current_dir().context("resolving working directory")?,
            };
            exec(&config, read_response(&file)?, cwd).await
        }
    }
}

async fn exec(config: &Config, response: String, cwd: PathBuf) -> anyhow::Result<()> {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_tool_events(event_rx));

    let dispatcher = ToolDispatcher::new(&config.tools).with_tool_event_tx(event_tx);
    let mut agent = Agent::new(
        ReplayProvider { response },
        CliChannel::new(),
        dispatcher,
        &config.agent,
    )
    .with_cwd(cwd);

    let report = agent.process_turn("Run the saved response.").await?;
    drop(agent);
    let _ = printer.await;

    for (call, result) in &report.results {
        tracing::debug!(tool = %call.label(), success = result.success, "result");
    }
    let results: Vec<_> = report.results.iter().map(|(_, r)| r).collect();
    println!("{}", serde_json::to_string_pretty(&results)?);

    if report.results.iter().any(|(_, r)| !r.success) {
        anyhow::bail!("one or more tool calls failed");
    }
    Ok(())
}

async fn print_tool_events(mut rx: mpsc::UnboundedReceiver<ToolEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            ToolEvent::Started { command, .. } => eprintln!("$ {command}"),
            ToolEvent::OutputChunk { chunk, .. } => print!("{chunk}"),
            ToolEvent::Completed {
                command, success, ..
            } => tracing::debug!(%command, success, "command finished"),
        }
    }
}

fn read_response(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn resolve_config_path(flag: Option<PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    if let Ok(path) = std::env::var("KESTREL_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
