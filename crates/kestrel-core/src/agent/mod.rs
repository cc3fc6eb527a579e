pub mod error;
mod streaming;
mod tool_execution;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kestrel_llm::{LlmProvider, Message};
use kestrel_tools::{ToolDispatcher, ToolInvocation, ToolResult};
use tokio::sync::watch;

use crate::channel::Channel;
use crate::config::AgentConfig;

pub use error::AgentError;

const SYSTEM_PREAMBLE: &str = "You are Kestrel, a coding assistant working in the user's project directory. \
Use the tools below to read, edit and run things; read a file before editing it.\n\n";

/// Where a turn currently is. Transitions are traced at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Dispatching,
    Streaming,
    ParsingTools,
    ExecutingBatch,
    InjectingResults,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Dispatching => "dispatching",
            Self::Streaming => "streaming",
            Self::ParsingTools => "parsing_tools",
            Self::ExecutingBatch => "executing_batch",
            Self::InjectingResults => "injecting_results",
        };
        f.write_str(s)
    }
}

/// What one turn produced: the model's reply and every tool outcome in order.
#[derive(Debug, Default)]
pub struct TurnReport {
    pub response: String,
    pub results: Vec<(ToolInvocation, ToolResult)>,
}

pub struct Agent<P: LlmProvider, C: Channel> {
    provider: P,
    channel: C,
    dispatcher: ToolDispatcher,
    messages: Vec<Message>,
    cwd: PathBuf,
    phase: TurnPhase,
    auto_approve: bool,
    llm_timeout: Duration,
    tool_output_limit: usize,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<P: LlmProvider, C: Channel> Agent<P, C> {
    #[must_use]
    pub fn new(provider: P, channel: C, dispatcher: ToolDispatcher, config: &AgentConfig) -> Self {
        let system = format!(
            "{SYSTEM_PREAMBLE}{}",
            dispatcher.registry().format_for_prompt()
        );
        Self {
            provider,
            channel,
            dispatcher,
            messages: vec![Message::system(system)],
            cwd: PathBuf::from("."),
            phase: TurnPhase::Idle,
            auto_approve: config.auto_approve,
            llm_timeout: Duration::from_secs(config.llm_timeout_secs),
            tool_output_limit: config.tool_output_limit,
            shutdown: None,
        }
    }

    /// Base directory for relative tool paths and commands.
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    #[must_use]
    pub fn with_shutdown(mut self, rx: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(rx);
        self
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn channel(&self) -> &C {
        &self.channel
    }

    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    #[must_use]
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    fn enter(&mut self, phase: TurnPhase) {
        tracing::debug!(from = %self.phase, to = %phase, "turn phase");
        self.phase = phase;
    }

    /// Read messages until the channel closes or shutdown is signalled.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel fails. Model failures are reported to
    /// the user and the loop continues.
    pub async fn run(&mut self) -> Result<(), AgentError> {
        loop {
            let incoming = tokio::select! {
                result = self.channel.recv() => result?,
                () = shutdown_signal(&mut self.shutdown) => {
                    tracing::info!("shutting down");
                    break;
                }
            };
            let Some(msg) = incoming else { break };
            if msg.text.trim().is_empty() {
                continue;
            }

            match self.process_turn(&msg.text).await {
                Ok(report) => {
                    tracing::debug!(tools = report.results.len(), "turn complete");
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("turn failed: {e}");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Run one user turn: ask the model, execute any tool calls in its
    /// reply, and queue their output for the next turn. The model is called
    /// exactly once.
    ///
    /// # Errors
    ///
    /// On a model failure or timeout the user message is withdrawn from the
    /// history, the failure is reported on the channel, and the error is
    /// returned. Channel failures are returned as-is.
    pub async fn process_turn(&mut self, text: &str) -> Result<TurnReport, AgentError> {
        self.enter(TurnPhase::Dispatching);
        self.messages.push(Message::user(text));

        let response = match self.call_llm_with_timeout().await {
            Ok(response) => response,
            Err(e) => {
                self.messages.pop();
                self.enter(TurnPhase::Idle);
                if e.is_recoverable() {
                    self.channel.send(&format!("Error: {e}")).await?;
                }
                return Err(e);
            }
        };

        if response.trim().is_empty() {
            tracing::warn!("received empty response from LLM");
            self.messages.pop();
            self.enter(TurnPhase::Idle);
            self.channel
                .send("Received an empty response. Please try again.")
                .await?;
            return Ok(TurnReport::default());
        }

        self.enter(TurnPhase::ParsingTools);
        let calls = kestrel_tools::parse_tool_calls(&response);
        tracing::debug!(count = calls.len(), "parsed tool calls");

        if calls.is_empty() {
            self.messages.push(Message::assistant(response.as_str()));
            self.enter(TurnPhase::Idle);
            return Ok(TurnReport {
                response,
                results: Vec::new(),
            });
        }

        self.enter(TurnPhase::ExecutingBatch);
        let results = self.execute_batch(calls).await?;

        self.enter(TurnPhase::InjectingResults);
        self.inject_results(&response, &results);
        self.enter(TurnPhase::Idle);

        Ok(TurnReport { response, results })
    }
}

async fn shutdown_signal(rx: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = rx else {
        return std::future::pending().await;
    };
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
