mod env;

use std::path::Path;

use anyhow::Context;
use kestrel_tools::ToolsConfig;
use serde::Deserialize;

fn default_llm_timeout() -> u64 {
    120
}

fn default_tool_output_limit() -> usize {
    30_000
}

/// Top-level configuration loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Skip confirmation prompts, except for dangerous commands.
    #[serde(default)]
    pub auto_approve: bool,
    #[serde(default = "default_llm_timeout")]
    pub llm_timeout_secs: u64,
    /// Bytes of each tool result fed back into the conversation.
    #[serde(default = "default_tool_output_limit")]
    pub tool_output_limit: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            auto_approve: false,
            llm_timeout_secs: default_llm_timeout(),
            tool_output_limit: default_tool_output_limit(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }
}
