#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] kestrel_llm::LlmError),

    #[error("LLM request timed out after {secs}s")]
    LlmTimeout { secs: u64 },

    #[error(transparent)]
    Channel(#[from] crate::channel::ChannelError),
}

impl AgentError {
    /// Model-side failures end the turn but not the session.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Llm(_) | Self::LlmTimeout { .. })
    }
}
