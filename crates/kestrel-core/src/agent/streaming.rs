use kestrel_llm::LlmProvider;
use tokio_stream::StreamExt;

use super::{Agent, AgentError, TurnPhase};
use crate::channel::Channel;

impl<P: LlmProvider, C: Channel> Agent<P, C> {
    pub(super) async fn call_llm_with_timeout(&mut self) -> Result<String, AgentError> {
        let secs = self.llm_timeout.as_secs();
        let start = std::time::Instant::now();

        let result = if self.provider.supports_streaming() {
            tokio::time::timeout(self.llm_timeout, self.process_response_streaming()).await
        } else {
            tokio::time::timeout(self.llm_timeout, self.process_response_whole()).await
        };

        match result {
            Ok(r) => {
                tracing::debug!(
                    provider = self.provider.name(),
                    elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "LLM response received"
                );
                r
            }
            Err(_) => {
                tracing::warn!(secs, "LLM request timed out");
                Err(AgentError::LlmTimeout { secs })
            }
        }
    }

    async fn process_response_whole(&mut self) -> Result<String, AgentError> {
        let response = self.provider.chat(&self.messages).await?;
        self.enter(TurnPhase::Streaming);
        self.channel.send(&response).await?;
        Ok(response)
    }

    async fn process_response_streaming(&mut self) -> Result<String, AgentError> {
        let mut stream = self.provider.chat_stream(&self.messages).await?;
        self.enter(TurnPhase::Streaming);
        let mut response = String::with_capacity(2048);

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            response.push_str(&chunk);
            self.channel.send_chunk(&chunk).await?;
        }

        self.channel.flush_chunks().await?;
        Ok(response)
    }
}
