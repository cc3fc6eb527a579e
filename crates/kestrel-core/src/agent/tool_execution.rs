use kestrel_llm::{LlmProvider, Message};
use kestrel_tools::{Confirm, ExecuteOptions, ToolInvocation, ToolResult, truncate_tool_output};

use super::{Agent, AgentError};
use crate::channel::Channel;

/// Routes dispatcher confirmations to the channel. A failed prompt counts as "no".
struct ChannelConfirm<'a, C>(&'a mut C);

impl<C: Channel> Confirm for ChannelConfirm<'_, C> {
    async fn confirm(&mut self, prompt: &str) -> bool {
        match self.0.confirm(prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!("confirmation failed, treating as declined: {e}");
                false
            }
        }
    }
}

pub(super) fn format_tool_output(tool_name: &str, body: &str) -> String {
    format!("[tool output: {tool_name}]\n{body}")
}

impl<P: LlmProvider, C: Channel> Agent<P, C> {
    /// Execute `calls` one after another; a failure is reported and the
    /// batch moves on.
    pub(super) async fn execute_batch(
        &mut self,
        calls: Vec<ToolInvocation>,
    ) -> Result<Vec<(ToolInvocation, ToolResult)>, AgentError> {
        let options = ExecuteOptions {
            auto_approve: self.auto_approve,
        };
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            let result = self
                .dispatcher
                .execute(&call, &self.cwd, options, &mut ChannelConfirm(&mut self.channel))
                .await;

            if result.is_cancelled() {
                self.channel
                    .send(&format!("Cancelled: {}", call.label()))
                    .await?;
            } else if !result.success {
                let error = result.error.as_deref().unwrap_or("unknown error");
                self.channel
                    .send(&format!("Error: {}: {error}", call.label()))
                    .await?;
            }
            results.push((call, result));
        }

        Ok(results)
    }

    /// Record the model's response, then one synthetic user message per
    /// successful invocation that produced text.
    pub(super) fn inject_results(
        &mut self,
        response: &str,
        results: &[(ToolInvocation, ToolResult)],
    ) {
        self.messages.push(Message::assistant(response));
        for (call, result) in results {
            if let Some(content) = result.reportable_content() {
                let body = truncate_tool_output(content, self.tool_output_limit);
                self.messages
                    .push(Message::user(format_tool_output(&call.name, &body)));
            }
        }
    }
}
