//! The tool dispatch step.

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tailortalk_core::error::{Error, ToolError};
use tailortalk_core::event::{DomainEvent, EventBus};
use tailortalk_core::message::{Conversation, Message, ToolCallRequest};
use tailortalk_core::tool::{Tool, ToolRegistry};
use tracing::{debug, warn};

/// Executes the tool calls of the latest assistant message.
///
/// Every name in the batch is resolved before any tool runs, so an unknown
/// tool aborts the run without side effects. Resolved calls then run one at
/// a time, in request order.
pub struct ToolDispatcher {
    tools: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            tools,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Produce one tool-result message per tool call of the last assistant
    /// message, in the same order. Nothing is appended here.
    pub async fn run(
        &self,
        conversation: &Conversation,
        events: &EventBus,
    ) -> Result<Vec<Message>, Error> {
        let pending = conversation
            .last_assistant()
            .filter(|m| !m.is_final())
            .ok_or_else(|| {
                Error::Internal("dispatch requires a trailing assistant message with tool calls".into())
            })?;

        let resolved = pending
            .tool_calls
            .iter()
            .map(|call| self.tools.lookup(&call.name).map(|tool| (call, tool)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut results = Vec::with_capacity(resolved.len());
        for (call, tool) in resolved {
            let started = Instant::now();
            let output = self.invoke(call, tool).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            debug!(
                conversation_id = %conversation.id,
                tool = %call.name,
                call_id = %call.id,
                duration_ms,
                "Tool executed"
            );
            events.publish(DomainEvent::ToolExecuted {
                conversation_id: conversation.id.to_string(),
                tool_name: call.name.clone(),
                call_id: call.id.clone(),
                duration_ms,
                timestamp: Utc::now(),
            });

            results.push(Message::tool_result(&call.id, output));
        }
        Ok(results)
    }

    async fn invoke(&self, call: &ToolCallRequest, tool: &dyn Tool) -> String {
        match tokio::time::timeout(self.timeout, tool.invoke(call.arguments.clone())).await {
            Ok(output) => output,
            Err(_) => {
                let err = ToolError::Timeout {
                    tool_name: call.name.clone(),
                    timeout_secs: self.timeout.as_secs(),
                };
                warn!(tool = %call.name, call_id = %call.id, "Tool timed out");
                format!("An error occurred: {err}")
            }
        }
    }
}
