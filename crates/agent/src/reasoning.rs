//! The reasoning step: one call to the reasoning service per invocation.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tailortalk_core::error::{Error, ProviderError};
use tailortalk_core::event::{DomainEvent, EventBus};
use tailortalk_core::message::{Conversation, Message};
use tailortalk_core::provider::{Provider, ProviderRequest, ToolDefinition};
use tracing::debug;

use crate::prompt::SystemPrompt;

/// Sends the whole history plus the bound tool definitions to the provider
/// and appends the single assistant message it returns.
///
/// No retries happen here; a provider failure or timeout aborts the run.
pub struct ReasoningStep {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    system_prompt: SystemPrompt,
    /// Bound once at construction and reused for every step.
    tools: Vec<ToolDefinition>,
    timeout: Duration,
}

impl ReasoningStep {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Vec<ToolDefinition>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            system_prompt: SystemPrompt::None,
            tools,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn set_temperature(&mut self, temperature: f32) {
        self.temperature = temperature;
    }

    pub fn set_max_tokens(&mut self, max_tokens: Option<u32>) {
        self.max_tokens = max_tokens;
    }

    pub fn set_system_prompt(&mut self, prompt: SystemPrompt) {
        self.system_prompt = prompt;
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn tool_definitions(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// Run one step and append the assistant message to `conversation`.
    pub async fn run(&self, conversation: &mut Conversation, events: &EventBus) -> Result<(), Error> {
        let request = ProviderRequest {
            model: self.model.clone(),
            system: self.system_prompt.render(Utc::now()),
            messages: conversation.messages().to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: self.tools.clone(),
        };

        let response = tokio::time::timeout(self.timeout, self.provider.complete(request))
            .await
            .map_err(|_| {
                ProviderError::Timeout(format!(
                    "{} did not answer within {}s",
                    self.provider.name(),
                    self.timeout.as_secs()
                ))
            })??;

        let tool_calls = response.message.tool_calls.len();
        debug!(
            conversation_id = %conversation.id,
            model = %response.model,
            tool_calls,
            "Reasoning step completed"
        );

        events.publish(DomainEvent::ResponseGenerated {
            conversation_id: conversation.id.to_string(),
            model: response.model,
            tool_calls,
            tokens_used: response.usage.map(|u| u.total_tokens),
            timestamp: Utc::now(),
        });

        conversation.push(Message::Assistant(response.message));
        Ok(())
    }
}
