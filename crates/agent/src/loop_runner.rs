//! The control loop: REASONING and DISPATCHING alternate until DONE.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tailortalk_calendar::CalendarBinding;
use tailortalk_config::AppConfig;
use tailortalk_core::error::Error;
use tailortalk_core::event::{DomainEvent, EventBus};
use tailortalk_core::message::Conversation;
use tailortalk_core::provider::Provider;
use tailortalk_core::tool::ToolRegistry;
use tracing::{debug, error, info};

use crate::dispatch::ToolDispatcher;
use crate::prompt::SystemPrompt;
use crate::reasoning::ReasoningStep;

/// Default cap on DISPATCHING rounds per run.
pub const DEFAULT_MAX_ITERATIONS: u32 = 25;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Reasoning,
    Dispatching,
    Done,
}

/// Orchestrates reasoning steps and tool dispatch for one conversation at a
/// time. Holds no per-run state, so a single instance serves concurrent
/// sessions behind an `Arc`.
pub struct AgentLoop {
    reasoning: ReasoningStep,
    dispatcher: ToolDispatcher,
    max_iterations: u32,
    event_bus: Arc<EventBus>,
}

impl AgentLoop {
    /// Create a new agent loop. Tool definitions are taken from `tools` once.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            reasoning: ReasoningStep::new(provider, model, tools.definitions()),
            dispatcher: ToolDispatcher::new(tools),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            event_bus,
        }
    }

    /// Build the agent from configuration: reasoning provider, calendar
    /// credentials, and tool registry are all set up here, once.
    pub fn from_config(config: &AppConfig, event_bus: Arc<EventBus>) -> Result<Self, Error> {
        let provider = tailortalk_providers::build_from_config(config)?;
        let calendar = tailortalk_calendar::build_from_config(&config.calendar)
            .map_err(|e| Error::config(e.to_string()))?;
        Ok(Self::from_parts(config, provider, calendar, event_bus))
    }

    /// Build the agent from configuration around an existing provider and
    /// calendar backend.
    pub fn from_parts(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        calendar: CalendarBinding,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let system_prompt = match &config.agent.system_prompt_override {
            Some(text) => SystemPrompt::Fixed(text.clone()),
            None => SystemPrompt::CalendarAssistant {
                timezone: calendar.timezone,
            },
        };
        let tools = Arc::new(tailortalk_tools::default_registry(calendar));

        Self::new(provider, config.provider_model(), tools, event_bus)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_max_iterations(config.agent.max_iterations)
            .with_system_prompt(system_prompt)
            .with_reasoning_timeout(Duration::from_secs(config.agent.reasoning_timeout_secs))
            .with_tool_timeout(Duration::from_secs(config.agent.tool_timeout_secs))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.reasoning.set_temperature(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.reasoning.set_max_tokens(max_tokens);
        self
    }

    /// Set the maximum number of tool rounds per run.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_system_prompt(mut self, prompt: SystemPrompt) -> Self {
        self.reasoning.set_system_prompt(prompt);
        self
    }

    pub fn with_reasoning_timeout(mut self, timeout: Duration) -> Self {
        self.reasoning.set_timeout(timeout);
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.dispatcher.set_timeout(timeout);
        self
    }

    pub fn model(&self) -> &str {
        self.reasoning.model()
    }

    pub fn tools(&self) -> &ToolRegistry {
        self.dispatcher.registry()
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Drive `conversation` to DONE and return the final answer.
    ///
    /// The conversation is only ever appended to. On failure it keeps
    /// whatever was appended before the failing step.
    pub async fn run(&self, conversation: &mut Conversation) -> Result<String, Error> {
        info!(
            conversation_id = %conversation.id,
            messages = conversation.len(),
            "Processing conversation"
        );

        match self.drive(conversation).await {
            Ok((answer, rounds)) => {
                info!(conversation_id = %conversation.id, rounds, "Run completed");
                self.event_bus.publish(DomainEvent::RunCompleted {
                    conversation_id: conversation.id.to_string(),
                    rounds,
                    timestamp: Utc::now(),
                });
                Ok(answer)
            }
            Err(e) => {
                error!(conversation_id = %conversation.id, error = %e, "Run failed");
                self.event_bus.publish(DomainEvent::RunFailed {
                    conversation_id: conversation.id.to_string(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }

    async fn drive(&self, conversation: &mut Conversation) -> Result<(String, u32), Error> {
        let mut state = LoopState::Reasoning;
        let mut rounds = 0u32;

        loop {
            debug!(conversation_id = %conversation.id, ?state, iteration = rounds, "Loop transition");
            state = match state {
                LoopState::Reasoning => {
                    self.reasoning.run(conversation, &self.event_bus).await?;
                    match conversation.last_assistant() {
                        Some(message) if !message.is_final() => LoopState::Dispatching,
                        _ => LoopState::Done,
                    }
                }
                LoopState::Dispatching => {
                    if rounds >= self.max_iterations {
                        return Err(Error::LoopExceeded {
                            max_iterations: self.max_iterations,
                        });
                    }
                    rounds += 1;
                    let results = self.dispatcher.run(conversation, &self.event_bus).await?;
                    conversation.extend(results);
                    LoopState::Reasoning
                }
                LoopState::Done => {
                    let answer = conversation
                        .last_assistant()
                        .map(|m| m.content.clone())
                        .ok_or_else(|| Error::Internal("run ended without an assistant message".into()))?;
                    return Ok((answer, rounds));
                }
            };
        }
    }
}
