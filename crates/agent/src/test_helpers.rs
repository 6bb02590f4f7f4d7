//! Shared test doubles for the agent tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tailortalk_core::error::{ProviderError, ToolError};
use tailortalk_core::message::{AssistantMessage, ToolCallRequest};
use tailortalk_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use tailortalk_core::tool::Tool;

/// A provider that replays a script of responses and records every request.
///
/// Once the script runs out it keeps answering with `repeat` if set, or an
/// `InvalidResponse` error otherwise.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    repeat: Option<ProviderResponse>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replies(messages: Vec<AssistantMessage>) -> Self {
        Self::new(messages.into_iter().map(|m| Ok(response(m))).collect())
    }

    /// Answers every step with the same message.
    pub fn repeating(message: AssistantMessage) -> Self {
        Self {
            repeat: Some(response(message)),
            ..Self::new(Vec::new())
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let next = self.script.lock().unwrap().pop_front();
        match (next, &self.repeat) {
            (Some(result), _) => result,
            (None, Some(repeat)) => Ok(repeat.clone()),
            (None, None) => Err(ProviderError::InvalidResponse("script exhausted".into())),
        }
    }
}

/// A provider that never answers within any sensible timeout.
pub struct StalledProvider;

#[async_trait]
impl Provider for StalledProvider {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(ProviderError::InvalidResponse("unreachable".into()))
    }
}

pub fn response(message: AssistantMessage) -> ProviderResponse {
    ProviderResponse {
        message,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "scripted-model".into(),
    }
}

pub fn call(id: &str, name: &str, arguments: serde_json::Value) -> ToolCallRequest {
    ToolCallRequest::new(id, name, arguments)
}

/// A tool that records its arguments and answers with fixed text.
pub struct RecordingTool {
    name: String,
    reply: String,
    delay: Option<Duration>,
    calls: std::sync::Arc<Mutex<Vec<serde_json::Value>>>,
}

impl RecordingTool {
    pub fn new(name: &str, reply: &str) -> Self {
        Self {
            name: name.into(),
            reply: reply.into(),
            delay: None,
            calls: Default::default(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Handle to the recorded arguments, usable after the tool is boxed.
    pub fn calls(&self) -> std::sync::Arc<Mutex<Vec<serde_json::Value>>> {
        self.calls.clone()
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Records its arguments"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        self.calls.lock().unwrap().push(arguments);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.reply.clone())
    }
}
