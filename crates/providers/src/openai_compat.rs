//! OpenAI-compatible provider implementation.
//!
//! Works with: Gemini (via its OpenAI-compatible endpoint), OpenAI,
//! OpenRouter, Ollama, vLLM, and any `/chat/completions` endpoint that
//! supports function calling.

use async_trait::async_trait;
use std::time::Duration;
use tailortalk_core::error::ProviderError;
use tailortalk_core::message::{AssistantMessage, Message, ToolCallRequest};
use tailortalk_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// An OpenAI-compatible LLM provider.
///
/// The underlying `reqwest::Client` is pooled and immutable after
/// construction, so one provider is shared by every concurrent session.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider with a per-request timeout.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create a Gemini provider (convenience constructor).
    pub fn gemini(api_key: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        Self::new(
            "gemini",
            "https://generativelanguage.googleapis.com/v1beta/openai",
            api_key,
            timeout,
        )
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        Self::new("openai", "https://api.openai.com/v1", api_key, timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert the instruction and history to OpenAI API format.
    fn to_api_messages(system: Option<&str>, messages: &[Message]) -> Vec<ApiMessage> {
        let system = system.map(|s| ApiMessage {
            role: "system".into(),
            content: Some(s.to_string()),
            tool_calls: None,
            tool_call_id: None,
        });

        system
            .into_iter()
            .chain(messages.iter().map(|m| match m {
                Message::User(u) => ApiMessage {
                    role: "user".into(),
                    content: Some(u.content.clone()),
                    tool_calls: None,
                    tool_call_id: None,
                },
                Message::Assistant(a) => ApiMessage {
                    role: "assistant".into(),
                    content: if a.content.is_empty() && !a.tool_calls.is_empty() {
                        None
                    } else {
                        Some(a.content.clone())
                    },
                    tool_calls: if a.tool_calls.is_empty() {
                        None
                    } else {
                        Some(
                            a.tool_calls
                                .iter()
                                .map(|tc| ApiToolCall {
                                    id: tc.id.clone(),
                                    r#type: "function".into(),
                                    function: ApiFunction {
                                        name: tc.name.clone(),
                                        arguments: tc.arguments.to_string(),
                                    },
                                })
                                .collect(),
                        )
                    },
                    tool_call_id: None,
                },
                Message::ToolResult(t) => ApiMessage {
                    role: "tool".into(),
                    content: Some(t.content.clone()),
                    tool_calls: None,
                    tool_call_id: Some(t.tool_call_id.clone()),
                },
            }))
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    /// Convert a wire tool call into a request. Unparseable arguments are kept
    /// as a JSON string so the tool can report the mismatch; missing ids are
    /// replaced so every request stays correlatable.
    fn to_tool_call_request(tc: ApiToolCall) -> ToolCallRequest {
        let arguments = if tc.function.arguments.trim().is_empty() {
            serde_json::json!({})
        } else {
            serde_json::from_str(&tc.function.arguments)
                .unwrap_or(serde_json::Value::String(tc.function.arguments))
        };

        let id = if tc.id.is_empty() {
            format!("call_{}", uuid::Uuid::new_v4().simple())
        } else {
            tc.id
        };

        ToolCallRequest {
            id,
            name: tc.function.name,
            arguments,
        }
    }

    fn build_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(request.system.as_deref(), &request.messages),
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }

    fn parse_response(api_response: ApiResponse) -> Result<ProviderResponse, ProviderError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

        let tool_calls: Vec<ToolCallRequest> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(Self::to_tool_call_request)
            .collect();

        let message = AssistantMessage {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            timestamp: chrono::Utc::now(),
        };

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            message,
            usage,
            model: api_response.model.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::build_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        Self::parse_response(api_response)
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: ApiFunction,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeout() -> Duration {
        Duration::from_secs(5)
    }

    #[test]
    fn gemini_constructor() {
        let provider = OpenAiCompatProvider::gemini("key", timeout()).unwrap();
        assert_eq!(provider.name(), "gemini");
        assert!(provider.base_url().contains("generativelanguage.googleapis.com"));
    }

    #[test]
    fn trailing_slash_trimmed() {
        let provider =
            OpenAiCompatProvider::new("local", "http://localhost:11434/v1/", "", timeout()).unwrap();
        assert_eq!(provider.base_url(), "http://localhost:11434/v1");
    }

    #[test]
    fn system_instruction_leads_the_history() {
        let messages = vec![Message::user("Hello")];
        let api = OpenAiCompatProvider::to_api_messages(Some("Be brief"), &messages);
        assert_eq!(api.len(), 2);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[1].role, "user");
    }

    #[test]
    fn assistant_tool_calls_serialize_arguments_as_strings() {
        let msg = Message::Assistant(AssistantMessage::with_tool_calls(
            "",
            vec![ToolCallRequest::new(
                "call_1",
                "check_calendar_availability",
                serde_json::json!({"start_time": "2025-03-01T15:00:00"}),
            )],
        ));
        let api = OpenAiCompatProvider::to_api_messages(None, &[msg]);
        assert!(api[0].content.is_none());
        let tc = api[0].tool_calls.as_ref().unwrap();
        assert_eq!(tc[0].function.name, "check_calendar_availability");
        let args: serde_json::Value = serde_json::from_str(&tc[0].function.arguments).unwrap();
        assert_eq!(args["start_time"], "2025-03-01T15:00:00");
    }

    #[test]
    fn tool_result_maps_to_tool_role() {
        let msg = Message::tool_result("call_1", "The calendar is completely free");
        let api = OpenAiCompatProvider::to_api_messages(None, &[msg]);
        assert_eq!(api[0].role, "tool");
        assert_eq!(api[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn body_includes_bound_tools() {
        let request = ProviderRequest {
            model: "gemini-2.0-flash".into(),
            system: None,
            messages: vec![Message::user("hi")],
            temperature: 0.0,
            max_tokens: Some(512),
            tools: vec![ToolDefinition {
                name: "create_calendar_event".into(),
                description: "Creates a new event".into(),
                parameters: serde_json::json!({"type": "object"}),
            }],
        };
        let body = OpenAiCompatProvider::build_body(&request);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "create_calendar_event");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn parse_text_response() {
        let data = r#"{
            "model": "gemini-2.0-flash",
            "choices": [{"message": {"role": "assistant", "content": "You are free at 3pm."}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let resp = OpenAiCompatProvider::parse_response(parsed).unwrap();
        assert_eq!(resp.message.content, "You are free at 3pm.");
        assert!(resp.message.is_final());
        assert_eq!(resp.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn parse_tool_call_response() {
        let data = r#"{
            "choices": [{"message": {"role": "assistant", "content": null, "tool_calls": [
                {"id": "call_abc", "type": "function",
                 "function": {"name": "check_calendar_availability",
                              "arguments": "{\"start_time\":\"2025-03-01T15:00:00\",\"end_time\":\"2025-03-01T16:00:00\"}"}}
            ]}}]
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let resp = OpenAiCompatProvider::parse_response(parsed).unwrap();
        assert_eq!(resp.message.content, "");
        assert_eq!(resp.message.tool_calls.len(), 1);
        let call = &resp.message.tool_calls[0];
        assert_eq!(call.id, "call_abc");
        assert_eq!(call.arguments["end_time"], "2025-03-01T16:00:00");
    }

    #[test]
    fn missing_tool_call_id_is_generated() {
        let data = r#"{
            "choices": [{"message": {"role": "assistant", "tool_calls": [
                {"function": {"name": "create_calendar_event", "arguments": "{}"}},
                {"function": {"name": "create_calendar_event", "arguments": "{}"}}
            ]}}]
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let resp = OpenAiCompatProvider::parse_response(parsed).unwrap();
        let ids: Vec<_> = resp.message.tool_calls.iter().map(|c| c.id.clone()).collect();
        assert!(ids.iter().all(|id| id.starts_with("call_")));
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn unparseable_arguments_kept_as_string() {
        let tc = ApiToolCall {
            id: "call_1".into(),
            r#type: "function".into(),
            function: ApiFunction {
                name: "create_calendar_event".into(),
                arguments: "{not json".into(),
            },
        };
        let req = OpenAiCompatProvider::to_tool_call_request(tc);
        assert_eq!(req.arguments, serde_json::Value::String("{not json".into()));
    }

    #[test]
    fn empty_choices_is_invalid() {
        let parsed: ApiResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            OpenAiCompatProvider::parse_response(parsed),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    // --- Against a local HTTP server ---

    use axum::Json;
    use axum::http::{HeaderMap, StatusCode, header};
    use axum::routing::{get, post};
    use std::sync::{Arc, Mutex};

    async fn serve(router: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}/v1")
    }

    fn provider(base: &str, timeout: Duration) -> OpenAiCompatProvider {
        OpenAiCompatProvider::new("test", base, "secret-key", timeout).unwrap()
    }

    fn question() -> ProviderRequest {
        ProviderRequest {
            model: "gemini-2.0-flash".into(),
            system: Some("You book meetings.".into()),
            messages: vec![Message::user("Am I free at 3pm?")],
            temperature: 0.0,
            max_tokens: None,
            tools: vec![],
        }
    }

    /// A server that answers every completion with `status` and `body`.
    async fn status_server(status: StatusCode, body: &'static str) -> String {
        let router = axum::Router::new().route(
            "/v1/chat/completions",
            post(move || async move { (status, body) }),
        );
        serve(router).await
    }

    #[tokio::test]
    async fn complete_posts_chat_request_with_bearer_key() {
        let seen: Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>> = Arc::default();
        let recorder = seen.clone();
        let router = axum::Router::new().route(
            "/v1/chat/completions",
            post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                let recorder = recorder.clone();
                async move {
                    let auth = headers
                        .get(header::AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    recorder.lock().unwrap().push((auth, body));
                    Json(serde_json::json!({
                        "model": "gemini-2.0-flash-001",
                        "choices": [{"message": {"role": "assistant", "content": null, "tool_calls": [
                            {"id": "call_1", "type": "function",
                             "function": {"name": "check_calendar_availability",
                                          "arguments": "{\"start_time\":\"2025-03-01T15:00:00\",\"end_time\":\"2025-03-01T16:00:00\"}"}}
                        ]}}],
                        "usage": {"prompt_tokens": 20, "completion_tokens": 8, "total_tokens": 28}
                    }))
                }
            }),
        );
        let p = provider(&serve(router).await, timeout());

        let resp = p.complete(question()).await.unwrap();

        assert_eq!(resp.model, "gemini-2.0-flash-001");
        assert_eq!(resp.usage.unwrap().total_tokens, 28);
        assert_eq!(resp.message.tool_calls.len(), 1);
        assert_eq!(resp.message.tool_calls[0].name, "check_calendar_availability");
        assert_eq!(resp.message.tool_calls[0].arguments["start_time"], "2025-03-01T15:00:00");

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        let (auth, body) = &seen[0];
        assert_eq!(auth.as_deref(), Some("Bearer secret-key"));
        assert_eq!(body["model"], "gemini-2.0-flash");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Am I free at 3pm?");
    }

    #[tokio::test]
    async fn unauthorized_and_forbidden_are_authentication_failures() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            let p = provider(&status_server(status, "denied").await, timeout());
            let err = p.complete(question()).await.unwrap_err();
            assert!(
                matches!(err, ProviderError::AuthenticationFailed(_)),
                "{status}: {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn too_many_requests_is_rate_limited() {
        let p = provider(
            &status_server(StatusCode::TOO_MANY_REQUESTS, "slow down").await,
            timeout(),
        );
        let err = p.complete(question()).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn other_statuses_are_api_errors_with_body() {
        let p = provider(
            &status_server(StatusCode::SERVICE_UNAVAILABLE, "model overloaded").await,
            timeout(),
        );
        let err = p.complete(question()).await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::ApiError { status_code: 503, ref message } if message == "model overloaded"
        ));
    }

    #[tokio::test]
    async fn garbage_success_body_is_invalid_response() {
        let p = provider(&status_server(StatusCode::OK, "not json").await, timeout());
        let err = p.complete(question()).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn slow_server_is_a_timeout() {
        let router = axum::Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "too late"
            }),
        );
        let p = provider(&serve(router).await, Duration::from_millis(200));

        let err = p.complete(question()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)), "{err:?}");
    }

    #[tokio::test]
    async fn health_check_lists_models() {
        let router = axum::Router::new().route(
            "/v1/models",
            get(|| async { Json(serde_json::json!({"data": []})) }),
        );
        let p = provider(&serve(router).await, timeout());
        assert!(p.health_check().await.unwrap());

        let p = provider(&status_server(StatusCode::OK, "{}").await, timeout());
        assert!(!p.health_check().await.unwrap());
    }
}
