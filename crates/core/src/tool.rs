//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are the named, schema-described operations the reasoning service may
//! request (checking availability, creating events). A tool never fails past
//! its own boundary: [`Tool::invoke`] always yields text for the model to read.

use async_trait::async_trait;
use std::collections::HashMap;
use crate::error::{Error, ToolError};
use crate::provider::ToolDefinition;

/// The core Tool trait.
///
/// Implementors provide `execute`, which may fail with a [`ToolError`];
/// the agent calls `invoke`, which turns that failure into a descriptive
/// result string.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "check_calendar_availability").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<String, ToolError>;

    /// Execute and fold any failure into the returned text.
    async fn invoke(&self, arguments: serde_json::Value) -> String {
        match self.execute(arguments).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(tool = %self.name(), error = %e, "Tool reported failure");
                format!("An error occurred: {e}")
            }
        }
    }

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Deserialize tool arguments into a typed input struct.
///
/// Schema mismatches come back as [`ToolError::InvalidArguments`].
pub fn parse_arguments<T: serde::de::DeserializeOwned>(
    arguments: serde_json::Value,
) -> std::result::Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// A registry of available tools.
///
/// Built once at startup and shared read-only (behind an `Arc`) by every
/// concurrent session. The agent loop uses it to:
/// 1. Get tool definitions to send to the LLM
/// 2. Look up tools by name when the LLM requests them
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Resolve a tool by name, failing with [`Error::ToolNotFound`].
    pub fn lookup(&self, name: &str) -> crate::error::Result<&dyn Tool> {
        self.get(name)
            .ok_or_else(|| Error::ToolNotFound(name.to_string()))
    }

    /// Get all tool definitions (for sending to the LLM), sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<_> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Deserialize)]
    struct EchoArgs {
        text: String,
    }

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<String, ToolError> {
            let args: EchoArgs = parse_arguments(arguments)?;
            Ok(args.text)
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.lookup("echo").is_ok());
        assert!(matches!(
            registry.lookup("nonexistent"),
            Err(Error::ToolNotFound(name)) if name == "nonexistent"
        ));
    }

    #[test]
    fn registry_definitions() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[tokio::test]
    async fn invoke_returns_output() {
        let out = EchoTool.invoke(serde_json::json!({"text": "hello world"})).await;
        assert_eq!(out, "hello world");
    }

    #[tokio::test]
    async fn invoke_folds_bad_arguments_into_text() {
        let out = EchoTool.invoke(serde_json::json!({"wrong": 1})).await;
        assert!(out.starts_with("An error occurred: Invalid tool arguments"), "{out}");
    }
}
