//! # TailorTalk Core
//!
//! Domain types, traits, and error definitions for the TailorTalk booking agent.
//! This crate has **no I/O** — it defines the model that the provider,
//! calendar, tool, and agent crates implement against.
//!
//! - [`message`]: the append-only conversation history and its message variants
//! - [`tool`]: the `Tool` trait and the immutable `ToolRegistry`
//! - [`provider`]: the reasoning-service contract
//! - [`event`]: domain events for observers of the agent loop

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{CalendarError, Error, ProviderError, Result, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{
    AssistantMessage, Conversation, ConversationId, Message, Role, ToolCallRequest,
    ToolResultMessage, UserMessage,
};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{Tool, ToolRegistry};
