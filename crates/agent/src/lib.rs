//! The TailorTalk agent: a bounded reasoning/dispatch state machine.
//!
//! One run works like this:
//!
//! 1. **Seed** a fresh conversation with the user's query
//! 2. **Reason**: send the history and the bound tool definitions to the
//!    reasoning service and append its single assistant message
//! 3. **Dispatch**: if that message requests tools, run each one in order and
//!    append one tool result per request, then go back to step 2
//! 4. **Done**: otherwise the assistant message is the final answer
//!
//! The number of dispatch rounds per run is capped; exceeding it aborts the
//! run with [`tailortalk_core::Error::LoopExceeded`].

pub mod dispatch;
pub mod loop_runner;
pub mod prompt;
pub mod reasoning;
pub mod session;

#[cfg(test)]
mod test_helpers;

pub use dispatch::ToolDispatcher;
pub use loop_runner::{AgentLoop, DEFAULT_MAX_ITERATIONS, LoopState};
pub use prompt::SystemPrompt;
pub use reasoning::ReasoningStep;
pub use session::{SessionOutcome, run_session};
