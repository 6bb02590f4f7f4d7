//! Session entry point: one query in, one answer out.

use tailortalk_core::error::Error;
use tailortalk_core::message::Conversation;

use crate::loop_runner::AgentLoop;

/// The result of a completed session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub answer: String,
    /// Full history of the run, for callers that want to inspect it.
    pub conversation: Conversation,
}

/// Run one session: seed a fresh conversation with `query` and drive the
/// loop to completion. Nothing carries over between sessions.
pub async fn run_session(agent: &AgentLoop, query: &str) -> Result<SessionOutcome, Error> {
    let mut conversation = Conversation::seeded(query);
    let answer = agent.run(&mut conversation).await?;
    Ok(SessionOutcome {
        answer,
        conversation,
    })
}
