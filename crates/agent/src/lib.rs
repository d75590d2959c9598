//! The assistant: orchestration loop, streaming replies and history glue.
//!
//! [`Orchestrator`] drives one invocation against the completion service,
//! executing tool calls between passes under a hard depth cap.
//! [`Assistant`] wraps it with per-user locking, prompt building, reply
//! delivery and the conversation history, and doubles as the scheduler's
//! [`remindly_core::TaskNotifier`].

pub mod accumulator;
pub mod assistant;
pub mod orchestrator;
pub mod prompt;
pub mod reply;
pub mod typing;

#[cfg(test)]
mod test_support;

pub use accumulator::ToolCallAccumulator;
pub use assistant::{Assistant, TurnReply};
pub use orchestrator::{FALLBACK_REPLY, Invocation, Orchestrator, Outcome};
pub use reply::{ReplySink, TransportReply};
pub use typing::TypingRefresher;
