//! # Remindly Core
//!
//! Domain types, traits, and error definitions for the Remindly reminder
//! assistant. This crate has **no framework dependencies**: it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator is defined as a trait here. Implementations live in
//! their respective crates and are threaded through constructors, so tests
//! can substitute fakes for the completion service, store, and transport.

pub mod cadence;
pub mod channel;
pub mod error;
pub mod locks;
pub mod message;
pub mod notify;
pub mod provider;
pub mod recurrence;
pub mod store;
pub mod task;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use cadence::{CadencePolicy, MinuteRange};
pub use channel::{MessageRef, Transport};
pub use error::{ChannelError, Error, ProviderError, RecordKind, Result, StoreError, ToolError};
pub use locks::UserLocks;
pub use message::{Message, MessageToolCall, Role};
pub use notify::{DueKind, TaskNotifier};
pub use provider::{
    CompletionRequest, DeltaStream, FinishReason, Provider, StreamDelta, ToolCallDelta, ToolDefinition, Usage,
};
pub use recurrence::{Recurrence, RecurrenceError};
pub use store::{Store, UserId, UserRecord, modify};
pub use task::{Annoyance, Routine, RoutineStats, Task, TaskStatus, TransitionError};
pub use tool::{Tool, ToolContext, ToolRegistry};
