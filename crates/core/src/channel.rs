//! Transport trait: the abstraction over the messaging platform.
//!
//! The core only needs to send a message, edit one it sent earlier, and show
//! a typing indicator. Inbound events are normalized to text before they
//! reach the assistant.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::store::UserId;

/// Handle to a message previously sent through a transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef(pub String);

impl std::fmt::Display for MessageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// A human-readable name (e.g., "console").
    fn name(&self) -> &str;

    /// Send a new message to a user.
    async fn send(&self, user: &UserId, text: &str) -> std::result::Result<MessageRef, ChannelError>;

    /// Replace the text of a message sent earlier.
    async fn edit(
        &self,
        user: &UserId,
        message: &MessageRef,
        text: &str,
    ) -> std::result::Result<(), ChannelError>;

    /// Show a typing indicator. Default: no-op.
    async fn send_typing(&self, _user: &UserId) -> std::result::Result<(), ChannelError> {
        Ok(())
    }
}
