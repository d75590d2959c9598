//! Where a turn's visible text goes.
//!
//! A [`ReplySink`] receives partial text while the model is still
//! streaming, and the final text once the invocation ends. The transport
//! backed sink sends one message and then keeps editing it.

use async_trait::async_trait;
use remindly_core::channel::{MessageRef, Transport};
use remindly_core::error::ChannelError;
use remindly_core::store::UserId;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Show a typing indicator.
    async fn typing(&self) -> Result<(), ChannelError>;

    /// Show text that is still being written.
    async fn partial(&self, text: &str) -> Result<(), ChannelError>;

    /// Deliver the final text of the turn.
    async fn finish(&self, text: &str) -> Result<(), ChannelError>;
}

/// Streams a turn into a single transport message.
pub struct TransportReply {
    transport: Arc<dyn Transport>,
    user: UserId,
    sent: Mutex<Option<MessageRef>>,
}

impl TransportReply {
    pub fn new(transport: Arc<dyn Transport>, user: UserId) -> Self {
        Self {
            transport,
            user,
            sent: Mutex::new(None),
        }
    }

    async fn upsert(&self, text: &str) -> Result<(), ChannelError> {
        let mut sent = self.sent.lock().await;
        match sent.as_ref() {
            Some(message) => self.transport.edit(&self.user, message, text).await,
            None => {
                let message = self.transport.send(&self.user, text).await?;
                debug!(user = %self.user, message = %message, "Reply message opened");
                *sent = Some(message);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ReplySink for TransportReply {
    async fn typing(&self) -> Result<(), ChannelError> {
        self.transport.send_typing(&self.user).await
    }

    async fn partial(&self, text: &str) -> Result<(), ChannelError> {
        self.upsert(text).await
    }

    async fn finish(&self, text: &str) -> Result<(), ChannelError> {
        self.upsert(text).await
    }
}
