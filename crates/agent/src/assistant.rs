//! The assistant service: one user turn in, one reply out.
//!
//! Wraps the orchestrator with everything around it: per-user locking, the
//! system prompt, the history window, delivery through the transport, and
//! the history append once the turn succeeds. Scheduler notifications come
//! in through the [`TaskNotifier`] impl and run the same path.

use async_trait::async_trait;
use chrono::Utc;
use remindly_config::AgentConfig;
use remindly_core::channel::Transport;
use remindly_core::error::{Error, Result, StoreError};
use remindly_core::locks::UserLocks;
use remindly_core::message::Message;
use remindly_core::notify::{DueKind, TaskNotifier};
use remindly_core::store::{Store, UserId, modify};
use remindly_core::task::Task;
use remindly_core::tool::ToolContext;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::orchestrator::{Invocation, Orchestrator};
use crate::prompt;
use crate::reply::{ReplySink, TransportReply};

/// What the user got back for one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnReply {
    pub text: String,
    /// True when the completion service failed and `text` is the apology.
    pub degraded: bool,
    pub depth: usize,
    pub tool_calls: usize,
    pub recursion_limit_reached: bool,
}

impl TurnReply {
    fn apology(text: &str) -> Self {
        Self {
            text: text.to_string(),
            degraded: true,
            depth: 0,
            tool_calls: 0,
            recursion_limit_reached: false,
        }
    }
}

pub struct Assistant {
    store: Arc<dyn Store>,
    transport: Arc<dyn Transport>,
    orchestrator: Orchestrator,
    locks: UserLocks,
    config: AgentConfig,
}

impl Assistant {
    pub fn new(
        store: Arc<dyn Store>,
        transport: Arc<dyn Transport>,
        orchestrator: Orchestrator,
        config: AgentConfig,
    ) -> Self {
        Self {
            store,
            transport,
            orchestrator,
            locks: UserLocks::new(),
            config,
        }
    }

    /// Share per-user locks with another component, e.g. the scheduler.
    pub fn with_locks(mut self, locks: UserLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn locks(&self) -> &UserLocks {
        &self.locks
    }

    /// Respond to one user message.
    ///
    /// On success the user text and the visible reply are appended to
    /// history. If the completion service fails the configured apology is
    /// sent instead and history is left untouched.
    pub async fn respond(&self, user: &UserId, text: &str, tools_enabled: bool) -> Result<TurnReply> {
        let _guard = self.locks.lock(user).await;
        debug!(user = %user, chars = text.len(), tools_enabled, "Incoming turn");
        self.turn(user, Message::user(text), tools_enabled).await
    }

    /// Caller holds the user's lock.
    async fn turn(&self, user: &UserId, entry: Message, tools_enabled: bool) -> Result<TurnReply> {
        let now = Utc::now();
        let record = self.store.load(user).await?;

        let system_prompt = prompt::system_prompt(&self.config, &record, now);
        let mut messages = record.recent_history(self.config.history_window).to_vec();
        messages.push(entry.clone());

        let sink = Arc::new(TransportReply::new(self.transport.clone(), user.clone()));
        let invocation = Invocation {
            system_prompt,
            messages,
            tools_enabled,
            ctx: ToolContext::new(user.clone(), now),
        };

        let outcome = match self.orchestrator.run(invocation, sink.clone()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(user = %user, error = %e, "Invocation aborted, sending apology");
                if let Err(send_err) = sink.finish(&self.config.apology).await {
                    warn!(user = %user, error = %send_err, "Apology delivery failed");
                }
                return Ok(TurnReply::apology(&self.config.apology));
            }
        };

        sink.finish(&outcome.text).await?;

        let visible = Message::assistant(&outcome.text);
        modify(self.store.as_ref(), user, |record| {
            record.history.push(entry);
            record.history.push(visible);
            Ok::<_, StoreError>(())
        })
        .await?;

        Ok(TurnReply {
            text: outcome.text,
            degraded: false,
            depth: outcome.depth,
            tool_calls: outcome.tool_calls,
            recursion_limit_reached: outcome.recursion_limit_reached,
        })
    }
}

#[async_trait]
impl TaskNotifier for Assistant {
    async fn task_due(&self, user: &UserId, task: &Task, kind: DueKind) -> std::result::Result<(), Error> {
        let _guard = self.locks.lock(user).await;
        let (text, tools_enabled) = match kind {
            DueKind::Notice => (prompt::notice_prompt(task), false),
            DueKind::Replan => (prompt::replan_prompt(task), true),
        };

        let reply = self.turn(user, Message::system(text), tools_enabled).await?;
        info!(
            user = %user,
            task_id = %task.id,
            kind = %kind,
            degraded = reply.degraded,
            tool_calls = reply.tool_calls,
            "Task notification handled"
        );
        Ok(())
    }
}
