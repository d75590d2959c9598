//! The seam between the scheduler and the assistant.

use async_trait::async_trait;

use crate::error::Error;
use crate::store::UserId;
use crate::task::Task;

/// Why a task is being brought to the user's attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueKind {
    /// Informational reminder; the task is already completed.
    Notice,
    /// The task needs a decision: reschedule or fail.
    Replan,
}

impl std::fmt::Display for DueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DueKind::Notice => "notice",
            DueKind::Replan => "replan",
        })
    }
}

/// Receives due tasks from the scheduler tick.
#[async_trait]
pub trait TaskNotifier: Send + Sync {
    async fn task_due(&self, user: &UserId, task: &Task, kind: DueKind) -> std::result::Result<(), Error>;
}
