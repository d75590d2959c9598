//! Store trait: the per-user durable record.
//!
//! Each user owns one [`UserRecord`] holding their routines, tasks, memory,
//! goal and conversation history. All mutation is read-modify-write keyed
//! by user id; callers serialize access per user with
//! [`crate::locks::UserLocks`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::StoreError;
use crate::message::Message;
use crate::task::{Routine, Task};

/// Identifies a user across transports and the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything stored for one user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub routines: Vec<Routine>,

    #[serde(default)]
    pub tasks: Vec<Task>,

    /// Free-form facts about the user. Schema-less by design: keys and
    /// values are whatever the assistant chose to remember.
    #[serde(default)]
    pub memory: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,

    /// Append-only conversation log (user-visible turns only).
    #[serde(default)]
    pub history: Vec<Message>,
}

impl UserRecord {
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn routine(&self, id: &str) -> Option<&Routine> {
        self.routines.iter().find(|r| r.id == id)
    }

    pub fn routine_mut(&mut self, id: &str) -> Option<&mut Routine> {
        self.routines.iter_mut().find(|r| r.id == id)
    }

    /// Tasks that are still pending or awaiting a replanning decision.
    pub fn open_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| !t.status.is_terminal())
    }

    /// The last `window` history entries, oldest first.
    pub fn recent_history(&self, window: usize) -> &[Message] {
        let start = self.history.len().saturating_sub(window);
        &self.history[start..]
    }

    /// Drop finished tasks beyond `ceiling`, oldest `created_at` first.
    /// Open tasks are never pruned. Returns how many were removed.
    pub fn prune_finished(&mut self, ceiling: usize) -> usize {
        let mut finished: Vec<(chrono::DateTime<chrono::Utc>, String)> = self
            .tasks
            .iter()
            .filter(|t| t.status.is_terminal())
            .map(|t| (t.created_at, t.id.clone()))
            .collect();
        if finished.len() <= ceiling {
            return 0;
        }
        finished.sort();
        let excess = finished.len() - ceiling;
        let doomed: Vec<String> = finished.into_iter().take(excess).map(|(_, id)| id).collect();
        self.tasks.retain(|t| !doomed.contains(&t.id));
        excess
    }
}

/// The core Store trait.
///
/// Implementations: in-memory (tests, ephemeral runs), JSON file per user.
#[async_trait]
pub trait Store: Send + Sync {
    /// The backend name (e.g., "memory", "file").
    fn name(&self) -> &str;

    /// Load a user's record. Unknown users get an empty record.
    async fn load(&self, user: &UserId) -> std::result::Result<UserRecord, StoreError>;

    /// Replace a user's record.
    async fn save(&self, user: &UserId, record: &UserRecord) -> std::result::Result<(), StoreError>;

    /// Every user with a stored record.
    async fn users(&self) -> std::result::Result<Vec<UserId>, StoreError>;
}

/// Read-modify-write one user's record.
///
/// The record is written back only when `f` returns `Ok`; an `Err` leaves
/// the stored record untouched.
pub async fn modify<T, E, F>(store: &dyn Store, user: &UserId, f: F) -> std::result::Result<T, E>
where
    F: FnOnce(&mut UserRecord) -> std::result::Result<T, E>,
    E: From<StoreError>,
{
    let mut record = store.load(user).await?;
    let out = f(&mut record)?;
    store.save(user, &record).await?;
    Ok(out)
}
