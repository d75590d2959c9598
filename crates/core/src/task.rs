//! Routines, tasks, and the task status state machine.
//!
//! ```text
//! pending ──ping reached, !requires_action──▶ completed
//! pending ──ping reached,  requires_action──▶ needs_replanning
//! needs_replanning ──reschedule──▶ pending (postpone_count + 1)
//! pending | needs_replanning ──complete──▶ completed
//! pending | needs_replanning ──fail──────▶ failed
//! ```
//!
//! `completed` and `failed` are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Urgency tier controlling the re-ping cadence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Annoyance {
    Low,
    #[default]
    Med,
    High,
}

impl Annoyance {
    pub const ALL: [Annoyance; 3] = [Annoyance::Low, Annoyance::Med, Annoyance::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Annoyance::Low => "low",
            Annoyance::Med => "med",
            Annoyance::High => "high",
        }
    }
}

impl std::fmt::Display for Annoyance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Annoyance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Annoyance::Low),
            "med" => Ok(Annoyance::Med),
            "high" => Ok(Annoyance::High),
            other => Err(format!("expected one of low, med, high; got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    NeedsReplanning,
    Completed,
    Failed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::NeedsReplanning,
        TaskStatus::Completed,
        TaskStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::NeedsReplanning => "needs_replanning",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                format!("expected one of pending, needs_replanning, completed, failed; got '{s}'")
            })
    }
}

/// A transition the state machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot {action} a task that is {from}")]
pub struct TransitionError {
    pub from: TaskStatus,
    pub action: &'static str,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineStats {
    pub completed: u32,
    pub failed: u32,
}

/// A recurring template that spawns tasks on a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    pub id: String,
    pub name: String,
    /// 5-field cron expression, see [`crate::recurrence::Recurrence`]
    pub recurrence: String,
    #[serde(default)]
    pub default_annoyance: Annoyance,
    #[serde(default)]
    pub requires_action: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub stats: RoutineStats,
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl Routine {
    pub fn new(name: impl Into<String>, recurrence: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            recurrence: recurrence.into(),
            default_annoyance: Annoyance::default(),
            requires_action: false,
            is_active: true,
            stats: RoutineStats::default(),
            created_at,
        }
    }
}

/// A single reminder instance, optionally spawned by a routine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    /// Back-reference only; the routine may have been deleted since.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routine_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    pub ping_at: DateTime<Utc>,
    #[serde(default)]
    pub requires_action: bool,
    #[serde(default)]
    pub annoyance: Annoyance,
    pub status: TaskStatus,
    #[serde(default)]
    pub postpone_count: u32,
    pub created_at: DateTime<Utc>,
    /// The routine firing instant this task materializes, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurrence: Option<DateTime<Utc>>,
}

impl Task {
    /// A new ad hoc task.
    pub fn new(name: impl Into<String>, ping_at: DateTime<Utc>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            routine_id: None,
            due_at: None,
            ping_at,
            requires_action: false,
            annoyance: Annoyance::default(),
            status: TaskStatus::Pending,
            postpone_count: 0,
            created_at,
            occurrence: None,
        }
    }

    /// The task a routine materializes when it fires at `occurrence`.
    pub fn from_routine(routine: &Routine, occurrence: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let mut task = Task::new(routine.name.clone(), now, now);
        task.routine_id = Some(routine.id.clone());
        task.requires_action = routine.requires_action;
        task.annoyance = routine.default_annoyance;
        task.occurrence = Some(occurrence);
        task
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Pending && self.ping_at <= now
    }

    fn ensure_open(&self, action: &'static str) -> Result<(), TransitionError> {
        match self.status {
            TaskStatus::Pending | TaskStatus::NeedsReplanning => Ok(()),
            from => Err(TransitionError { from, action }),
        }
    }

    /// The ping instant has been reached. Returns the new status.
    pub fn mark_due(&mut self) -> Result<TaskStatus, TransitionError> {
        if self.status != TaskStatus::Pending {
            return Err(TransitionError {
                from: self.status,
                action: "ping",
            });
        }
        self.status = if self.requires_action {
            TaskStatus::NeedsReplanning
        } else {
            TaskStatus::Completed
        };
        Ok(self.status)
    }

    pub fn reschedule(&mut self, ping_at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.ensure_open("reschedule")?;
        self.ping_at = ping_at;
        self.status = TaskStatus::Pending;
        self.postpone_count += 1;
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), TransitionError> {
        self.ensure_open("complete")?;
        self.status = TaskStatus::Completed;
        Ok(())
    }

    pub fn fail(&mut self) -> Result<(), TransitionError> {
        self.ensure_open("fail")?;
        self.status = TaskStatus::Failed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    }

    #[test]
    fn informational_task_completes_when_due() {
        let mut task = Task::new("stretch", t0(), t0());
        assert!(task.is_due(t0()));
        assert_eq!(task.mark_due().unwrap(), TaskStatus::Completed);
        assert_eq!(task.postpone_count, 0);
    }

    #[test]
    fn actionable_task_needs_replanning_when_due() {
        let mut task = Task::new("pay rent", t0(), t0());
        task.requires_action = true;
        assert_eq!(task.mark_due().unwrap(), TaskStatus::NeedsReplanning);
        assert!(!task.is_due(t0() + Duration::hours(1)));
    }

    #[test]
    fn reschedule_returns_to_pending_and_counts() {
        let mut task = Task::new("pay rent", t0(), t0());
        task.requires_action = true;
        task.mark_due().unwrap();

        let later = t0() + Duration::minutes(45);
        task.reschedule(later).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.ping_at, later);
        assert_eq!(task.postpone_count, 1);
    }

    #[test]
    fn terminal_states_reject_transitions() {
        let mut task = Task::new("call mom", t0(), t0());
        task.fail().unwrap();
        let err = task.reschedule(t0()).unwrap_err();
        assert_eq!(err.from, TaskStatus::Failed);
        assert_eq!(err.to_string(), "cannot reschedule a task that is failed");
        assert!(task.complete().is_err());
        assert!(task.mark_due().is_err());
    }

    #[test]
    fn routine_task_inherits_defaults() {
        let mut routine = Routine::new("water plants", "0 9 * * *", t0());
        routine.default_annoyance = Annoyance::High;
        routine.requires_action = true;

        let now = t0() + Duration::seconds(20);
        let task = Task::from_routine(&routine, t0(), now);
        assert_eq!(task.routine_id.as_deref(), Some(routine.id.as_str()));
        assert_eq!(task.ping_at, now);
        assert_eq!(task.occurrence, Some(t0()));
        assert_eq!(task.annoyance, Annoyance::High);
        assert!(task.requires_action);
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn enums_parse_their_wire_names() {
        assert_eq!("high".parse::<Annoyance>().unwrap(), Annoyance::High);
        assert!("urgent".parse::<Annoyance>().is_err());
        assert_eq!(
            "needs_replanning".parse::<TaskStatus>().unwrap(),
            TaskStatus::NeedsReplanning
        );
        let json = serde_json::to_string(&TaskStatus::NeedsReplanning).unwrap();
        assert_eq!(json, "\"needs_replanning\"");
    }
}
