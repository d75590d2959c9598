//! Task actions.

use chrono::{DateTime, Utc};
use remindly_core::cadence::CadencePolicy;
use remindly_core::error::{RecordKind, ToolError};
use remindly_core::store::UserRecord;
use remindly_core::task::{Annoyance, Task, TaskStatus};
use remindly_core::tool::ToolContext;
use serde_json::{Value, json};
use tracing::info;

use crate::args::{self, Args};

const TASK_ID_SCHEMA: &str = "Id of the task, as returned by create_task or list_tasks";

fn find_task<'a>(record: &'a mut UserRecord, id: &str) -> Result<&'a mut Task, ToolError> {
    record
        .task_mut(id)
        .ok_or_else(|| ToolError::not_found(RecordKind::Task, id))
}

fn transition_error(e: remindly_core::task::TransitionError) -> ToolError {
    ToolError::invalid("task_id", e.to_string())
}

/// `{task_id}`: shared by get, complete and delete.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskIdArgs {
    pub task_id: String,
}

impl TaskIdArgs {
    pub fn parse(args: &Args) -> Result<Self, ToolError> {
        Ok(Self {
            task_id: args::required_str(args, "task_id")?,
        })
    }

    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": { "task_id": { "type": "string", "description": TASK_ID_SCHEMA } },
            "required": ["task_id"]
        })
    }

    pub fn get(self, record: &mut UserRecord) -> Result<Value, ToolError> {
        let task = find_task(record, &self.task_id)?;
        Ok(json!({ "task": task }))
    }

    pub fn complete(self, record: &mut UserRecord) -> Result<Value, ToolError> {
        let task = find_task(record, &self.task_id)?;
        task.complete().map_err(transition_error)?;
        let task = task.clone();

        if let Some(routine) = task.routine_id.as_deref().and_then(|id| record.routine_mut(id)) {
            routine.stats.completed += 1;
        }
        info!(task_id = %task.id, name = %task.name, "Task completed");
        Ok(json!({ "task": task }))
    }

    pub fn delete(self, record: &mut UserRecord) -> Result<Value, ToolError> {
        let before = record.tasks.len();
        record.tasks.retain(|t| t.id != self.task_id);
        if record.tasks.len() == before {
            return Err(ToolError::not_found(RecordKind::Task, self.task_id));
        }
        info!(task_id = %self.task_id, "Task deleted");
        Ok(json!({ "deleted": self.task_id }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTaskArgs {
    pub name: String,
    pub ping_at: Option<DateTime<Utc>>,
    pub due_at: Option<DateTime<Utc>>,
    pub requires_action: bool,
    pub annoyance: Annoyance,
}

impl CreateTaskArgs {
    pub fn parse(args: &Args) -> Result<Self, ToolError> {
        Ok(Self {
            name: args::required_str(args, "name")?,
            ping_at: args::optional_datetime(args, "ping_at")?,
            due_at: args::optional_datetime(args, "due_at")?,
            requires_action: args::optional_bool(args, "requires_action")?.unwrap_or(false),
            annoyance: args::optional_enum(args, "annoyance")?.unwrap_or_default(),
        })
    }

    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Short description of the reminder" },
                "ping_at": { "type": "string", "format": "date-time", "description": "When to remind (RFC 3339). Defaults to due_at, else a delay based on annoyance" },
                "due_at": { "type": "string", "format": "date-time", "description": "Hard deadline (RFC 3339)" },
                "requires_action": { "type": "boolean", "description": "true if the user must confirm doing it; false for a plain heads-up", "default": false },
                "annoyance": { "type": "string", "enum": ["low", "med", "high"], "default": "med", "description": "How persistently to re-ping" }
            },
            "required": ["name"]
        })
    }

    pub fn apply(self, record: &mut UserRecord, ctx: &ToolContext, cadence: &CadencePolicy) -> Result<Value, ToolError> {
        let ping_at = self
            .ping_at
            .or(self.due_at)
            .unwrap_or_else(|| cadence.jittered(self.annoyance, ctx.now));

        let mut task = Task::new(self.name, ping_at, ctx.now);
        task.due_at = self.due_at;
        task.requires_action = self.requires_action;
        task.annoyance = self.annoyance;

        info!(task_id = %task.id, name = %task.name, ping_at = %task.ping_at, "Task created");
        let out = json!({ "task": task });
        record.tasks.push(task);
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListTasksArgs {
    pub status: Option<TaskStatus>,
}

impl ListTasksArgs {
    pub fn parse(args: &Args) -> Result<Self, ToolError> {
        Ok(Self {
            status: args::optional_enum(args, "status")?,
        })
    }

    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "status": { "type": "string", "enum": ["pending", "needs_replanning", "completed", "failed"], "description": "Only tasks in this status" }
            }
        })
    }

    pub fn apply(self, record: &UserRecord) -> Result<Value, ToolError> {
        let mut tasks: Vec<&Task> = record
            .tasks
            .iter()
            .filter(|t| self.status.is_none_or(|s| t.status == s))
            .collect();
        tasks.sort_by_key(|t| t.ping_at);
        Ok(json!({ "count": tasks.len(), "tasks": tasks }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateTaskArgs {
    pub task_id: String,
    pub name: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub requires_action: Option<bool>,
    pub annoyance: Option<Annoyance>,
}

impl UpdateTaskArgs {
    pub fn parse(args: &Args) -> Result<Self, ToolError> {
        Ok(Self {
            task_id: args::required_str(args, "task_id")?,
            name: args::optional_str(args, "name")?,
            due_at: args::optional_datetime(args, "due_at")?,
            requires_action: args::optional_bool(args, "requires_action")?,
            annoyance: args::optional_enum(args, "annoyance")?,
        })
    }

    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "task_id": { "type": "string", "description": TASK_ID_SCHEMA },
                "name": { "type": "string" },
                "due_at": { "type": "string", "format": "date-time" },
                "requires_action": { "type": "boolean" },
                "annoyance": { "type": "string", "enum": ["low", "med", "high"] }
            },
            "required": ["task_id"]
        })
    }

    pub fn apply(self, record: &mut UserRecord) -> Result<Value, ToolError> {
        let task = find_task(record, &self.task_id)?;
        if task.status.is_terminal() {
            return Err(ToolError::invalid(
                "task_id",
                format!("task is {} and can no longer be edited", task.status),
            ));
        }
        if let Some(name) = self.name {
            task.name = name;
        }
        if let Some(due_at) = self.due_at {
            task.due_at = Some(due_at);
        }
        if let Some(requires_action) = self.requires_action {
            task.requires_action = requires_action;
        }
        if let Some(annoyance) = self.annoyance {
            task.annoyance = annoyance;
        }
        Ok(json!({ "task": task }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RescheduleTaskArgs {
    pub task_id: String,
    pub ping_at: Option<DateTime<Utc>>,
}

impl RescheduleTaskArgs {
    pub fn parse(args: &Args) -> Result<Self, ToolError> {
        Ok(Self {
            task_id: args::required_str(args, "task_id")?,
            ping_at: args::optional_datetime(args, "ping_at")?,
        })
    }

    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "task_id": { "type": "string", "description": TASK_ID_SCHEMA },
                "ping_at": { "type": "string", "format": "date-time", "description": "Exact next reminder time (RFC 3339). Omit to let the task's annoyance level decide" }
            },
            "required": ["task_id"]
        })
    }

    pub fn apply(self, record: &mut UserRecord, ctx: &ToolContext, cadence: &CadencePolicy) -> Result<Value, ToolError> {
        let task = find_task(record, &self.task_id)?;
        let ping_at = match self.ping_at {
            Some(explicit) => explicit,
            None => cadence.jittered(task.annoyance, ctx.now.max(task.ping_at)),
        };
        task.reschedule(ping_at).map_err(transition_error)?;

        info!(
            task_id = %task.id,
            ping_at = %task.ping_at,
            postpone_count = task.postpone_count,
            "Task rescheduled"
        );
        Ok(json!({ "task": task }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailTaskArgs {
    pub task_id: String,
    pub reason: Option<String>,
}

impl FailTaskArgs {
    pub fn parse(args: &Args) -> Result<Self, ToolError> {
        Ok(Self {
            task_id: args::required_str(args, "task_id")?,
            reason: args::optional_str(args, "reason")?,
        })
    }

    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "task_id": { "type": "string", "description": TASK_ID_SCHEMA },
                "reason": { "type": "string", "description": "Why it won't get done" }
            },
            "required": ["task_id"]
        })
    }

    pub fn apply(self, record: &mut UserRecord) -> Result<Value, ToolError> {
        let task = find_task(record, &self.task_id)?;
        task.fail().map_err(transition_error)?;
        let task = task.clone();

        if let Some(routine) = task.routine_id.as_deref().and_then(|id| record.routine_mut(id)) {
            routine.stats.failed += 1;
        }
        info!(
            task_id = %task.id,
            name = %task.name,
            reason = self.reason.as_deref().unwrap_or("-"),
            "Task failed"
        );
        Ok(json!({ "task": task, "reason": self.reason }))
    }
}
