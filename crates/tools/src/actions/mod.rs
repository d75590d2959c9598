//! Store actions: the tools that read and mutate a user's record.
//!
//! Dispatch is a closed table keyed by [`ActionName`]. Each variant of
//! [`Action`] owns a typed argument struct whose `parse` validates every
//! field before the store is touched; a validation or not-found failure
//! aborts the read-modify-write, so nothing is written.

pub mod profile;
pub mod routines;
pub mod tasks;

use async_trait::async_trait;
use remindly_core::cadence::CadencePolicy;
use remindly_core::error::ToolError;
use remindly_core::store::{Store, UserRecord, modify};
use remindly_core::tool::{Tool, ToolContext};
use serde_json::Value;
use std::sync::Arc;

use crate::args;
use profile::{ForgetArgs, RememberArgs, SetGoalArgs};
use routines::{CreateRoutineArgs, RoutineIdArgs, UpdateRoutineArgs};
use tasks::{CreateTaskArgs, FailTaskArgs, ListTasksArgs, RescheduleTaskArgs, TaskIdArgs, UpdateTaskArgs};

/// Every action the model may call, by wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionName {
    CreateTask,
    GetTask,
    ListTasks,
    UpdateTask,
    RescheduleTask,
    CompleteTask,
    FailTask,
    DeleteTask,
    CreateRoutine,
    ListRoutines,
    UpdateRoutine,
    DeleteRoutine,
    Remember,
    Forget,
    SetGoal,
    ClearGoal,
}

impl ActionName {
    pub const ALL: [ActionName; 16] = [
        ActionName::CreateTask,
        ActionName::GetTask,
        ActionName::ListTasks,
        ActionName::UpdateTask,
        ActionName::RescheduleTask,
        ActionName::CompleteTask,
        ActionName::FailTask,
        ActionName::DeleteTask,
        ActionName::CreateRoutine,
        ActionName::ListRoutines,
        ActionName::UpdateRoutine,
        ActionName::DeleteRoutine,
        ActionName::Remember,
        ActionName::Forget,
        ActionName::SetGoal,
        ActionName::ClearGoal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionName::CreateTask => "create_task",
            ActionName::GetTask => "get_task",
            ActionName::ListTasks => "list_tasks",
            ActionName::UpdateTask => "update_task",
            ActionName::RescheduleTask => "reschedule_task",
            ActionName::CompleteTask => "complete_task",
            ActionName::FailTask => "fail_task",
            ActionName::DeleteTask => "delete_task",
            ActionName::CreateRoutine => "create_routine",
            ActionName::ListRoutines => "list_routines",
            ActionName::UpdateRoutine => "update_routine",
            ActionName::DeleteRoutine => "delete_routine",
            ActionName::Remember => "remember",
            ActionName::Forget => "forget",
            ActionName::SetGoal => "set_goal",
            ActionName::ClearGoal => "clear_goal",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ActionName::CreateTask => "Create a one-off reminder task for the user.",
            ActionName::GetTask => "Fetch one task by id.",
            ActionName::ListTasks => "List the user's tasks, optionally filtered by status, ordered by next ping.",
            ActionName::UpdateTask => {
                "Edit an open task's name, deadline, requires_action flag or annoyance. Does not change when it pings; use reschedule_task for that."
            }
            ActionName::RescheduleTask => {
                "Push a pending or needs_replanning task to a later ping. Sets it back to pending and counts a postponement."
            }
            ActionName::CompleteTask => "Mark a task as done.",
            ActionName::FailTask => "Give up on a task; it will not be reminded again.",
            ActionName::DeleteTask => "Remove a task entirely, e.g. one created by mistake.",
            ActionName::CreateRoutine => "Create a recurring routine that spawns a task every time its schedule fires.",
            ActionName::ListRoutines => "List the user's routines with their next firing time.",
            ActionName::UpdateRoutine => "Edit a routine; set is_active=false to pause it.",
            ActionName::DeleteRoutine => "Delete a routine. Tasks it already created are kept.",
            ActionName::Remember => "Store a fact about the user under a short key.",
            ActionName::Forget => "Delete a remembered fact by key.",
            ActionName::SetGoal => "Set the user's current overarching goal.",
            ActionName::ClearGoal => "Clear the user's goal.",
        }
    }

    pub fn schema(&self) -> Value {
        match self {
            ActionName::CreateTask => CreateTaskArgs::schema(),
            ActionName::GetTask | ActionName::CompleteTask | ActionName::DeleteTask => TaskIdArgs::schema(),
            ActionName::ListTasks => ListTasksArgs::schema(),
            ActionName::UpdateTask => UpdateTaskArgs::schema(),
            ActionName::RescheduleTask => RescheduleTaskArgs::schema(),
            ActionName::FailTask => FailTaskArgs::schema(),
            ActionName::CreateRoutine => CreateRoutineArgs::schema(),
            ActionName::ListRoutines => routines::list_routines_schema(),
            ActionName::UpdateRoutine => UpdateRoutineArgs::schema(),
            ActionName::DeleteRoutine => RoutineIdArgs::schema(),
            ActionName::Remember => RememberArgs::schema(),
            ActionName::Forget => ForgetArgs::schema(),
            ActionName::SetGoal => SetGoalArgs::schema(),
            ActionName::ClearGoal => profile::clear_goal_schema(),
        }
    }

    /// Actions that never change the record; they skip the write-back.
    pub fn is_read_only(&self) -> bool {
        matches!(self, ActionName::GetTask | ActionName::ListTasks | ActionName::ListRoutines)
    }
}

impl std::fmt::Display for ActionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionName::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown action '{s}'"))
    }
}

/// A validated action, ready to apply to a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    CreateTask(CreateTaskArgs),
    GetTask(TaskIdArgs),
    ListTasks(ListTasksArgs),
    UpdateTask(UpdateTaskArgs),
    RescheduleTask(RescheduleTaskArgs),
    CompleteTask(TaskIdArgs),
    FailTask(FailTaskArgs),
    DeleteTask(TaskIdArgs),
    CreateRoutine(CreateRoutineArgs),
    ListRoutines,
    UpdateRoutine(UpdateRoutineArgs),
    DeleteRoutine(RoutineIdArgs),
    Remember(RememberArgs),
    Forget(ForgetArgs),
    SetGoal(SetGoalArgs),
    ClearGoal,
}

impl Action {
    /// Validate raw model arguments for `name`.
    pub fn parse(name: ActionName, arguments: &Value) -> Result<Self, ToolError> {
        let a = args::object(arguments)?;
        Ok(match name {
            ActionName::CreateTask => Action::CreateTask(CreateTaskArgs::parse(a)?),
            ActionName::GetTask => Action::GetTask(TaskIdArgs::parse(a)?),
            ActionName::ListTasks => Action::ListTasks(ListTasksArgs::parse(a)?),
            ActionName::UpdateTask => Action::UpdateTask(UpdateTaskArgs::parse(a)?),
            ActionName::RescheduleTask => Action::RescheduleTask(RescheduleTaskArgs::parse(a)?),
            ActionName::CompleteTask => Action::CompleteTask(TaskIdArgs::parse(a)?),
            ActionName::FailTask => Action::FailTask(FailTaskArgs::parse(a)?),
            ActionName::DeleteTask => Action::DeleteTask(TaskIdArgs::parse(a)?),
            ActionName::CreateRoutine => Action::CreateRoutine(CreateRoutineArgs::parse(a)?),
            ActionName::ListRoutines => Action::ListRoutines,
            ActionName::UpdateRoutine => Action::UpdateRoutine(UpdateRoutineArgs::parse(a)?),
            ActionName::DeleteRoutine => Action::DeleteRoutine(RoutineIdArgs::parse(a)?),
            ActionName::Remember => Action::Remember(RememberArgs::parse(a)?),
            ActionName::Forget => Action::Forget(ForgetArgs::parse(a)?),
            ActionName::SetGoal => Action::SetGoal(SetGoalArgs::parse(a)?),
            ActionName::ClearGoal => Action::ClearGoal,
        })
    }

    /// Apply to an in-memory record. The caller decides whether to persist.
    pub fn apply(self, record: &mut UserRecord, ctx: &ToolContext, cadence: &CadencePolicy) -> Result<Value, ToolError> {
        match self {
            Action::CreateTask(a) => a.apply(record, ctx, cadence),
            Action::GetTask(a) => a.get(record),
            Action::ListTasks(a) => a.apply(record),
            Action::UpdateTask(a) => a.apply(record),
            Action::RescheduleTask(a) => a.apply(record, ctx, cadence),
            Action::CompleteTask(a) => a.complete(record),
            Action::FailTask(a) => a.apply(record),
            Action::DeleteTask(a) => a.delete(record),
            Action::CreateRoutine(a) => a.apply(record, ctx),
            Action::ListRoutines => routines::list_routines(record, ctx),
            Action::UpdateRoutine(a) => a.apply(record, ctx),
            Action::DeleteRoutine(a) => a.delete(record),
            Action::Remember(a) => a.apply(record),
            Action::Forget(a) => a.apply(record),
            Action::SetGoal(a) => a.apply(record),
            Action::ClearGoal => profile::clear_goal(record),
        }
    }
}

/// Exposes one [`ActionName`] as a [`Tool`] bound to a store.
pub struct ActionTool {
    action: ActionName,
    store: Arc<dyn Store>,
    cadence: CadencePolicy,
}

impl ActionTool {
    pub fn new(action: ActionName, store: Arc<dyn Store>, cadence: CadencePolicy) -> Self {
        Self { action, store, cadence }
    }
}

#[async_trait]
impl Tool for ActionTool {
    fn name(&self) -> &str {
        self.action.as_str()
    }

    fn description(&self) -> &str {
        self.action.description()
    }

    fn parameters_schema(&self) -> Value {
        self.action.schema()
    }

    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let action = Action::parse(self.action, &arguments)?;

        if self.action.is_read_only() {
            let mut record = self.store.load(&ctx.user).await?;
            return action.apply(&mut record, ctx, &self.cadence);
        }

        modify(self.store.as_ref(), &ctx.user, |record| {
            action.apply(record, ctx, &self.cadence)
        })
        .await
    }
}
