//! Routine actions.

use chrono::{DateTime, Utc};
use remindly_core::error::{RecordKind, ToolError};
use remindly_core::recurrence::Recurrence;
use remindly_core::store::UserRecord;
use remindly_core::task::{Annoyance, Routine};
use remindly_core::tool::ToolContext;
use serde_json::{Value, json};
use tracing::info;

use crate::args::{self, Args};

const RECURRENCE_HELP: &str = "5-field cron in UTC: minute hour day-of-month month day-of-week, e.g. '30 7 * * 1-5'";

fn parse_recurrence(raw: String) -> Result<String, ToolError> {
    Recurrence::parse(&raw).map_err(|e| ToolError::invalid("recurrence", e.reason))?;
    Ok(raw)
}

fn next_fire(routine: &Routine, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Recurrence::parse(&routine.recurrence)
        .ok()
        .and_then(|r| r.next_fire_after(now))
}

fn view(routine: &Routine, now: DateTime<Utc>) -> Value {
    json!({ "routine": routine, "next_fire_at": next_fire(routine, now) })
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateRoutineArgs {
    pub name: String,
    pub recurrence: String,
    pub default_annoyance: Annoyance,
    pub requires_action: bool,
    pub is_active: bool,
}

impl CreateRoutineArgs {
    pub fn parse(args: &Args) -> Result<Self, ToolError> {
        Ok(Self {
            name: args::required_str(args, "name")?,
            recurrence: parse_recurrence(args::required_str(args, "recurrence")?)?,
            default_annoyance: args::optional_enum(args, "default_annoyance")?.unwrap_or_default(),
            requires_action: args::optional_bool(args, "requires_action")?.unwrap_or(false),
            is_active: args::optional_bool(args, "is_active")?.unwrap_or(true),
        })
    }

    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "What each generated task is called" },
                "recurrence": { "type": "string", "description": RECURRENCE_HELP },
                "default_annoyance": { "type": "string", "enum": ["low", "med", "high"], "default": "med" },
                "requires_action": { "type": "boolean", "default": false },
                "is_active": { "type": "boolean", "default": true }
            },
            "required": ["name", "recurrence"]
        })
    }

    pub fn apply(self, record: &mut UserRecord, ctx: &ToolContext) -> Result<Value, ToolError> {
        let mut routine = Routine::new(self.name, self.recurrence, ctx.now);
        routine.default_annoyance = self.default_annoyance;
        routine.requires_action = self.requires_action;
        routine.is_active = self.is_active;

        info!(routine_id = %routine.id, name = %routine.name, recurrence = %routine.recurrence, "Routine created");
        let out = view(&routine, ctx.now);
        record.routines.push(routine);
        Ok(out)
    }
}

pub fn list_routines_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

pub fn list_routines(record: &UserRecord, ctx: &ToolContext) -> Result<Value, ToolError> {
    let routines: Vec<Value> = record.routines.iter().map(|r| view(r, ctx.now)).collect();
    Ok(json!({ "count": routines.len(), "routines": routines }))
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRoutineArgs {
    pub routine_id: String,
    pub name: Option<String>,
    pub recurrence: Option<String>,
    pub default_annoyance: Option<Annoyance>,
    pub requires_action: Option<bool>,
    pub is_active: Option<bool>,
}

impl UpdateRoutineArgs {
    pub fn parse(args: &Args) -> Result<Self, ToolError> {
        Ok(Self {
            routine_id: args::required_str(args, "routine_id")?,
            name: args::optional_str(args, "name")?,
            recurrence: args::optional_str(args, "recurrence")?
                .map(parse_recurrence)
                .transpose()?,
            default_annoyance: args::optional_enum(args, "default_annoyance")?,
            requires_action: args::optional_bool(args, "requires_action")?,
            is_active: args::optional_bool(args, "is_active")?,
        })
    }

    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "routine_id": { "type": "string" },
                "name": { "type": "string" },
                "recurrence": { "type": "string", "description": RECURRENCE_HELP },
                "default_annoyance": { "type": "string", "enum": ["low", "med", "high"] },
                "requires_action": { "type": "boolean" },
                "is_active": { "type": "boolean", "description": "false pauses the routine" }
            },
            "required": ["routine_id"]
        })
    }

    pub fn apply(self, record: &mut UserRecord, ctx: &ToolContext) -> Result<Value, ToolError> {
        let routine = record
            .routine_mut(&self.routine_id)
            .ok_or_else(|| ToolError::not_found(RecordKind::Routine, &self.routine_id))?;
        if let Some(name) = self.name {
            routine.name = name;
        }
        if let Some(recurrence) = self.recurrence {
            routine.recurrence = recurrence;
        }
        if let Some(annoyance) = self.default_annoyance {
            routine.default_annoyance = annoyance;
        }
        if let Some(requires_action) = self.requires_action {
            routine.requires_action = requires_action;
        }
        if let Some(is_active) = self.is_active {
            routine.is_active = is_active;
        }
        Ok(view(routine, ctx.now))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutineIdArgs {
    pub routine_id: String,
}

impl RoutineIdArgs {
    pub fn parse(args: &Args) -> Result<Self, ToolError> {
        Ok(Self {
            routine_id: args::required_str(args, "routine_id")?,
        })
    }

    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": { "routine_id": { "type": "string" } },
            "required": ["routine_id"]
        })
    }

    /// Tasks already spawned by the routine stay, with a dangling `routine_id`.
    pub fn delete(self, record: &mut UserRecord) -> Result<Value, ToolError> {
        let before = record.routines.len();
        record.routines.retain(|r| r.id != self.routine_id);
        if record.routines.len() == before {
            return Err(ToolError::not_found(RecordKind::Routine, self.routine_id));
        }
        info!(routine_id = %self.routine_id, "Routine deleted");
        Ok(json!({ "deleted": self.routine_id }))
    }
}
