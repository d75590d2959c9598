//! Memory and goal actions.

use remindly_core::error::{RecordKind, ToolError};
use remindly_core::store::UserRecord;
use serde_json::{Value, json};

use crate::args::{self, Args};

#[derive(Debug, Clone, PartialEq)]
pub struct RememberArgs {
    pub key: String,
    pub value: String,
}

impl RememberArgs {
    pub fn parse(args: &Args) -> Result<Self, ToolError> {
        Ok(Self {
            key: args::required_str(args, "key")?,
            value: args::required_str(args, "value")?,
        })
    }

    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "key": { "type": "string", "description": "Short topic, e.g. 'coffee order' or 'gym days'" },
                "value": { "type": "string", "description": "What to remember; replaces any earlier value" }
            },
            "required": ["key", "value"]
        })
    }

    pub fn apply(self, record: &mut UserRecord) -> Result<Value, ToolError> {
        let previous = record.memory.insert(self.key.clone(), self.value.clone());
        Ok(json!({ "key": self.key, "value": self.value, "replaced": previous }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForgetArgs {
    pub key: String,
}

impl ForgetArgs {
    pub fn parse(args: &Args) -> Result<Self, ToolError> {
        Ok(Self {
            key: args::required_str(args, "key")?,
        })
    }

    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": { "key": { "type": "string" } },
            "required": ["key"]
        })
    }

    pub fn apply(self, record: &mut UserRecord) -> Result<Value, ToolError> {
        match record.memory.remove(&self.key) {
            Some(value) => Ok(json!({ "forgotten": self.key, "value": value })),
            None => Err(ToolError::not_found(RecordKind::Memory, self.key)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetGoalArgs {
    pub goal: String,
}

impl SetGoalArgs {
    pub fn parse(args: &Args) -> Result<Self, ToolError> {
        Ok(Self {
            goal: args::required_str(args, "goal")?,
        })
    }

    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": { "goal": { "type": "string", "description": "The user's current overarching goal" } },
            "required": ["goal"]
        })
    }

    pub fn apply(self, record: &mut UserRecord) -> Result<Value, ToolError> {
        let previous = record.goal.replace(self.goal.clone());
        Ok(json!({ "goal": self.goal, "replaced": previous }))
    }
}

pub fn clear_goal_schema() -> Value {
    json!({ "type": "object", "properties": {} })
}

pub fn clear_goal(record: &mut UserRecord) -> Result<Value, ToolError> {
    Ok(json!({ "cleared": record.goal.take() }))
}
