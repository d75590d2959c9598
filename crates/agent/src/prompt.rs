//! System prompt assembly and the synthetic scheduler prompts.

use chrono::{DateTime, SecondsFormat, Utc};
use remindly_config::AgentConfig;
use remindly_core::store::UserRecord;
use remindly_core::task::Task;
use std::fmt::Write;

fn stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn persona(config: &AgentConfig) -> String {
    format!(
        "You are {}, a personal reminder assistant. You keep track of the user's tasks and \
         routines and nudge them when something is due.\n\
         - Use the tools to create, reschedule, complete or fail tasks. Never claim a change \
         you did not make with a tool call.\n\
         - Timestamps you pass to tools are RFC 3339. Work out exact times yourself from the \
         current time below.\n\
         - Leave ping_at out when rescheduling unless the user asked for a specific time; the \
         task's annoyance level picks a sensible delay.\n\
         - Keep replies short, warm and plain text.",
        config.name
    )
}

/// Persona, clock, goal, memory, open tasks and routines, in that order.
pub fn system_prompt(config: &AgentConfig, record: &UserRecord, now: DateTime<Utc>) -> String {
    let mut prompt = match &config.system_prompt_override {
        Some(custom) => custom.clone(),
        None => persona(config),
    };

    let _ = write!(prompt, "\n\n## Now\n{} (UTC)", stamp(now));
    if let Some(note) = &config.timezone_note {
        let _ = write!(prompt, "\n{note}");
    }

    if let Some(goal) = &record.goal {
        let _ = write!(prompt, "\n\n## User's goal\n{goal}");
    }

    if !record.memory.is_empty() {
        prompt.push_str("\n\n## Things to remember");
        for (key, value) in &record.memory {
            let _ = write!(prompt, "\n- {key}: {value}");
        }
    }

    let mut open: Vec<&Task> = record.open_tasks().collect();
    if open.is_empty() {
        prompt.push_str("\n\n## Open tasks\n(none)");
    } else {
        open.sort_by_key(|t| t.ping_at);
        prompt.push_str("\n\n## Open tasks");
        for task in open {
            let _ = write!(prompt, "\n- {}", task_line(task));
        }
    }

    if !record.routines.is_empty() {
        prompt.push_str("\n\n## Routines");
        for routine in &record.routines {
            let _ = write!(
                prompt,
                "\n- [{}] {} `{}` {}{}",
                routine.id,
                routine.name,
                routine.recurrence,
                if routine.is_active { "active" } else { "paused" },
                if routine.requires_action { ", needs confirmation" } else { "" },
            );
        }
    }

    prompt
}

fn task_line(task: &Task) -> String {
    let mut line = format!(
        "[{}] {} ({}, {}, ping {}",
        task.id,
        task.name,
        task.status,
        task.annoyance,
        stamp(task.ping_at)
    );
    if let Some(due) = task.due_at {
        let _ = write!(line, ", due {}", stamp(due));
    }
    if task.postpone_count > 0 {
        let _ = write!(line, ", postponed {}x", task.postpone_count);
    }
    line.push(')');
    line
}

/// Prompt for a task that needed no confirmation and is now done.
pub fn notice_prompt(task: &Task) -> String {
    format!(
        "Scheduled reminder: \"{}\" (task {}) is due now. It needs no confirmation and has been \
         marked done. Send the user one short, friendly reminder about it.",
        task.name, task.id
    )
}

/// Prompt for a task that needs a decision.
pub fn replan_prompt(task: &Task) -> String {
    let mut prompt = format!(
        "Scheduled reminder: \"{}\" (task {}) is due now and needs the user's attention.",
        task.name, task.id
    );
    if let Some(due) = task.due_at {
        let _ = write!(prompt, " Hard deadline: {}.", stamp(due));
    }
    if task.postpone_count > 0 {
        let _ = write!(prompt, " It has already been postponed {} times.", task.postpone_count);
    }
    prompt.push_str(
        " Remind the user, then call exactly one of reschedule_task or fail_task for this task. \
         Reschedule without ping_at unless a specific time makes sense.",
    );
    prompt
}
