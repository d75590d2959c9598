//! `remindly tasks`: List a user's tasks.

use chrono::SecondsFormat;
use remindly_core::store::{Store, UserId};
use remindly_core::task::Task;
use std::path::Path;

use crate::runtime::{self, CliResult};

pub async fn run(config_path: Option<&Path>, user: &str, all: bool) -> CliResult<()> {
    let config = runtime::load_config(config_path)?;
    let store = runtime::build_store(&config);
    let record = store.load(&UserId::from(user)).await?;

    let mut tasks: Vec<&Task> = record
        .tasks
        .iter()
        .filter(|t| all || !t.status.is_terminal())
        .collect();
    tasks.sort_by_key(|t| t.ping_at);

    if tasks.is_empty() {
        println!("  No {}tasks for {user}.", if all { "" } else { "open " });
        return Ok(());
    }

    println!("  {:<18} {:<10} {:<6} {:<21} NAME", "STATUS", "ID", "LEVEL", "PING");
    for task in tasks {
        let mut name = task.name.clone();
        if task.postpone_count > 0 {
            name.push_str(&format!(" (postponed {}x)", task.postpone_count));
        }
        if let Some(due) = task.due_at {
            name.push_str(&format!(" [due {}]", due.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        println!(
            "  {:<18} {:<10} {:<6} {:<21} {}",
            task.status.as_str(),
            short_id(&task.id),
            task.annoyance.as_str(),
            task.ping_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            name
        );
    }
    Ok(())
}

pub(crate) fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
