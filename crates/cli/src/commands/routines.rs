//! `remindly routines`: List a user's routines.

use remindly_core::recurrence::Recurrence;
use remindly_core::store::{Store, UserId};
use std::path::Path;

use crate::commands::tasks::short_id;
use crate::runtime::{self, CliResult};

pub async fn run(config_path: Option<&Path>, user: &str) -> CliResult<()> {
    let config = runtime::load_config(config_path)?;
    let store = runtime::build_store(&config);
    let record = store.load(&UserId::from(user)).await?;

    if record.routines.is_empty() {
        println!("  No routines for {user}.");
        return Ok(());
    }

    println!(
        "  {:<10} {:<16} {:<7} {:<10} {:<9} NAME",
        "ID", "RECURRENCE", "STATE", "DONE/FAIL", "CONFIRM"
    );
    for routine in &record.routines {
        let state = match (routine.is_active, Recurrence::parse(&routine.recurrence)) {
            (_, Err(_)) => "invalid",
            (true, Ok(_)) => "active",
            (false, Ok(_)) => "paused",
        };
        println!(
            "  {:<10} {:<16} {:<7} {:<10} {:<9} {}",
            short_id(&routine.id),
            routine.recurrence,
            state,
            format!("{}/{}", routine.stats.completed, routine.stats.failed),
            if routine.requires_action { "yes" } else { "no" },
            routine.name
        );
    }
    Ok(())
}
