//! `remindly daemon`: Scheduler driver plus console chat.

use remindly_core::store::UserId;
use std::path::Path;
use tracing::info;

use crate::commands::chat;
use crate::runtime::{self, CliResult, Runtime};

pub async fn run(config_path: Option<&Path>, user: &str) -> CliResult<()> {
    let config = runtime::load_config(config_path)?;
    runtime::require_api_key(&config, config_path)?;
    let runtime = Runtime::build(config)?;
    let user = UserId::from(user);

    println!("Remindly Daemon — Starting");
    println!("   Store:     {:?} ({})", runtime.config.store.backend, runtime.config.store.path.display());
    println!(
        "   Scheduler: {}",
        if runtime.config.scheduler.enabled {
            format!("every {}s", runtime.config.scheduler.tick_interval_secs)
        } else {
            "disabled".to_string()
        }
    );
    println!("   Lookups:   {}", runtime.config.lookups.len());

    let driver = runtime
        .config
        .scheduler
        .enabled
        .then(|| runtime.scheduler.clone().start());
    info!(enabled = driver.is_some(), "Scheduler driver started");

    chat::banner(&runtime, &user);
    let result = chat::interactive(&runtime, &user).await;

    if let Some(handle) = driver {
        handle.abort();
        info!("Scheduler driver stopped");
    }
    result
}
