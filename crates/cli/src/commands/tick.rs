//! `remindly tick`: Run one scheduler tick and print the report.

use std::path::Path;

use crate::runtime::{self, CliResult, Runtime};

pub async fn run(config_path: Option<&Path>) -> CliResult<()> {
    let config = runtime::load_config(config_path)?;
    runtime::require_api_key(&config, config_path)?;
    let runtime = Runtime::build(config)?;

    let report = runtime.scheduler.run_tick().await;
    runtime.console.end_line()?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
