//! `remindly doctor`: Diagnose config, store and provider.

use remindly_config::AppConfig;
use remindly_core::provider::Provider;
use remindly_core::recurrence::Recurrence;
use remindly_core::store::Store;
use std::path::Path;

use crate::runtime::{self, CliResult};

pub async fn run(config_path: Option<&Path>) -> CliResult<()> {
    println!("🩺 Remindly Doctor — System Diagnostics");
    println!("=======================================\n");

    let mut issues = 0;

    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_path);
    if path.exists() {
        println!("  ✅ Config file found: {}", path.display());
    } else {
        println!("  ⚠️  No config file at {} — run `remindly onboard`", path.display());
        issues += 1;
    }

    let config = match runtime::load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ {e}");
            println!("\n  ⚠️  Cannot continue without a valid config.");
            return Ok(());
        }
    };

    let has_key = config.has_api_key() || config.providers.values().any(|p| p.api_key.is_some());
    if has_key {
        println!("  ✅ API key configured");
    } else {
        println!("  ⚠️  No API key configured — set REMINDLY_API_KEY or api_key in the config");
        issues += 1;
    }

    let store = runtime::build_store(&config);
    match store.users().await {
        Ok(users) => {
            println!("  ✅ Store '{}' readable ({} users)", store.name(), users.len());
            for user in users {
                let record = match store.load(&user).await {
                    Ok(record) => record,
                    Err(e) => {
                        println!("  ❌ Record for {user} unreadable: {e}");
                        issues += 1;
                        continue;
                    }
                };
                for routine in &record.routines {
                    if let Err(e) = Recurrence::parse(&routine.recurrence) {
                        println!("  ⚠️  {user}: routine '{}' never fires: {e}", routine.name);
                        issues += 1;
                    }
                }
            }
        }
        Err(e) => {
            println!("  ❌ Store unreadable: {e}");
            issues += 1;
        }
    }

    if has_key {
        let provider = runtime::build_provider(&config)?;
        match provider.health_check().await {
            Ok(true) => println!("  ✅ Provider '{}' reachable", provider.name()),
            Ok(false) => {
                println!("  ⚠️  Provider '{}' answered but reported unhealthy", provider.name());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Provider '{}' unreachable: {e}", provider.name());
                issues += 1;
            }
        }
    }

    if config.lookups.is_empty() {
        println!("  ℹ️  No lookups configured");
    } else {
        let mut names: Vec<&str> = config.lookups.keys().map(String::as_str).collect();
        names.sort_unstable();
        println!("  ✅ Lookups: {}", names.join(", "));
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
