//! `remindly onboard`: First-time setup.

use remindly_config::AppConfig;
use std::path::Path;

use crate::runtime::CliResult;

pub async fn run(config_path: Option<&Path>) -> CliResult<()> {
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_path);

    println!("Remindly — First-Time Setup");
    println!("===========================\n");

    if let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if dir.exists() {
            println!("  Config directory exists: {}", dir.display());
        } else {
            std::fs::create_dir_all(dir)?;
            println!("✅ Created config directory: {}", dir.display());
        }
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete it and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Created config at: {}", config_path.display());

    let store_dir = AppConfig::default().store.path;
    if !store_dir.exists() {
        std::fs::create_dir_all(&store_dir)?;
        println!("✅ Created store directory: {}", store_dir.display());
    }

    println!("\n📝 Next steps:");
    println!("   1. Add your api_key to {} (or set REMINDLY_API_KEY)", config_path.display());
    println!("   2. Run: remindly chat");
    println!("   3. Run: remindly daemon  (to get reminders when they are due)\n");

    Ok(())
}
