//! Remindly CLI: the main entry point.
//!
//! Commands:
//! - `onboard`  : Write the default config
//! - `chat`     : Interactive or single-message chat
//! - `tick`     : Run one scheduler tick and print the report
//! - `daemon`   : Scheduler driver plus console chat
//! - `tasks`    : List a user's tasks
//! - `routines` : List a user's routines
//! - `doctor`   : Diagnose config, store and provider

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod runtime;

/// Console user when `--user` is not given.
pub const DEFAULT_USER: &str = "local";

#[derive(Parser)]
#[command(
    name = "remindly",
    about = "Remindly — a personal reminder assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.remindly/config.toml
    #[arg(short, long, global = true, env = "REMINDLY_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration
    Onboard,

    /// Chat with the assistant
    Chat {
        /// User to chat as
        #[arg(short, long, default_value = DEFAULT_USER)]
        user: String,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Run one scheduler tick now
    Tick,

    /// Run the scheduler and chat on the console
    Daemon {
        /// User the console speaks for
        #[arg(short, long, default_value = DEFAULT_USER)]
        user: String,
    },

    /// List tasks
    Tasks {
        #[arg(short, long, default_value = DEFAULT_USER)]
        user: String,

        /// Include completed and failed tasks
        #[arg(short, long)]
        all: bool,
    },

    /// List routines
    Routines {
        #[arg(short, long, default_value = DEFAULT_USER)]
        user: String,
    },

    /// Diagnose system health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so they never interleave with console replies.
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Onboard => commands::onboard::run(config_path).await?,
        Commands::Chat { user, message } => commands::chat::run(config_path, &user, message).await?,
        Commands::Tick => commands::tick::run(config_path).await?,
        Commands::Daemon { user } => commands::daemon::run(config_path, &user).await?,
        Commands::Tasks { user, all } => commands::tasks::run(config_path, &user, all).await?,
        Commands::Routines { user } => commands::routines::run(config_path, &user).await?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
    }

    Ok(())
}
