//! `remindly chat`: Interactive or single-message chat.

use remindly_channels::listen;
use remindly_core::store::UserId;
use std::io::Write;
use std::path::Path;
use tokio::io::BufReader;
use tracing::debug;

use crate::runtime::{self, CliResult, Runtime};

const YOU_PROMPT: &str = "  You > ";

pub async fn run(config_path: Option<&Path>, user: &str, message: Option<String>) -> CliResult<()> {
    let config = runtime::load_config(config_path)?;
    runtime::require_api_key(&config, config_path)?;
    let runtime = Runtime::build(config)?;
    let user = UserId::from(user);

    match message {
        Some(message) => {
            runtime.assistant.respond(&user, &message, true).await?;
            runtime.console.end_line()?;
        }
        None => {
            banner(&runtime, &user);
            interactive(&runtime, &user).await?;
            println!("\n  Goodbye! 👋\n");
        }
    }

    Ok(())
}

pub(crate) fn banner(runtime: &Runtime, user: &UserId) {
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        Remindly — Interactive Mode           ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", runtime.config.default_provider);
    println!("  Model:     {}", runtime.config.default_model);
    println!("  User:      {user}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  /voice, /photo, /sticker and /location send media events.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();
}

/// Read console lines until EOF, answering each one as `user`.
pub(crate) async fn interactive(runtime: &Runtime, user: &UserId) -> CliResult<()> {
    let mut rx = listen(BufReader::new(tokio::io::stdin()));
    prompt()?;

    while let Some(event) = rx.recv().await {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                eprintln!("  [Channel Error] {e}");
                break;
            }
        };
        debug!(kind = event.kind(), "Console event");

        if let Err(e) = runtime.assistant.respond(user, &event.into_text(), true).await {
            runtime.console.end_line()?;
            eprintln!("  [Error] {e}");
        }
        runtime.console.end_line()?;
        println!();
        prompt()?;
    }

    Ok(())
}

fn prompt() -> CliResult<()> {
    print!("{YOU_PROMPT}");
    std::io::stdout().flush()?;
    Ok(())
}
