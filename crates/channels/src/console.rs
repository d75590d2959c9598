//! Console transport: terminal chat over stdin/stdout.
//!
//! Sent messages are printed with a prefix. An edit that extends the last
//! printed message only prints the new suffix, so a streamed reply grows in
//! place on one line. Any other edit re-prints the message in full.

use async_trait::async_trait;
use remindly_core::channel::{MessageRef, Transport};
use remindly_core::error::ChannelError;
use remindly_core::store::UserId;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::inbound::InboundEvent;

struct Console {
    out: Box<dyn Write + Send>,
    next_id: u64,
    printed: HashMap<MessageRef, String>,
    last: Option<MessageRef>,
    line_open: bool,
}

impl Console {
    fn write(&mut self, user: &UserId, text: &str) -> Result<(), ChannelError> {
        self.out
            .write_all(text.as_bytes())
            .and_then(|_| self.out.flush())
            .map_err(|e| ChannelError::DeliveryFailed {
                user: user.to_string(),
                reason: e.to_string(),
            })
    }

    fn start_line(&mut self, user: &UserId, prefix: &str) -> Result<(), ChannelError> {
        if self.line_open {
            self.write(user, "\n")?;
        }
        self.write(user, prefix)?;
        self.line_open = true;
        Ok(())
    }
}

pub struct ConsoleTransport {
    prefix: String,
    console: Mutex<Console>,
}

impl ConsoleTransport {
    pub fn stdout(prefix: impl Into<String>) -> Self {
        Self::with_writer(prefix, Box::new(std::io::stdout()))
    }

    pub fn with_writer(prefix: impl Into<String>, out: Box<dyn Write + Send>) -> Self {
        Self {
            prefix: prefix.into(),
            console: Mutex::new(Console {
                out,
                next_id: 0,
                printed: HashMap::new(),
                last: None,
                line_open: false,
            }),
        }
    }

    fn console(&self) -> Result<std::sync::MutexGuard<'_, Console>, ChannelError> {
        self.console
            .lock()
            .map_err(|_| ChannelError::ConnectionLost("console writer poisoned".into()))
    }

    /// Terminate the current output line, if one is open.
    pub fn end_line(&self) -> Result<(), ChannelError> {
        let mut console = self.console()?;
        if console.line_open {
            console.write(&UserId::from("console"), "\n")?;
            console.line_open = false;
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    fn name(&self) -> &str {
        "console"
    }

    async fn send(&self, user: &UserId, text: &str) -> Result<MessageRef, ChannelError> {
        let mut console = self.console()?;
        console.next_id += 1;
        let message = MessageRef(format!("console-{}", console.next_id));

        console.start_line(user, &self.prefix)?;
        console.write(user, text)?;
        console.printed.insert(message.clone(), text.to_string());
        console.last = Some(message.clone());
        Ok(message)
    }

    async fn edit(&self, user: &UserId, message: &MessageRef, text: &str) -> Result<(), ChannelError> {
        let mut console = self.console()?;
        let Some(previous) = console.printed.get(message).cloned() else {
            return Err(ChannelError::DeliveryFailed {
                user: user.to_string(),
                reason: format!("unknown message {message}"),
            });
        };
        if previous == text {
            return Ok(());
        }

        let extends_last = console.last.as_ref() == Some(message) && console.line_open;
        match text.strip_prefix(previous.as_str()) {
            Some(delta) if extends_last => console.write(user, delta)?,
            _ => {
                console.start_line(user, &self.prefix)?;
                console.write(user, text)?;
                console.last = Some(message.clone());
            }
        }
        console.printed.insert(message.clone(), text.to_string());
        Ok(())
    }
}

/// Map one console line to an inbound event.
///
/// `/voice`, `/photo`, `/sticker` and `/location` simulate the media events
/// a chat platform would deliver. Everything else is text.
pub fn parse_line(line: &str) -> InboundEvent {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    match command {
        "/voice" if !rest.is_empty() => InboundEvent::Voice {
            transcript: rest.to_string(),
        },
        "/photo" if !rest.is_empty() => {
            let (description, caption) = match rest.split_once('|') {
                Some((d, c)) => (d.trim().to_string(), Some(c.trim().to_string())),
                None => (rest.to_string(), None),
            };
            InboundEvent::Photo { caption, description }
        }
        "/sticker" if !rest.is_empty() => InboundEvent::Sticker {
            emoji: rest.to_string(),
        },
        "/location" => {
            let mut parts = rest.split_whitespace().map(str::parse::<f64>);
            match (parts.next(), parts.next()) {
                (Some(Ok(lat)), Some(Ok(lon))) => InboundEvent::Location { lat, lon },
                _ => InboundEvent::text(line),
            }
        }
        _ => InboundEvent::text(line),
    }
}

fn is_exit(line: &str) -> bool {
    matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q")
}

/// Read lines from `reader` until EOF or an exit command.
pub fn listen<R>(reader: R) -> mpsc::Receiver<Result<InboundEvent, ChannelError>>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        let mut lines = reader.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if is_exit(line) {
                        debug!("Console exit requested");
                        break;
                    }
                    if tx.send(Ok(parse_line(line))).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                    break;
                }
            }
        }
    });

    rx
}
