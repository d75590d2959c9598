//! Messaging transports for Remindly.
//!
//! The core talks to a platform through the
//! [`Transport`](remindly_core::channel::Transport) trait and only ever
//! sees inbound events already normalized to text.
//!
//! Available here:
//! - **Console**: terminal chat (stdin/stdout) with in-place streaming edits
//! - **Inbound**: platform events and their text normalization

pub mod console;
pub mod inbound;

pub use console::{ConsoleTransport, listen, parse_line};
pub use inbound::InboundEvent;
