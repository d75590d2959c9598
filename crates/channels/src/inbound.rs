//! Inbound events from a messaging platform, normalized to the plain text
//! the assistant consumes.
//!
//! Media is never passed through: voice arrives already transcribed and
//! photos already described by whatever sits in front of the transport.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    Text {
        text: String,
    },
    Voice {
        transcript: String,
    },
    Photo {
        #[serde(default)]
        caption: Option<String>,
        description: String,
    },
    Sticker {
        emoji: String,
    },
    Location {
        lat: f64,
        lon: f64,
    },
}

impl InboundEvent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Voice { .. } => "voice",
            Self::Photo { .. } => "photo",
            Self::Sticker { .. } => "sticker",
            Self::Location { .. } => "location",
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Text { text } => text,
            Self::Voice { transcript } => format!("[voice message] {transcript}"),
            Self::Photo { caption, description } => match caption {
                Some(caption) if !caption.trim().is_empty() => {
                    format!("[photo: {description}] {caption}")
                }
                _ => format!("[photo: {description}]"),
            },
            Self::Sticker { emoji } => format!("[sticker] {emoji}"),
            Self::Location { lat, lon } => format!("[location] {lat:.5}, {lon:.5}"),
        }
    }
}
