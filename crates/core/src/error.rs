//! Error types for the Remindly domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; `Error` wraps them all.

use thiserror::Error;

/// The top-level error type for all Remindly operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Completion service (transport) errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Messaging transport errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures talking to the completion service. Any of these aborts the
/// current orchestration pass.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Message delivery failed to {user}: {reason}")]
    DeliveryFailed { user: String, reason: String },

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupted record for user {user}: {reason}")]
    Corrupted { user: String, reason: String },
}

/// The kind of record a [`ToolError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Task,
    Routine,
    Memory,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RecordKind::Task => "task",
            RecordKind::Routine => "routine",
            RecordKind::Memory => "memory",
        })
    }
}

/// Errors raised while executing a tool call.
///
/// These never abort a pass: the orchestration loop turns each one into a
/// structured result payload so the model can recover in the same turn.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid argument '{field}': {reason}")]
    Validation { field: String, reason: String },

    #[error("No {kind} with id '{id}'")]
    NotFound { kind: RecordKind, id: String },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Lookup '{tool_name}' failed: {reason}")]
    Lookup { tool_name: String, reason: String },

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
}

impl ToolError {
    /// Shorthand for a validation failure on a named field.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ToolError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a missing record.
    pub fn not_found(kind: RecordKind, id: impl Into<String>) -> Self {
        ToolError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Stable machine-readable kind, used in the payload fed back to the model.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::Validation { .. } => "validation",
            ToolError::NotFound { .. } => "not_found",
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::Lookup { .. } => "lookup_failed",
            ToolError::Store(_) => "store_failed",
        }
    }

    /// Structured error payload for the model's context.
    pub fn to_payload(&self) -> serde_json::Value {
        let mut error = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        match self {
            ToolError::Validation { field, .. } => {
                error["field"] = serde_json::json!(field);
            }
            ToolError::NotFound { kind, id } => {
                error["record"] = serde_json::json!(kind.to_string());
                error["id"] = serde_json::json!(id);
            }
            _ => {}
        }
        serde_json::json!({ "ok": false, "error": error })
    }
}
