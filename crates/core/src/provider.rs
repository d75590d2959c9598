//! Provider trait: the abstraction over the streaming completion service.
//!
//! A Provider accepts a system prompt, ordered role-tagged messages and
//! optional tool declarations, and emits a stream of deltas: text fragments,
//! tool call fragments, and a finish reason.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::message::Message;

/// A streaming completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model to use (e.g., "openai/gpt-4o-mini")
    pub model: String,

    /// System prompt, sent ahead of `messages`
    pub system_prompt: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Tool declarations; empty means tool calling is disabled for this request
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// Token usage information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A fragment of one tool call. Fragments sharing an `index` belong to the
/// same call; `name` and `arguments` pieces must be concatenated in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    pub index: u32,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    Other(String),
}

impl FinishReason {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "stop" => FinishReason::Stop,
            "tool_calls" | "function_call" => FinishReason::ToolCalls,
            "length" => FinishReason::Length,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

/// One element of a streamed completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamDelta {
    Text { content: String },
    ToolCall(ToolCallDelta),
    Finish { reason: FinishReason },
    Usage(Usage),
}

impl StreamDelta {
    pub fn text(content: impl Into<String>) -> Self {
        StreamDelta::Text {
            content: content.into(),
        }
    }

    pub fn finish(reason: FinishReason) -> Self {
        StreamDelta::Finish { reason }
    }
}

/// The receiving half of a completion stream.
pub type DeltaStream = mpsc::Receiver<std::result::Result<StreamDelta, ProviderError>>;

/// The core Provider trait.
///
/// The orchestration loop calls `stream()` without knowing which backend is
/// in use. An `Err` item on the stream is a transport failure and aborts the
/// pass, exactly like an `Err` from `stream()` itself.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter").
    fn name(&self) -> &str;

    /// Open a streaming completion.
    async fn stream(&self, request: CompletionRequest) -> std::result::Result<DeltaStream, ProviderError>;

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_reason_parses_known_values() {
        assert_eq!(FinishReason::parse("stop"), FinishReason::Stop);
        assert_eq!(FinishReason::parse("tool_calls"), FinishReason::ToolCalls);
        assert_eq!(FinishReason::parse("length"), FinishReason::Length);
        assert_eq!(
            FinishReason::parse("content_filter"),
            FinishReason::Other("content_filter".into())
        );
    }

    #[test]
    fn tool_definition_serialization() {
        let tool = ToolDefinition {
            name: "create_task".into(),
            description: "Create a task".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": { "name": { "type": "string" } },
                "required": ["name"]
            }),
        };
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("create_task"));
        assert!(json.contains("required"));
    }
}
