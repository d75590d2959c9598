//! Shared fakes for agent tests.

use async_trait::async_trait;
use remindly_core::channel::{MessageRef, Transport};
use remindly_core::error::{ChannelError, ProviderError, ToolError};
use remindly_core::message::MessageToolCall;
use remindly_core::provider::{CompletionRequest, DeltaStream, FinishReason, Provider, StreamDelta, ToolCallDelta};
use remindly_core::store::UserId;
use remindly_core::tool::{Tool, ToolContext};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

use crate::reply::ReplySink;

pub type Script = Vec<Result<StreamDelta, ProviderError>>;

/// Replays one scripted delta sequence per `stream()` call and records
/// every request it receives.
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn channel_of(script: Script) -> DeltaStream {
    let (tx, rx) = mpsc::channel(script.len().max(1));
    for item in script {
        tx.try_send(item).unwrap();
    }
    rx
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: CompletionRequest) -> Result<DeltaStream, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedProvider: no script left"));
        Ok(channel_of(script))
    }
}

/// A model that calls `tool` whenever tools are offered, and answers in
/// plain text otherwise.
pub struct AlwaysCallsProvider {
    pub tool: String,
    pub calls: AtomicUsize,
}

impl AlwaysCallsProvider {
    pub fn new(tool: &str) -> Self {
        Self {
            tool: tool.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Provider for AlwaysCallsProvider {
    fn name(&self) -> &str {
        "always_calls"
    }

    async fn stream(&self, request: CompletionRequest) -> Result<DeltaStream, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let script = if request.tools.is_empty() {
            text_script("Giving up on tools.")
        } else {
            vec![
                Ok(StreamDelta::ToolCall(call_delta(0, &format!("call_{n}"), &self.tool, "{}"))),
                Ok(StreamDelta::finish(FinishReason::ToolCalls)),
            ]
        };
        Ok(channel_of(script))
    }
}

pub fn text_script(text: &str) -> Script {
    vec![Ok(StreamDelta::text(text)), Ok(StreamDelta::finish(FinishReason::Stop))]
}

pub fn call_delta(index: u32, id: &str, name: &str, arguments: &str) -> ToolCallDelta {
    ToolCallDelta {
        index,
        id: Some(id.to_string()),
        name: Some(name.to_string()),
        arguments: Some(arguments.to_string()),
    }
}

/// A script that makes one complete tool call.
pub fn tool_call_script(id: &str, name: &str, arguments: Value) -> Script {
    vec![
        Ok(StreamDelta::ToolCall(call_delta(0, id, name, &arguments.to_string()))),
        Ok(StreamDelta::finish(FinishReason::ToolCalls)),
    ]
}

/// Echoes its arguments and counts executions.
#[derive(Default)]
pub struct CountingTool {
    pub executions: AtomicUsize,
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the arguments back"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, arguments: Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        Ok(arguments)
    }
}

/// Registers a tool while the test keeps a handle on it.
pub struct Shared<T>(pub Arc<T>);

#[async_trait]
impl<T: Tool> Tool for Shared<T> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn description(&self) -> &str {
        self.0.description()
    }

    fn parameters_schema(&self) -> Value {
        self.0.parameters_schema()
    }

    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        self.0.execute(arguments, ctx).await
    }
}

/// Fails every call with the given error.
pub struct FailingTool {
    pub name: &'static str,
    pub error: fn() -> ToolError,
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        Err((self.error)())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    partials: Mutex<Vec<String>>,
    finals: Mutex<Vec<String>>,
    typing: AtomicUsize,
}

impl RecordingSink {
    pub fn partials(&self) -> Vec<String> {
        self.partials.lock().unwrap().clone()
    }

    pub fn finals(&self) -> Vec<String> {
        self.finals.lock().unwrap().clone()
    }

    pub fn typing_count(&self) -> usize {
        self.typing.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn typing(&self) -> Result<(), ChannelError> {
        self.typing.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn partial(&self, text: &str) -> Result<(), ChannelError> {
        self.partials.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn finish(&self, text: &str) -> Result<(), ChannelError> {
        self.finals.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Keeps the latest text of every message it was asked to send or edit.
#[derive(Default)]
pub struct RecordingTransport {
    messages: Mutex<Vec<String>>,
}

impl RecordingTransport {
    pub fn sent_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn last_text(&self) -> Option<String> {
        self.messages.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, _user: &UserId, text: &str) -> Result<MessageRef, ChannelError> {
        let mut messages = self.messages.lock().unwrap();
        messages.push(text.to_string());
        Ok(MessageRef(format!("m{}", messages.len())))
    }

    async fn edit(&self, _user: &UserId, message: &MessageRef, text: &str) -> Result<(), ChannelError> {
        let mut messages = self.messages.lock().unwrap();
        let index: usize = message.0.trim_start_matches('m').parse().unwrap();
        messages[index - 1] = text.to_string();
        Ok(())
    }
}

pub fn tool_calls_of(request: &CompletionRequest) -> Vec<MessageToolCall> {
    request.messages.iter().flat_map(|m| m.tool_calls.clone()).collect()
}
