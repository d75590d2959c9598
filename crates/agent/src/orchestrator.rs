//! The orchestration loop: stream, execute tool calls, go again.
//!
//! One invocation runs as an explicit loop over passes. Each pass streams
//! a completion, accumulating text into the visible buffer and tool-call
//! fragments into an accumulator. If the pass produced complete calls and
//! tools are still enabled, they run strictly in emission order, the raw
//! directives and their results are appended to the running context, and
//! the next pass starts one level deeper. At `max_depth` tools are withheld,
//! so the last pass always ends in plain text.
//!
//! A transport failure on the completion stream, or a failed lookup,
//! aborts the whole invocation. Any other tool error becomes that call's
//! structured result so the model can recover.

use remindly_config::AppConfig;
use remindly_core::error::{Result, ToolError};
use remindly_core::message::{Message, MessageToolCall};
use remindly_core::provider::{CompletionRequest, Provider, StreamDelta};
use remindly_core::tool::{ToolContext, ToolRegistry};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::accumulator::ToolCallAccumulator;
use crate::reply::ReplySink;
use crate::typing::TypingRefresher;

/// Shown when an invocation produced no visible text at all.
pub const FALLBACK_REPLY: &str = "Okay.";

/// Human-readable trace of one tool execution.
pub fn marker(tool_name: &str, ok: bool) -> String {
    format!("[{} {tool_name}]", if ok { "✓" } else { "✗" })
}

/// Input to one external invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub system_prompt: String,
    /// Recent history followed by the new message.
    pub messages: Vec<Message>,
    pub tools_enabled: bool,
    pub ctx: ToolContext,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Visible text: streamed text of every pass plus tool markers.
    pub text: String,
    /// Depth of the last pass (0 when no tools ran).
    pub depth: usize,
    /// Tool calls actually executed.
    pub tool_calls: usize,
    pub recursion_limit_reached: bool,
}

#[derive(Debug, Default)]
struct Progress {
    depth: usize,
    tool_calls: usize,
    recursion_limit_reached: bool,
}

struct PassOutput {
    text: String,
    calls: Vec<MessageToolCall>,
}

pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_depth: usize,
    typing_interval: Duration,
    typing_min_growth: usize,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, model: impl Into<String>) -> Self {
        Self {
            provider,
            tools,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            max_depth: 5,
            typing_interval: Duration::from_millis(1500),
            typing_min_growth: 40,
        }
    }

    /// Build from the loaded configuration.
    pub fn from_config(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, config: &AppConfig) -> Self {
        Self::new(provider, tools, &config.default_model)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_max_depth(config.agent.max_depth as usize)
            .with_typing(
                Duration::from_millis(config.agent.typing_interval_ms),
                config.agent.typing_min_growth,
            )
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_typing(mut self, interval: Duration, min_growth: usize) -> Self {
        self.typing_interval = interval;
        self.typing_min_growth = min_growth;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run one external invocation to completion.
    ///
    /// The sink receives typing and partial updates; delivering the final
    /// text is left to the caller.
    pub async fn run(&self, invocation: Invocation, sink: Arc<dyn ReplySink>) -> Result<Outcome> {
        if let Err(e) = sink.typing().await {
            debug!(error = %e, "Typing indicator failed");
        }

        let visible = Arc::new(Mutex::new(String::new()));
        let refresher = TypingRefresher::spawn(
            visible.clone(),
            sink.clone(),
            self.typing_interval,
            self.typing_min_growth,
        );
        let result = self.drive(invocation, &visible).await;
        refresher.stop().await;

        let progress = result?;
        let text = visible.lock().await.trim().to_string();
        Ok(Outcome {
            text: if text.is_empty() { FALLBACK_REPLY.to_string() } else { text },
            depth: progress.depth,
            tool_calls: progress.tool_calls,
            recursion_limit_reached: progress.recursion_limit_reached,
        })
    }

    async fn drive(&self, invocation: Invocation, visible: &Mutex<String>) -> Result<Progress> {
        let Invocation {
            system_prompt,
            mut messages,
            tools_enabled,
            ctx,
        } = invocation;

        let definitions = if tools_enabled { self.tools.definitions() } else { Vec::new() };
        let mut executed: HashSet<String> = HashSet::new();
        let mut progress = Progress::default();
        let mut depth = 0usize;

        loop {
            let tools_on = tools_enabled && depth < self.max_depth;
            if tools_enabled && !tools_on {
                warn!(user = %ctx.user, depth, "Recursion limit reached, final pass runs without tools");
                progress.recursion_limit_reached = true;
            }

            let request = CompletionRequest {
                model: self.model.clone(),
                system_prompt: system_prompt.clone(),
                messages: messages.clone(),
                tools: if tools_on { definitions.clone() } else { Vec::new() },
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            };
            let pass = self.stream_pass(request, tools_on, depth, visible).await?;
            progress.depth = depth;

            if !tools_on || pass.calls.is_empty() {
                break;
            }

            debug!(user = %ctx.user, depth, count = pass.calls.len(), "Executing tool calls");
            messages.push(Message::assistant_tool_calls(pass.text, pass.calls.clone()));
            for call in &pass.calls {
                let (payload, ok, ran) = self.execute_call(call, &ctx, &mut executed).await?;
                messages.push(Message::tool_result(&call.id, payload));
                push_marker(visible, &call.name, ok).await;
                if ran {
                    progress.tool_calls += 1;
                }
            }
            depth += 1;
        }

        info!(
            user = %ctx.user,
            depth = progress.depth,
            tool_calls = progress.tool_calls,
            "Invocation finished"
        );
        Ok(progress)
    }

    async fn stream_pass(
        &self,
        request: CompletionRequest,
        tools_on: bool,
        depth: usize,
        visible: &Mutex<String>,
    ) -> Result<PassOutput> {
        let mut stream = self.provider.stream(request).await?;
        let mut text = String::new();
        let mut calls = ToolCallAccumulator::new();

        while let Some(item) = stream.recv().await {
            match item? {
                StreamDelta::Text { content } => {
                    text.push_str(&content);
                    visible.lock().await.push_str(&content);
                }
                StreamDelta::ToolCall(delta) if tools_on => calls.push(delta),
                StreamDelta::ToolCall(delta) => {
                    debug!(depth, index = delta.index, "Ignoring tool call fragment, tools are disabled");
                }
                StreamDelta::Finish { reason } => debug!(depth, ?reason, "Pass finished"),
                StreamDelta::Usage(usage) => debug!(depth, total_tokens = usage.total_tokens, "Token usage"),
            }
        }

        Ok(PassOutput {
            text,
            calls: calls.finish(depth),
        })
    }

    /// Returns the result payload, whether it succeeded, and whether the
    /// tool actually ran.
    async fn execute_call(
        &self,
        call: &MessageToolCall,
        ctx: &ToolContext,
        executed: &mut HashSet<String>,
    ) -> Result<(String, bool, bool)> {
        if !executed.insert(call.id.clone()) {
            warn!(tool = %call.name, call_id = %call.id, "Tool call id already executed, skipping");
            let payload = json!({
                "ok": false,
                "error": {
                    "kind": "duplicate_call",
                    "message": format!("tool call '{}' was already executed in this turn", call.id),
                }
            });
            return Ok((payload.to_string(), false, false));
        }

        let started = Instant::now();
        let result = self.tools.execute(call, ctx).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(value) => {
                debug!(tool = %call.name, call_id = %call.id, duration_ms, "Tool executed");
                Ok((json!({ "ok": true, "result": value }).to_string(), true, true))
            }
            Err(e @ ToolError::Lookup { .. }) => {
                error!(tool = %call.name, call_id = %call.id, error = %e, "Lookup failed, aborting invocation");
                Err(e.into())
            }
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, duration_ms, error = %e, "Tool failed");
                Ok((e.to_payload().to_string(), false, true))
            }
        }
    }
}

async fn push_marker(visible: &Mutex<String>, tool_name: &str, ok: bool) {
    let mut buf = visible.lock().await;
    if !buf.is_empty() && !buf.ends_with('\n') {
        buf.push('\n');
    }
    buf.push_str(&marker(tool_name, ok));
    buf.push('\n');
}
