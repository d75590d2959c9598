//! OpenAI-compatible streaming provider.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, Groq, and any
//! endpoint exposing `/chat/completions` with SSE streaming and function
//! calling.
//!
//! The provider forwards each SSE chunk as raw [`StreamDelta`]s. Tool call
//! fragments are *not* assembled here; the orchestration loop owns that.

use async_trait::async_trait;
use futures::StreamExt;
use remindly_core::error::ProviderError;
use remindly_core::message::{Message, Role};
use remindly_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// An OpenAI-compatible completion provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create an OpenRouter provider (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    /// Convert the system prompt and messages to OpenAI API format.
    fn to_api_messages(system_prompt: &str, messages: &[Message]) -> Vec<ApiMessage> {
        let system = (!system_prompt.is_empty()).then(|| ApiMessage {
            role: "system".into(),
            content: Some(system_prompt.to_string()),
            tool_calls: None,
            tool_call_id: None,
        });

        system
            .into_iter()
            .chain(messages.iter().map(|m| {
                let tool_calls = (!m.tool_calls.is_empty()).then(|| {
                    m.tool_calls
                        .iter()
                        .map(|tc| ApiToolCall {
                            id: tc.id.clone(),
                            r#type: "function".into(),
                            function: ApiFunction {
                                name: tc.name.clone(),
                                arguments: tc.arguments.clone(),
                            },
                        })
                        .collect()
                });
                // Assistant turns that only carry tool calls send `null` content.
                let content = if tool_calls.is_some() && m.content.is_empty() {
                    None
                } else {
                    Some(m.content.clone())
                };
                ApiMessage {
                    role: match m.role {
                        Role::User => "user".into(),
                        Role::Assistant => "assistant".into(),
                        Role::System => "system".into(),
                        Role::Tool => "tool".into(),
                    },
                    content,
                    tool_calls,
                    tool_call_id: m.tool_call_id.clone(),
                }
            }))
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn request_body(request: &CompletionRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.system_prompt, &request.messages),
            "temperature": request.temperature,
            "stream": true,
            "stream_options": { "include_usage": true },
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }
}

/// Translate one SSE `data:` payload into deltas.
///
/// Returns `Ok(None)` for `[DONE]`, `Err` for an in-band API error.
/// Unparseable chunks yield an empty list and are skipped.
fn parse_sse_data(data: &str) -> Result<Option<Vec<StreamDelta>>, ProviderError> {
    if data == "[DONE]" {
        return Ok(None);
    }

    let chunk: StreamResponse = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
            return Ok(Some(Vec::new()));
        }
    };

    if let Some(error) = chunk.error {
        return Err(ProviderError::ApiError {
            status_code: error.code.unwrap_or(200),
            message: error.message.unwrap_or_else(|| "stream reported an error".into()),
        });
    }

    let mut deltas = Vec::new();
    if let Some(choice) = chunk.choices.into_iter().next() {
        if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
            deltas.push(StreamDelta::Text { content });
        }
        for tc in choice.delta.tool_calls.unwrap_or_default() {
            let (name, arguments) = match tc.function {
                Some(f) => (f.name, f.arguments),
                None => (None, None),
            };
            deltas.push(StreamDelta::ToolCall(ToolCallDelta {
                index: tc.index,
                id: tc.id,
                name,
                arguments,
            }));
        }
        if let Some(reason) = choice.finish_reason {
            deltas.push(StreamDelta::finish(FinishReason::parse(&reason)));
        }
    }
    if let Some(usage) = chunk.usage {
        deltas.push(StreamDelta::Usage(Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }));
    }
    Ok(Some(deltas))
}

/// Take every complete line out of `buffer` and return the `data:` payloads.
///
/// Bytes after the last newline stay buffered, so a UTF-8 character split
/// across network reads is only decoded once the whole line has arrived.
fn drain_sse_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut payloads = Vec::new();
    while let Some(line_end) = buffer.iter().position(|&b| b == b'\n') {
        let raw: Vec<u8> = buffer.drain(..=line_end).collect();
        let line = String::from_utf8_lossy(&raw);
        let line = line.trim_end_matches(['\r', '\n']);

        // Skip empty lines, SSE comments and non-data fields
        if let Some(data) = line.strip_prefix("data:") {
            payloads.push(data.trim().to_string());
        }
    }
    payloads
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }

    async fn stream(&self, request: CompletionRequest) -> std::result::Result<DeltaStream, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            tools = request.tools.len(),
            messages = request.messages.len(),
            "Sending streaming request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider streaming error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        // Spawn task to read the SSE byte stream and forward deltas
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();
            let mut finished = false;

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx.send(Err(ProviderError::StreamInterrupted(e.to_string()))).await;
                        return;
                    }
                };

                buffer.extend_from_slice(&bytes);

                for data in drain_sse_lines(&mut buffer) {
                    match parse_sse_data(&data) {
                        Ok(None) => {
                            trace!(provider = %provider_name, "Stream complete");
                            return;
                        }
                        Ok(Some(deltas)) => {
                            for delta in deltas {
                                finished |= matches!(delta, StreamDelta::Finish { .. });
                                if tx.send(Ok(delta)).await.is_err() {
                                    return; // receiver dropped
                                }
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    }
                }
            }

            // Connection closed without [DONE]; fine only if a finish reason arrived.
            if !finished {
                let _ = tx
                    .send(Err(ProviderError::StreamInterrupted(
                        "stream ended before a finish reason".into(),
                    )))
                    .await;
            }
        });

        Ok(rx)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamChoiceDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChoiceDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta: arrives incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use remindly_core::message::MessageToolCall;

    #[test]
    fn openrouter_constructor() {
        let provider = OpenAiCompatProvider::openrouter("sk-test");
        assert_eq!(provider.name(), "openrouter");
        assert!(provider.base_url.contains("openrouter.ai"));
    }

    #[test]
    fn ollama_constructor() {
        let provider = OpenAiCompatProvider::ollama(None);
        assert_eq!(provider.name(), "ollama");
        assert!(provider.base_url.contains("localhost:11434"));
    }

    #[test]
    fn system_prompt_leads_the_messages() {
        let messages = vec![Message::user("Hello")];
        let api_messages = OpenAiCompatProvider::to_api_messages("You are helpful", &messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");

        let without = OpenAiCompatProvider::to_api_messages("", &messages);
        assert_eq!(without.len(), 1);
    }

    #[test]
    fn tool_call_round_conversion() {
        let call = MessageToolCall {
            id: "call_1".into(),
            name: "create_task".into(),
            arguments: r#"{"name":"buy milk"}"#.into(),
        };
        let msgs = vec![
            Message::assistant_tool_calls("", vec![call]),
            Message::tool_result("call_1", r#"{"ok":true}"#),
        ];
        let api_msgs = OpenAiCompatProvider::to_api_messages("", &msgs);
        assert!(api_msgs[0].content.is_none());
        let tc = api_msgs[0].tool_calls.as_ref().unwrap();
        assert_eq!(tc[0].function.name, "create_task");
        assert_eq!(api_msgs[1].role, "tool");
        assert_eq!(api_msgs[1].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn request_body_omits_tools_when_disabled() {
        let mut request = CompletionRequest {
            model: "gpt-4o-mini".into(),
            system_prompt: "sys".into(),
            messages: vec![Message::user("hi")],
            tools: vec![],
            temperature: 0.2,
            max_tokens: Some(256),
        };
        let body = OpenAiCompatProvider::request_body(&request);
        assert!(body.get("tools").is_none());
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 256);

        request.tools.push(ToolDefinition {
            name: "get_task".into(),
            description: "Fetch a task".into(),
            parameters: serde_json::json!({"type": "object"}),
        });
        let body = OpenAiCompatProvider::request_body(&request);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "get_task");
    }

    // --- SSE parsing tests ---

    #[test]
    fn parse_content_delta() {
        let data = r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        let deltas = parse_sse_data(data).unwrap().unwrap();
        assert_eq!(deltas, vec![StreamDelta::text("Hello")]);
    }

    #[test]
    fn parse_finish_chunk() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#;
        let deltas = parse_sse_data(data).unwrap().unwrap();
        assert_eq!(deltas, vec![StreamDelta::finish(FinishReason::ToolCalls)]);
    }

    #[test]
    fn parse_tool_call_fragments_stay_raw() {
        let first = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_abc","function":{"name":"create_","arguments":""}}]},"finish_reason":null}]}"#;
        let second = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"name":"task","arguments":"{\"name\""}}]},"finish_reason":null}]}"#;

        let deltas = parse_sse_data(first).unwrap().unwrap();
        assert_eq!(
            deltas,
            vec![StreamDelta::ToolCall(ToolCallDelta {
                index: 0,
                id: Some("call_abc".into()),
                name: Some("create_".into()),
                arguments: Some(String::new()),
            })]
        );

        let deltas = parse_sse_data(second).unwrap().unwrap();
        let StreamDelta::ToolCall(tc) = &deltas[0] else {
            panic!("expected tool call delta");
        };
        assert!(tc.id.is_none());
        assert_eq!(tc.name.as_deref(), Some("task"));
        assert_eq!(tc.arguments.as_deref(), Some("{\"name\""));
    }

    #[test]
    fn parse_multiple_tool_calls_in_one_chunk() {
        let data = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_a","function":{"name":"list_tasks","arguments":""}},{"index":1,"id":"call_b","function":{"name":"list_routines","arguments":""}}]},"finish_reason":null}]}"#;
        let deltas = parse_sse_data(data).unwrap().unwrap();
        assert_eq!(deltas.len(), 2);
    }

    #[test]
    fn parse_usage_and_done() {
        let data = r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        let deltas = parse_sse_data(data).unwrap().unwrap();
        assert_eq!(
            deltas,
            vec![StreamDelta::Usage(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            })]
        );
        assert!(parse_sse_data("[DONE]").unwrap().is_none());
    }

    #[test]
    fn in_band_error_is_a_transport_failure() {
        let data = r#"{"error":{"message":"upstream overloaded","code":503}}"#;
        let err = parse_sse_data(data).unwrap_err();
        assert!(matches!(err, ProviderError::ApiError { status_code: 503, .. }));
    }

    #[test]
    fn garbage_chunks_are_skipped() {
        assert!(parse_sse_data("not json").unwrap().unwrap().is_empty());
    }

    #[test]
    fn sse_lines_split_across_reads() {
        let mut buffer = b": keep-alive\ndata: {\"a\":1}\r\n\ndata: [DO".to_vec();
        assert_eq!(drain_sse_lines(&mut buffer), vec!["{\"a\":1}".to_string()]);
        assert_eq!(buffer, b"data: [DO");

        buffer.extend_from_slice(b"NE]\n");
        assert_eq!(drain_sse_lines(&mut buffer), vec!["[DONE]".to_string()]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn multibyte_text_split_across_reads_is_not_mangled() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"Привет 👋\"},\"finish_reason\":null}]}\n";
        let bytes = line.as_bytes();
        // Cut inside the two-byte 'П'.
        let cut = line.find('П').unwrap() + 1;

        let mut buffer = bytes[..cut].to_vec();
        assert!(drain_sse_lines(&mut buffer).is_empty());
        buffer.extend_from_slice(&bytes[cut..]);
        let payloads = drain_sse_lines(&mut buffer);
        assert_eq!(payloads.len(), 1);

        let deltas = parse_sse_data(&payloads[0]).unwrap().unwrap();
        assert_eq!(deltas, vec![StreamDelta::text("Привет 👋")]);
    }
}
