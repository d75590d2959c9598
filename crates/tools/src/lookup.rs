//! Lookup collaborators: request/response tools with a hard timeout.
//!
//! A [`LookupTool`] wraps any [`LookupBackend`]. The bundled backend is
//! [`HttpLookup`], a plain `GET url?param=query` whose body is handed back
//! to the model as text. Failures surface as [`ToolError::Lookup`], which
//! the orchestrator treats as fatal for the turn.

use async_trait::async_trait;
use remindly_config::LookupConfig;
use remindly_core::error::ToolError;
use remindly_core::tool::{Tool, ToolContext};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::args;

/// Longest body passed back to the model, in characters.
pub const MAX_ANSWER_CHARS: usize = 4000;

#[async_trait]
pub trait LookupBackend: Send + Sync {
    async fn lookup(&self, query: &str) -> Result<String, ToolError>;
}

/// `GET {url}?{query_param}={query}` returning the response body.
pub struct HttpLookup {
    name: String,
    url: String,
    query_param: String,
    client: reqwest::Client,
}

impl HttpLookup {
    pub fn new(name: impl Into<String>, url: impl Into<String>, query_param: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            query_param: query_param.into(),
            client: reqwest::Client::new(),
        }
    }

    fn failed(&self, reason: impl Into<String>) -> ToolError {
        ToolError::Lookup {
            tool_name: self.name.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl LookupBackend for HttpLookup {
    async fn lookup(&self, query: &str) -> Result<String, ToolError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[(self.query_param.as_str(), query)])
            .send()
            .await
            .map_err(|e| self.failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.failed(format!("HTTP {}", status.as_u16())));
        }

        let body = response.text().await.map_err(|e| self.failed(e.to_string()))?;
        Ok(truncate(&body, MAX_ANSWER_CHARS))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

/// A named lookup exposed to the model as `{ "query": string }`.
pub struct LookupTool {
    name: String,
    description: String,
    backend: Arc<dyn LookupBackend>,
    timeout: Duration,
}

impl LookupTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        backend: Arc<dyn LookupBackend>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            backend,
            timeout,
        }
    }

    /// Build an HTTP-backed lookup from its `[lookups.<name>]` section.
    pub fn from_config(name: &str, config: &LookupConfig) -> Self {
        let backend = HttpLookup::new(name, &config.url, &config.query_param);
        Self::new(
            name,
            &config.description,
            Arc::new(backend),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl Tool for LookupTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "What to look up" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let query = args::required_str(args::object(&arguments)?, "query")?;
        debug!(tool = %self.name, query = %query, "Running lookup");

        match tokio::time::timeout(self.timeout, self.backend.lookup(&query)).await {
            Ok(Ok(answer)) => Ok(json!({ "query": query, "answer": answer })),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!(tool = %self.name, timeout_ms = self.timeout.as_millis() as u64, "Lookup timed out");
                Err(ToolError::Lookup {
                    tool_name: self.name.clone(),
                    reason: format!("timed out after {}s", self.timeout.as_secs_f32()),
                })
            }
        }
    }
}
