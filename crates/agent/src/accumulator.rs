//! Reassembles streamed tool-call fragments into complete calls.
//!
//! Providers split one call across many deltas that share an `index`. The
//! id and name usually arrive once, the arguments in pieces. Pieces are
//! appended in arrival order, never overwritten.

use remindly_core::message::MessageToolCall;
use remindly_core::provider::ToolCallDelta;
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Default)]
struct Partial {
    id: String,
    name: String,
    arguments: String,
}

#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<u32, Partial>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, delta: ToolCallDelta) {
        let slot = self.calls.entry(delta.index).or_default();
        if let Some(id) = delta.id {
            slot.id.push_str(&id);
        }
        if let Some(name) = delta.name {
            slot.name.push_str(&name);
        }
        if let Some(arguments) = delta.arguments {
            slot.arguments.push_str(&arguments);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Complete calls in emission order.
    ///
    /// Calls that never received a name are dropped. A missing id is
    /// replaced by `call_<depth>_<index>` so results can still be linked.
    pub fn finish(self, depth: usize) -> Vec<MessageToolCall> {
        self.calls
            .into_iter()
            .filter_map(|(index, partial)| {
                let name = partial.name.trim().to_string();
                if name.is_empty() {
                    warn!(depth, index, "Dropping tool call without a name");
                    return None;
                }
                let id = match partial.id.trim() {
                    "" => format!("call_{depth}_{index}"),
                    id => id.to_string(),
                };
                Some(MessageToolCall {
                    id,
                    name,
                    arguments: partial.arguments,
                })
            })
            .collect()
    }
}
