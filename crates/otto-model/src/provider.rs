// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

use async_trait::async_trait;

use crate::{Message, ToolCallRequest};

/// A tool schema provided to the model.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema of the parameters object
    pub parameters: serde_json::Value,
}

/// Request sent to a model provider.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
    /// When set, the provider constrains the reply content to validate
    /// against this JSON schema and returns it as a JSON document.
    pub structured_output: Option<serde_json::Value>,
    pub temperature: Option<f32>,
    /// Per-call transport timeout; the provider default applies when `None`.
    pub timeout: Option<Duration>,
}

/// Token usage from one completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A complete (non-streaming) reply from the model.
#[derive(Debug, Clone, Default)]
pub struct AssistantReply {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub reasoning: Option<String>,
    pub usage: Option<Usage>,
}

impl AssistantReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        args: serde_json::Value,
    ) -> Self {
        Self {
            tool_calls: vec![ToolCallRequest::new(id, name, args)],
            ..Default::default()
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Convert this reply into the assistant message appended to the log.
    pub fn into_message(self) -> Message {
        Message::Assistant {
            id: uuid::Uuid::new_v4().to_string(),
            content: self.content,
            tool_calls: self.tool_calls,
            reasoning: self.reasoning,
        }
    }
}

/// A remote completion oracle.  The engine never streams: one call in, one
/// complete reply out.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Human-readable provider name for status display.
    fn name(&self) -> &str;

    /// Model identifier as reported to users.
    fn model_name(&self) -> &str;

    /// Send a completion request and return the full reply.
    async fn invoke(&self, req: CompletionRequest) -> anyhow::Result<AssistantReply>;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_text_has_no_tool_calls() {
        let r = AssistantReply::text("done");
        assert!(!r.has_tool_calls());
        assert_eq!(r.content, "done");
    }

    #[test]
    fn reply_tool_call_is_detected() {
        let r = AssistantReply::tool_call("tc", "grep", serde_json::json!({}));
        assert!(r.has_tool_calls());
    }

    #[test]
    fn into_message_preserves_tool_calls() {
        let r = AssistantReply::tool_call("tc-9", "list_dir", serde_json::json!({"path": "."}));
        let m = r.into_message();
        assert!(m.is_assistant());
        assert_eq!(m.tool_calls()[0].id, "tc-9");
    }
}
