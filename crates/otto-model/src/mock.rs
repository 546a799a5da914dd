// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{AssistantReply, CompletionRequest, Message, ModelProvider};

/// Deterministic mock provider for tests and offline demos.  Echoes the last
/// human message back as the assistant response.
#[derive(Default)]
pub struct MockProvider;

#[async_trait]
impl ModelProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }
    fn model_name(&self) -> &str {
        "mock-model"
    }

    async fn invoke(&self, req: CompletionRequest) -> anyhow::Result<AssistantReply> {
        let reply = req
            .messages
            .iter()
            .rev()
            .find(|m| matches!(m, Message::Human { .. }))
            .and_then(|m| m.content_text())
            .unwrap_or("[no input]")
            .to_string();
        Ok(AssistantReply::text(format!("MOCK: {reply}")))
    }
}

/// A pre-scripted mock provider.  Each `invoke` call pops the next reply from
/// the front of the queue, so tests specify exact sequences — including tool
/// calls and structured-output documents — without network access.
pub struct ScriptedMockProvider {
    replies: Mutex<Vec<AssistantReply>>,
    /// Every `CompletionRequest` seen by this provider, in call order.
    /// Written on each `invoke` so tests can inspect what was sent.
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedMockProvider {
    pub fn new(replies: Vec<AssistantReply>) -> Self {
        Self {
            replies: Mutex::new(replies),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Convenience: provider that always returns the same text reply.
    pub fn always_text(reply: impl Into<String>) -> Self {
        let r = reply.into();
        Self::new(vec![AssistantReply::text(r)])
    }

    /// Convenience: a tool call on the first invocation, text on the second.
    pub fn tool_then_text(
        tool_id: impl Into<String>,
        tool_name: impl Into<String>,
        args: serde_json::Value,
        final_text: impl Into<String>,
    ) -> Self {
        Self::new(vec![
            AssistantReply::tool_call(tool_id, tool_name, args),
            AssistantReply::text(final_text),
        ])
    }

    /// The last request seen, if any.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ModelProvider for ScriptedMockProvider {
    fn name(&self) -> &str {
        "scripted-mock"
    }
    fn model_name(&self) -> &str {
        "scripted-mock-model"
    }

    async fn invoke(&self, req: CompletionRequest) -> anyhow::Result<AssistantReply> {
        self.requests.lock().unwrap().push(req);
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            // Fallback once all scripts are consumed — a plain completion
            // signal so loops driven by the mock terminate.
            return Ok(AssistantReply::text("[no more scripts] done"));
        }
        Ok(replies.remove(0))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn req_with(text: &str) -> CompletionRequest {
        CompletionRequest {
            messages: vec![Message::human(text)],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn mock_echoes_last_human_message() {
        let p = MockProvider;
        let r = p.invoke(req_with("hi")).await.unwrap();
        assert!(r.content.contains("MOCK: hi"));
    }

    #[tokio::test]
    async fn scripted_replies_pop_in_order() {
        let p = ScriptedMockProvider::new(vec![
            AssistantReply::text("first"),
            AssistantReply::text("second"),
        ]);
        assert_eq!(p.invoke(req_with("a")).await.unwrap().content, "first");
        assert_eq!(p.invoke(req_with("b")).await.unwrap().content, "second");
    }

    #[tokio::test]
    async fn scripted_tool_then_text() {
        let p = ScriptedMockProvider::tool_then_text(
            "call-1",
            "run_command",
            serde_json::json!({"command": "ls"}),
            "done",
        );
        let first = p.invoke(req_with("go")).await.unwrap();
        assert!(first.has_tool_calls());
        assert_eq!(first.tool_calls[0].name, "run_command");
        let second = p.invoke(req_with("next")).await.unwrap();
        assert_eq!(second.content, "done");
    }

    #[tokio::test]
    async fn scripted_fallback_when_exhausted() {
        let p = ScriptedMockProvider::new(vec![]);
        let r = p.invoke(req_with("x")).await.unwrap();
        assert!(r.content.contains("no more scripts"));
    }

    #[tokio::test]
    async fn scripted_records_requests() {
        let p = ScriptedMockProvider::always_text("ok");
        let _ = p.invoke(req_with("inspect me")).await.unwrap();
        let req = p.last_request().unwrap();
        assert_eq!(req.messages[0].content_text(), Some("inspect me"));
    }
}
