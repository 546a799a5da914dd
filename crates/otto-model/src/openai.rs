// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! OpenAI-compatible chat completion driver.
//!
//! A large number of providers (hosted and local) speak the same
//! `/chat/completions` wire format; this single driver covers all of them.
//! The engine treats the model as a non-streaming oracle, so only the plain
//! JSON response mode is used.

use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{AssistantReply, CompletionRequest, Message, ModelProvider, ToolCallRequest, Usage};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    model: String,
    /// Pre-resolved API key; `None` for local servers that need no auth.
    api_key: Option<String>,
    chat_url: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(
        model: String,
        api_key: Option<String>,
        base_url: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        timeout_secs: u64,
    ) -> Self {
        let base = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into());
        let base = base.trim_end_matches('/');
        Self {
            model,
            api_key,
            chat_url: format!("{base}/chat/completions"),
            max_tokens: max_tokens.unwrap_or(4096),
            temperature: temperature.unwrap_or(0.2),
            timeout: Duration::from_secs(timeout_secs),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, req: CompletionRequest) -> anyhow::Result<AssistantReply> {
        let messages: Vec<Value> = req.messages.iter().filter_map(serialize_message).collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
            "temperature": req.temperature.unwrap_or(self.temperature),
        });

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }

        if let Some(schema) = &req.structured_output {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": { "name": "structured_output", "schema": schema },
            });
        }

        debug!(model = %self.model, messages = req.messages.len(), "chat completion request");

        let mut http = self
            .client
            .post(&self.chat_url)
            .timeout(req.timeout.unwrap_or(self.timeout))
            .json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }

        let resp = http.send().await.context("sending completion request")?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("openai error {status}: {text}");
        }

        let payload: Value = resp.json().await.context("decoding completion response")?;
        parse_reply(&payload)
    }
}

/// Serialize one log message into the OpenAI wire format.
/// Tombstones never reach a provider; they are filtered here as well so a
/// malformed log cannot produce an invalid request.
fn serialize_message(msg: &Message) -> Option<Value> {
    match msg {
        Message::System { content, .. } => Some(json!({"role": "system", "content": content})),
        Message::Human { content, .. } => Some(json!({"role": "user", "content": content})),
        Message::Assistant {
            content,
            tool_calls,
            ..
        } => {
            let mut m = json!({"role": "assistant", "content": content});
            if !tool_calls.is_empty() {
                let calls: Vec<Value> = tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {
                                "name": tc.name,
                                "arguments": tc.args.to_string(),
                            }
                        })
                    })
                    .collect();
                m["tool_calls"] = Value::Array(calls);
            }
            Some(m)
        }
        Message::ToolResult {
            tool_call_id,
            content,
            ..
        } => Some(json!({
            "role": "tool",
            "tool_call_id": tool_call_id,
            "content": content,
        })),
        Message::Remove { .. } => None,
    }
}

fn parse_reply(payload: &Value) -> anyhow::Result<AssistantReply> {
    let message = &payload["choices"][0]["message"];
    if message.is_null() {
        bail!("malformed completion response: no choices[0].message");
    }

    let content = message["content"].as_str().unwrap_or_default().to_string();
    let reasoning = message["reasoning_content"]
        .as_str()
        .map(|s| s.to_string());

    let mut tool_calls = Vec::new();
    if let Some(calls) = message["tool_calls"].as_array() {
        for call in calls {
            let id = call["id"].as_str().unwrap_or_default().to_string();
            let name = call["function"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            if name.is_empty() {
                // A call that cannot be dispatched would corrupt the log.
                warn!(tool_call_id = %id, "dropping tool call with empty name");
                continue;
            }
            let raw_args = call["function"]["arguments"].as_str().unwrap_or("{}");
            let args = serde_json::from_str(raw_args).unwrap_or_else(|e| {
                warn!(tool = %name, error = %e, "invalid tool-call arguments; substituting {{}}");
                json!({})
            });
            tool_calls.push(ToolCallRequest { id, name, args });
        }
    }

    let usage = payload.get("usage").map(|u| Usage {
        input_tokens: u["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: u["completion_tokens"].as_u64().unwrap_or(0) as u32,
    });

    Ok(AssistantReply {
        content,
        tool_calls,
        reasoning,
        usage,
    })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_human_message() {
        let v = serialize_message(&Message::human("hi")).unwrap();
        assert_eq!(v["role"], "user");
        assert_eq!(v["content"], "hi");
    }

    #[test]
    fn serialize_assistant_with_tool_calls() {
        let tc = ToolCallRequest::new("tc-1", "grep", json!({"pattern": "fn main"}));
        let v = serialize_message(&Message::assistant_with_tool_calls("", vec![tc])).unwrap();
        assert_eq!(v["tool_calls"][0]["function"]["name"], "grep");
        // Arguments must be a JSON-encoded string on the wire.
        assert!(v["tool_calls"][0]["function"]["arguments"].is_string());
    }

    #[test]
    fn serialize_tool_result_uses_tool_role() {
        let v = serialize_message(&Message::tool_result("tc-1", "grep", "out")).unwrap();
        assert_eq!(v["role"], "tool");
        assert_eq!(v["tool_call_id"], "tc-1");
    }

    #[test]
    fn tombstones_are_never_serialized() {
        assert!(serialize_message(&Message::remove("x")).is_none());
    }

    #[test]
    fn parse_reply_text_only() {
        let payload = json!({
            "choices": [{"message": {"content": "hello"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3},
        });
        let r = parse_reply(&payload).unwrap();
        assert_eq!(r.content, "hello");
        assert!(r.tool_calls.is_empty());
        assert_eq!(r.usage.unwrap().input_tokens, 12);
    }

    #[test]
    fn parse_reply_with_tool_call() {
        let payload = json!({
            "choices": [{"message": {
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "list_dir", "arguments": "{\"path\": \".\"}"},
                }],
            }}],
        });
        let r = parse_reply(&payload).unwrap();
        assert_eq!(r.tool_calls.len(), 1);
        assert_eq!(r.tool_calls[0].name, "list_dir");
        assert_eq!(r.tool_calls[0].args["path"], ".");
    }

    #[test]
    fn parse_reply_invalid_args_substitute_empty_object() {
        let payload = json!({
            "choices": [{"message": {
                "tool_calls": [{
                    "id": "call_1",
                    "function": {"name": "grep", "arguments": "{not json"},
                }],
            }}],
        });
        let r = parse_reply(&payload).unwrap();
        assert_eq!(r.tool_calls[0].args, json!({}));
    }

    #[test]
    fn parse_reply_missing_message_is_error() {
        let payload = json!({"choices": []});
        assert!(parse_reply(&payload).is_err());
    }

    #[test]
    fn empty_tool_name_is_dropped() {
        let payload = json!({
            "choices": [{"message": {
                "tool_calls": [{"id": "x", "function": {"name": "", "arguments": "{}"}}],
            }}],
        });
        let r = parse_reply(&payload).unwrap();
        assert!(r.tool_calls.is_empty());
    }
}
