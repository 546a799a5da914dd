// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Tool call records ────────────────────────────────────────────────────────

/// A single tool invocation requested by the model, bound to the assistant
/// message that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Opaque identifier returned by the model (forwarded verbatim)
    pub id: String,
    pub name: String,
    /// Parsed JSON arguments
    pub args: serde_json::Value,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }
}

/// Outcome of a tool execution as recorded in the message log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Ok,
    Error,
}

// ─── Message ──────────────────────────────────────────────────────────────────

/// A single message in the conversation log.
///
/// All dispatch is on the variant tag — there is no runtime type sniffing.
/// Every persisted variant carries a stable uuid `id`; `Remove` is the
/// tombstone that deletes a prior message through the reducer and never
/// persists itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    Human {
        id: String,
        content: String,
    },
    Assistant {
        id: String,
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reasoning: Option<String>,
    },
    ToolResult {
        id: String,
        tool_call_id: String,
        name: String,
        content: String,
        status: ToolStatus,
    },
    System {
        id: String,
        content: String,
    },
    Remove {
        id: String,
    },
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl Message {
    pub fn human(text: impl Into<String>) -> Self {
        Self::Human {
            id: new_id(),
            content: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant {
            id: new_id(),
            content: text.into(),
            tool_calls: Vec::new(),
            reasoning: None,
        }
    }

    pub fn assistant_with_tool_calls(
        text: impl Into<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Self {
        Self::Assistant {
            id: new_id(),
            content: text.into(),
            tool_calls,
            reasoning: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::System {
            id: new_id(),
            content: text.into(),
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::ToolResult {
            id: new_id(),
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            content: content.into(),
            status: ToolStatus::Ok,
        }
    }

    pub fn tool_error(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::ToolResult {
            id: new_id(),
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            content: content.into(),
            status: ToolStatus::Error,
        }
    }

    /// Tombstone: deletes the message with `id` when appended via the reducer.
    pub fn remove(id: impl Into<String>) -> Self {
        Self::Remove { id: id.into() }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Human { id, .. }
            | Self::Assistant { id, .. }
            | Self::ToolResult { id, .. }
            | Self::System { id, .. }
            | Self::Remove { id } => id,
        }
    }

    /// Textual content of the message, if the variant carries one.
    pub fn content_text(&self) -> Option<&str> {
        match self {
            Self::Human { content, .. }
            | Self::Assistant { content, .. }
            | Self::ToolResult { content, .. }
            | Self::System { content, .. } => Some(content),
            Self::Remove { .. } => None,
        }
    }

    /// Tool calls bound to this message (empty slice for non-assistant variants).
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self, Self::Assistant { .. })
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, Self::ToolResult { .. })
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, Self::Remove { .. })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
