// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::Value;

use crate::context::ExecutionContext;

/// A single tool invocation requested by the model.
///
/// Mirrors the model crate's tool-call record but keeps the tools crate
/// independent from the model crate.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Opaque identifier returned by the model (forwarded verbatim)
    pub id: String,
    pub name: String,
    /// Parsed JSON arguments
    pub args: Value,
}

/// The result of executing a tool.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub call_id: String,
    pub content: String,
    /// If true, the tool execution failed non-fatally (returned error message).
    pub is_error: bool,
}

impl ToolOutput {
    /// Successful plain-text result.
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Error result containing a plain-text error message.
    pub fn err(call_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: msg.into(),
            is_error: true,
        }
    }
}

/// Trait that every built-in and user-defined tool must implement.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for parameters
    fn parameters_schema(&self) -> Value;
    /// Sensitive tools require explicit human approval unless the thread
    /// runs in demo mode.  Default: not sensitive (read-only tools).
    fn sensitive(&self) -> bool {
        false
    }
    /// Execute the tool.  Errors should be wrapped in [`ToolOutput::err`].
    async fn execute(&self, call: &ToolCall, ctx: &ExecutionContext) -> ToolOutput;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;

    struct MinimalTool;

    #[async_trait]
    impl Tool for MinimalTool {
        fn name(&self) -> &str {
            "minimal"
        }
        fn description(&self) -> &str {
            "a minimal tool"
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object" })
        }
        async fn execute(&self, call: &ToolCall, _ctx: &ExecutionContext) -> ToolOutput {
            ToolOutput::ok(&call.id, "ok")
        }
    }

    struct WriterTool;

    #[async_trait]
    impl Tool for WriterTool {
        fn name(&self) -> &str {
            "writer"
        }
        fn description(&self) -> &str {
            "writes things"
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object" })
        }
        fn sensitive(&self) -> bool {
            true
        }
        async fn execute(&self, call: &ToolCall, _ctx: &ExecutionContext) -> ToolOutput {
            ToolOutput::ok(&call.id, "wrote")
        }
    }

    #[test]
    fn tools_default_to_not_sensitive() {
        assert!(!MinimalTool.sensitive());
    }

    #[test]
    fn sensitive_flag_can_be_overridden() {
        assert!(WriterTool.sensitive());
    }

    #[test]
    fn output_constructors_set_error_flag() {
        let ok = ToolOutput::ok("c", "fine");
        let err = ToolOutput::err("c", "broken");
        assert!(!ok.is_error);
        assert!(err.is_error);
        assert_eq!(err.content, "broken");
    }
}
