// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::{Tool, ToolCall, ToolOutput};

/// A tool schema – mirrors otto_model::ToolSchema but keeps the tools crate
/// independent from the model crate.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Central registry holding all available tools.
/// Immutable after startup; shared across threads behind an `Arc`.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Produce schemas for all registered tools, sorted by name.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .values()
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// True when `name` is a registered sensitive tool.
    /// Unknown tools are not sensitive — dispatch rejects them anyway.
    pub fn is_sensitive(&self, name: &str) -> bool {
        self.tools.get(name).map(|t| t.sensitive()).unwrap_or(false)
    }

    pub async fn execute(&self, call: &ToolCall, ctx: &ExecutionContext) -> ToolOutput {
        match self.tools.get(&call.name) {
            Some(tool) => tool.execute(call, ctx).await,
            None => ToolOutput::err(&call.id, format!("unknown tool: {}", call.name)),
        }
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::context::test_context;

    /// Minimal no-op tool for registry tests.
    struct EchoTool {
        name: &'static str,
        sensitive: bool,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn parameters_schema(&self) -> Value {
            json!({ "type": "object" })
        }
        fn sensitive(&self) -> bool {
            self.sensitive
        }
        async fn execute(&self, call: &ToolCall, _ctx: &ExecutionContext) -> ToolOutput {
            ToolOutput::ok(&call.id, format!("echo:{}", call.args))
        }
    }

    fn echo(name: &'static str) -> EchoTool {
        EchoTool {
            name,
            sensitive: false,
        }
    }

    #[test]
    fn register_and_get() {
        let mut reg = ToolRegistry::new();
        reg.register(echo("echo"));
        assert!(reg.get("echo").is_some());
        assert!(reg.get("nope").is_none());
    }

    #[test]
    fn names_are_sorted() {
        let mut reg = ToolRegistry::new();
        reg.register(echo("b"));
        reg.register(echo("a"));
        assert_eq!(reg.names(), vec!["a", "b"]);
    }

    #[test]
    fn schemas_contain_description() {
        let mut reg = ToolRegistry::new();
        reg.register(echo("my_tool"));
        let schemas = reg.schemas();
        assert_eq!(schemas[0].name, "my_tool");
        assert_eq!(schemas[0].description, "echoes its input");
    }

    #[test]
    fn sensitivity_lookup() {
        let mut reg = ToolRegistry::new();
        reg.register(EchoTool {
            name: "danger",
            sensitive: true,
        });
        reg.register(echo("safe"));
        assert!(reg.is_sensitive("danger"));
        assert!(!reg.is_sensitive("safe"));
        assert!(!reg.is_sensitive("missing"));
    }

    #[tokio::test]
    async fn execute_known_tool_succeeds() {
        let mut reg = ToolRegistry::new();
        reg.register(echo("echo"));
        let tmp = std::env::temp_dir();
        let call = ToolCall {
            id: "1".into(),
            name: "echo".into(),
            args: json!({"x": 1}),
        };
        let out = reg.execute(&call, &test_context(&tmp)).await;
        assert!(!out.is_error);
        assert!(out.content.starts_with("echo:"));
    }

    #[tokio::test]
    async fn execute_unknown_tool_returns_error() {
        let reg = ToolRegistry::new();
        let tmp = std::env::temp_dir();
        let call = ToolCall {
            id: "x".into(),
            name: "missing".into(),
            args: json!({}),
        };
        let out = reg.execute(&call, &test_context(&tmp)).await;
        assert!(out.is_error);
        assert!(out.content.contains("unknown tool"));
    }

    #[test]
    fn registering_same_name_twice_overwrites() {
        let mut reg = ToolRegistry::new();
        reg.register(echo("t"));
        reg.register(echo("t"));
        assert_eq!(reg.names().len(), 1);
    }
}
