// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::context::ExecutionContext;
use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct EditFileTool;

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replaces one exact snippet in an existing file. old_str must match the \
         file content exactly (including whitespace) and must occur exactly once; \
         include enough surrounding lines to make it unique. \
         Use write_file to create new files."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the project root"
                },
                "old_str": {
                    "type": "string",
                    "description": "Exact snippet to replace (must be unique in the file)"
                },
                "new_str": {
                    "type": "string",
                    "description": "Replacement snippet"
                }
            },
            "required": ["path", "old_str", "new_str"],
            "additionalProperties": false
        })
    }

    fn sensitive(&self) -> bool {
        true
    }

    async fn execute(&self, call: &ToolCall, ctx: &ExecutionContext) -> ToolOutput {
        let get = |key: &str| call.args.get(key).and_then(|v| v.as_str()).map(str::to_string);
        let (path, old_str, new_str) = match (get("path"), get("old_str"), get("new_str")) {
            (Some(p), Some(o), Some(n)) => (p, o, n),
            _ => {
                let args_preview =
                    serde_json::to_string(&call.args).unwrap_or_else(|_| "null".to_string());
                return ToolOutput::err(
                    &call.id,
                    format!(
                        "edit_file requires 'path', 'old_str' and 'new_str'. Received: {args_preview}"
                    ),
                );
            }
        };

        if old_str == new_str {
            return ToolOutput::err(&call.id, "old_str and new_str are identical");
        }

        let resolved = match ctx.resolve(&path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e),
        };

        debug!(path = %resolved.display(), "edit_file tool");

        let text = match tokio::fs::read_to_string(&resolved).await {
            Ok(t) => t,
            Err(e) => return ToolOutput::err(&call.id, format!("cannot read {path}: {e}")),
        };

        let occurrences = text.matches(&old_str).count();
        if occurrences == 0 {
            return ToolOutput::err(
                &call.id,
                format!("old_str not found in {path}; read the file and copy the snippet exactly"),
            );
        }
        if occurrences > 1 {
            return ToolOutput::err(
                &call.id,
                format!(
                    "old_str occurs {occurrences} times in {path}; add surrounding lines to make it unique"
                ),
            );
        }

        let updated = text.replacen(&old_str, &new_str, 1);
        match tokio::fs::write(&resolved, &updated).await {
            Ok(_) => ToolOutput::ok(&call.id, format!("edited {path}")),
            Err(e) => ToolOutput::err(&call.id, format!("write error: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::context::test_context;

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "e1".into(),
            name: "edit_file".into(),
            args,
        }
    }

    #[tokio::test]
    async fn replaces_unique_snippet() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("m.rs"), "fn main() {\n    old();\n}\n").unwrap();
        let out = EditFileTool
            .execute(
                &call(json!({"path": "m.rs", "old_str": "old();", "new_str": "new();"})),
                &test_context(dir.path()),
            )
            .await;
        assert!(!out.is_error, "{}", out.content);
        let text = std::fs::read_to_string(dir.path().join("m.rs")).unwrap();
        assert!(text.contains("new();"));
        assert!(!text.contains("old();"));
    }

    #[tokio::test]
    async fn missing_snippet_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("m.rs"), "fn main() {}\n").unwrap();
        let out = EditFileTool
            .execute(
                &call(json!({"path": "m.rs", "old_str": "nonexistent", "new_str": "x"})),
                &test_context(dir.path()),
            )
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("not found"));
    }

    #[tokio::test]
    async fn ambiguous_snippet_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("m.rs"), "x();\nx();\n").unwrap();
        let out = EditFileTool
            .execute(
                &call(json!({"path": "m.rs", "old_str": "x();", "new_str": "y();"})),
                &test_context(dir.path()),
            )
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("2 times"));
    }

    #[tokio::test]
    async fn identical_strings_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let out = EditFileTool
            .execute(
                &call(json!({"path": "m.rs", "old_str": "a", "new_str": "a"})),
                &test_context(dir.path()),
            )
            .await;
        assert!(out.is_error);
    }

    #[test]
    fn edit_file_is_sensitive() {
        assert!(EditFileTool.sensitive());
    }
}
