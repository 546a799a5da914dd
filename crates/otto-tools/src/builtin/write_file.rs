// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::context::ExecutionContext;
use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Writes a file under the project root, overwriting any existing file at \
         the path. ALWAYS prefer editing existing files with edit_file. \
         Creates parent directories automatically. \
         Writing identical content to an existing file is a no-op. \
         Set append=true to add to the end of an existing file instead of overwriting."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the project root"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write to the file"
                },
                "append": {
                    "type": "boolean",
                    "description": "If true, append to existing content instead of overwriting (default false)"
                }
            },
            "required": ["path", "content"]
        })
    }

    fn sensitive(&self) -> bool {
        true
    }

    async fn execute(&self, call: &ToolCall, ctx: &ExecutionContext) -> ToolOutput {
        let path = match call.args.get("path").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => {
                let args_preview =
                    serde_json::to_string(&call.args).unwrap_or_else(|_| "null".to_string());
                return ToolOutput::err(
                    &call.id,
                    format!("missing required parameter 'path'. Received: {args_preview}"),
                );
            }
        };
        let content = match call.args.get("content").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => {
                let args_preview =
                    serde_json::to_string(&call.args).unwrap_or_else(|_| "null".to_string());
                return ToolOutput::err(
                    &call.id,
                    format!("missing required parameter 'content'. Received: {args_preview}"),
                );
            }
        };
        let should_append = call
            .args
            .get("append")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let resolved = match ctx.resolve(&path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e),
        };

        debug!(path = %resolved.display(), append = should_append, "write_file tool");

        if !should_append {
            // Identical bytes are a logical no-op.
            if let Ok(existing) = tokio::fs::read(&resolved).await {
                if existing == content.as_bytes() {
                    return ToolOutput::ok(&call.id, format!("{path} unchanged (identical content)"));
                }
            }
        }

        if let Some(parent) = resolved.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = tokio::fs::create_dir_all(parent).await;
            }
        }

        if should_append {
            use tokio::io::AsyncWriteExt;
            match tokio::fs::OpenOptions::new()
                .append(true)
                .create(true)
                .open(&resolved)
                .await
            {
                Ok(mut f) => {
                    let result = f.write_all(content.as_bytes()).await;
                    // Explicitly flush + shutdown so all bytes reach the OS
                    // before the handle drops (tokio close is async on drop).
                    let _ = f.flush().await;
                    let _ = f.shutdown().await;
                    match result {
                        Ok(_) => ToolOutput::ok(
                            &call.id,
                            format!("appended {} bytes to {path}", content.len()),
                        ),
                        Err(e) => ToolOutput::err(&call.id, format!("write error: {e}")),
                    }
                }
                Err(e) => ToolOutput::err(&call.id, format!("open error: {e}")),
            }
        } else {
            match tokio::fs::write(&resolved, &content).await {
                Ok(_) => {
                    ToolOutput::ok(&call.id, format!("wrote {} bytes to {path}", content.len()))
                }
                Err(e) => ToolOutput::err(&call.id, format!("write error: {e}")),
            }
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
            id: "w1".into(),
            name: "write_file".into(),
            args,
        }
    }

    #[tokio::test]
    async fn write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = WriteFileTool
            .execute(
                &call(json!({"path": "hello.txt", "content": "hi"})),
                &test_context(dir.path()),
            )
            .await;
        assert!(!out.is_error, "{}", out.content);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("hello.txt")).unwrap(),
            "hi"
        );
    }

    #[tokio::test]
    async fn write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let out = WriteFileTool
            .execute(
                &call(json!({"path": "nested/deep/file.txt", "content": "x"})),
                &test_context(dir.path()),
            )
            .await;
        assert!(!out.is_error, "{}", out.content);
        assert!(dir.path().join("nested/deep/file.txt").exists());
    }

    #[tokio::test]
    async fn identical_rewrite_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let args = json!({"path": "same.txt", "content": "stable"});
        let first = WriteFileTool.execute(&call(args.clone()), &ctx).await;
        assert!(first.content.contains("wrote"));
        let second = WriteFileTool.execute(&call(args), &ctx).await;
        assert!(second.content.contains("unchanged"), "{}", second.content);
    }

    #[tokio::test]
    async fn append_adds_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let w1 = WriteFileTool
            .execute(&call(json!({"path": "log.txt", "content": "first\n"})), &ctx)
            .await;
        assert!(!w1.is_error, "{}", w1.content);
        let w2 = WriteFileTool
            .execute(
                &call(json!({"path": "log.txt", "content": "second\n", "append": true})),
                &ctx,
            )
            .await;
        assert!(!w2.is_error, "{}", w2.content);
        let contents = std::fs::read_to_string(dir.path().join("log.txt")).unwrap();
        assert!(contents.contains("first"));
        assert!(contents.contains("second"));
    }

    #[tokio::test]
    async fn missing_content_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = WriteFileTool
            .execute(&call(json!({"path": "x.txt"})), &test_context(dir.path()))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("missing required parameter 'content'"));
    }

    #[tokio::test]
    async fn escape_outside_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let out = WriteFileTool
            .execute(
                &call(json!({"path": "/etc/owned", "content": "nope"})),
                &test_context(dir.path()),
            )
            .await;
        assert!(out.is_error);
    }

    #[test]
    fn write_file_is_sensitive() {
        assert!(WriteFileTool.sensitive());
    }
}
