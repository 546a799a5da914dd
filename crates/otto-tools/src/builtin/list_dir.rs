// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;
use walkdir::WalkDir;

use crate::context::ExecutionContext;
use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct ListDirTool;

static EXCLUDED_DIRS: &[&str] = &[
    ".git",
    "target",
    "node_modules",
    "dist",
    "build",
    "__pycache__",
    ".mypy_cache",
];

fn is_excluded(name: &str) -> bool {
    EXCLUDED_DIRS.contains(&name)
}

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List directory contents. depth: default 2, max 5. limit: 100 entries by default.\n\
         Excludes .git/ target/ node_modules/ and other build artifacts.\n\
         Directories have a trailing /. For content search use grep."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path, relative to the project root"
                },
                "depth": {
                    "type": "integer",
                    "description": "Maximum recursion depth (default 2, max 5)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of entries to return (default 100)"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
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
        let depth = call
            .args
            .get("depth")
            .and_then(|v| v.as_u64())
            .unwrap_or(2)
            .min(5) as usize;
        let limit = call
            .args
            .get("limit")
            .and_then(|v| v.as_u64())
            .unwrap_or(100) as usize;

        let resolved = match ctx.resolve(&path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e),
        };

        debug!(path = %resolved.display(), depth, limit, "list_dir tool");

        match tokio::fs::metadata(&resolved).await {
            Ok(m) if m.is_dir() => {}
            Ok(_) => return ToolOutput::err(&call.id, format!("not a directory: {path}")),
            Err(e) => return ToolOutput::err(&call.id, format!("cannot access {path}: {e}")),
        }

        let mut entries: Vec<String> = Vec::new();
        let mut truncated = false;
        let walker = WalkDir::new(&resolved)
            .min_depth(1)
            .max_depth(depth + 1)
            .sort_by(|a, b| {
                // Directories first, then alphabetical.
                b.file_type()
                    .is_dir()
                    .cmp(&a.file_type().is_dir())
                    .then(a.file_name().cmp(b.file_name()))
            })
            .into_iter()
            .filter_entry(|e| {
                let name = e.file_name().to_string_lossy();
                !(e.file_type().is_dir() && is_excluded(&name))
            });

        for entry in walker.flatten() {
            if entries.len() >= limit {
                truncated = true;
                break;
            }
            let rel = entry
                .path()
                .strip_prefix(&resolved)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();
            if entry.file_type().is_dir() {
                entries.push(format!("{rel}/"));
            } else {
                entries.push(rel);
            }
        }

        if entries.is_empty() {
            return ToolOutput::ok(&call.id, "(empty directory)");
        }
        let mut output = entries.join("\n");
        if truncated {
            output.push_str(&format!("\n...[output truncated at {limit} entries]"));
        }
        ToolOutput::ok(&call.id, output)
    }
}
