// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::context::ExecutionContext;
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Default number of lines returned when the caller does not specify a limit.
const DEFAULT_LINE_LIMIT: usize = 200;

/// Hard byte ceiling applied in addition to the line limit.
/// Whichever constraint is hit first determines where the output is cut.
const MAX_BYTES: usize = 20_000;

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Reads a file. Default: 200 lines / 20 KB — whichever comes first.\n\
         Lines formatted as L{n}:content (1-indexed).\n\
         When more lines exist, a pagination notice shows the next offset.\n\
         Use grep to find the relevant region first, then read only those lines\n\
         with offset+limit instead of pulling whole large files."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the project root"
                },
                "offset": {
                    "type": "integer",
                    "description": "1-indexed line number to start reading from (default 1)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to return (default 200)"
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
        let offset = call.args.get("offset").and_then(|v| v.as_u64()).unwrap_or(1) as usize;
        let limit = call
            .args
            .get("limit")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_LINE_LIMIT as u64) as usize;

        let resolved = match ctx.resolve(&path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e),
        };

        debug!(path = %resolved.display(), offset, limit, "read_file tool");

        let text = match tokio::fs::read_to_string(&resolved).await {
            Ok(t) => t,
            Err(e) => return ToolOutput::err(&call.id, format!("cannot read {path}: {e}")),
        };

        let total_lines = text.lines().count();
        let start = offset.max(1) - 1;
        let mut out = String::new();
        let mut shown = 0usize;
        for (i, line) in text.lines().enumerate().skip(start).take(limit) {
            let rendered = format!("L{}:{line}\n", i + 1);
            if out.len() + rendered.len() > MAX_BYTES {
                break;
            }
            out.push_str(&rendered);
            shown += 1;
        }

        let last_shown = start + shown;
        if last_shown < total_lines {
            out.push_str(&format!(
                "[{} more lines; continue with offset={}]",
                total_lines - last_shown,
                last_shown + 1
            ));
        }
        if out.is_empty() {
            out = "(empty file)".into();
        }
        ToolOutput::ok(&call.id, out)
    }
}
