// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;
use walkdir::WalkDir;

use crate::context::ExecutionContext;
use crate::tool::{Tool, ToolCall, ToolOutput};

const MAX_MATCHES: usize = 100;
/// Files above this size are skipped — almost certainly generated or binary.
const MAX_FILE_BYTES: u64 = 1_000_000;

pub struct GrepTool;

static EXCLUDED_DIRS: &[&str] = &[".git", "target", "node_modules", "dist", "build"];

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Searches file contents with a Rust regex, recursively from the given \
         path (default: project root). Returns path:line:content matches, \
         capped at 100. Binary and oversized files are skipped."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regular expression to search for"
                },
                "path": {
                    "type": "string",
                    "description": "Directory or file to search (default: project root)"
                }
            },
            "required": ["pattern"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall, ctx: &ExecutionContext) -> ToolOutput {
        let pattern = match call.args.get("pattern").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => {
                let args_preview =
                    serde_json::to_string(&call.args).unwrap_or_else(|_| "null".to_string());
                return ToolOutput::err(
                    &call.id,
                    format!("missing required parameter 'pattern'. Received: {args_preview}"),
                );
            }
        };
        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(e) => return ToolOutput::err(&call.id, format!("invalid pattern: {e}")),
        };

        let search_path = call.args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let resolved = match ctx.resolve(search_path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e),
        };

        debug!(pattern = %pattern, path = %resolved.display(), "grep tool");

        let mut matches: Vec<String> = Vec::new();
        let mut truncated = false;

        let walker = WalkDir::new(&resolved).into_iter().filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            !(e.file_type().is_dir() && EXCLUDED_DIRS.contains(&name.as_ref()))
        });

        'outer: for entry in walker.flatten() {
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.metadata().map(|m| m.len() > MAX_FILE_BYTES).unwrap_or(true) {
                continue;
            }
            let Ok(text) = std::fs::read_to_string(entry.path()) else {
                continue; // non-UTF-8 (binary)
            };
            let rel = entry
                .path()
                .strip_prefix(&resolved)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();
            let display = if rel.is_empty() { search_path.to_string() } else { rel };
            for (i, line) in text.lines().enumerate() {
                if re.is_match(line) {
                    if matches.len() >= MAX_MATCHES {
                        truncated = true;
                        break 'outer;
                    }
                    matches.push(format!("{display}:{}:{line}", i + 1));
                }
            }
        }

        if matches.is_empty() {
            return ToolOutput::ok(&call.id, format!("no matches for /{pattern}/"));
        }
        let mut output = matches.join("\n");
        if truncated {
            output.push_str(&format!(
                "\n...[more matches omitted; first {MAX_MATCHES} shown — use a more specific pattern]"
            ));
        }
        ToolOutput::ok(&call.id, output)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::context::test_context;

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "g1".into(),
            name: "grep".into(),
            args,
        }
    }

    #[tokio::test]
    async fn finds_matching_lines_with_location() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {}\nfn other() {}\n").unwrap();
        let out = GrepTool
            .execute(
                &call(json!({"pattern": "fn main"})),
                &test_context(dir.path()),
            )
            .await;
        assert!(!out.is_error, "{}", out.content);
        assert!(out.content.contains("a.rs:1:fn main() {}"), "{}", out.content);
        assert!(!out.content.contains("other"));
    }

    #[tokio::test]
    async fn no_matches_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "nothing here\n").unwrap();
        let out = GrepTool
            .execute(
                &call(json!({"pattern": "absent_token"})),
                &test_context(dir.path()),
            )
            .await;
        assert!(!out.is_error);
        assert!(out.content.contains("no matches"));
    }

    #[tokio::test]
    async fn invalid_regex_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = GrepTool
            .execute(&call(json!({"pattern": "["})), &test_context(dir.path()))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("invalid pattern"));
    }

    #[tokio::test]
    async fn missing_pattern_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = GrepTool
            .execute(&call(json!({})), &test_context(dir.path()))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("missing required parameter 'pattern'"));
    }

    #[tokio::test]
    async fn excluded_dirs_are_not_searched() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("target")).unwrap();
        std::fs::write(dir.path().join("target/gen.rs"), "needle\n").unwrap();
        std::fs::write(dir.path().join("src.rs"), "needle\n").unwrap();
        let out = GrepTool
            .execute(&call(json!({"pattern": "needle"})), &test_context(dir.path()))
            .await;
        assert!(out.content.contains("src.rs"));
        assert!(!out.content.contains("gen.rs"), "{}", out.content);
    }

    #[test]
    fn grep_is_not_sensitive() {
        assert!(!GrepTool.sensitive());
    }
}
