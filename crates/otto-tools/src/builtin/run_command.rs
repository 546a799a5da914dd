// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::debug;

use crate::context::ExecutionContext;
use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct RunCommandTool {
    pub timeout_secs: u64,
}

impl Default for RunCommandTool {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Executes a shell command in the project root and returns its output.\n\
         Use this for builds, tests, package installs and other one-shot terminal \
         operations — NOT for file operations (use read_file / write_file / \
         edit_file / grep instead).\n\
         Chain dependent commands with '&&' in a single call. Always quote paths \
         that contain spaces.\n\
         For servers or watchers use process_start; this tool kills anything \
         still running at the timeout.\n\
         Oversized output is cut before it reaches the conversation. Non-zero \
         exit codes are returned as errors with the exit code in the output."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "workdir": {
                    "type": "string",
                    "description": "Working directory relative to the project root (optional)"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Execution timeout in seconds (optional)"
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    fn sensitive(&self) -> bool {
        true
    }

    async fn execute(&self, call: &ToolCall, ctx: &ExecutionContext) -> ToolOutput {
        if ctx.is_cancelled() {
            return ToolOutput::err(&call.id, "cancelled before execution");
        }
        let command = match call.args.get("command").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => return ToolOutput::err(&call.id, "missing 'command' argument"),
        };
        if let Some(pattern) = ctx.deny_list.matched(&command) {
            return ToolOutput::err(
                &call.id,
                format!("command rejected by deny-list (matched {pattern:?})"),
            );
        }

        let workdir = match call.args.get("workdir").and_then(|v| v.as_str()) {
            Some(wd) => match ctx.resolve(wd) {
                Ok(p) => p,
                Err(e) => return ToolOutput::err(&call.id, e),
            },
            None => ctx.project_root.clone(),
        };
        let timeout = call
            .args
            .get("timeout_secs")
            .and_then(|v| v.as_u64())
            .unwrap_or(self.timeout_secs);

        debug!(cmd = %command, workdir = %workdir.display(), "run_command tool");

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&command).current_dir(&workdir);
        cmd.kill_on_drop(true);

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(timeout),
            cmd.output(),
        )
        .await;

        // Oversized results are cut later by the dispatcher's shared
        // tool-result cap; this tool returns the raw streams.
        match result {
            Ok(Ok(output)) => {
                let mut content = String::new();
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);

                if !stdout.is_empty() {
                    content.push_str(&stdout);
                }
                if !stderr.is_empty() {
                    if !content.is_empty() {
                        content.push('\n');
                    }
                    content.push_str("[stderr]\n");
                    content.push_str(&stderr);
                }
                if content.is_empty() {
                    content = format!("[exit {}]", output.status.code().unwrap_or(-1));
                }

                if output.status.success() {
                    ToolOutput::ok(&call.id, content)
                } else {
                    let code = output.status.code().unwrap_or(-1);
                    ToolOutput::err(&call.id, format!("[exit {code}]\n{content}"))
                }
            }
            Ok(Err(e)) => ToolOutput::err(&call.id, format!("spawn error: {e}")),
            Err(_) => ToolOutput::err(&call.id, format!("timeout after {timeout}s")),
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
            id: "c1".into(),
            name: "run_command".into(),
            args,
        }
    }

    #[tokio::test]
    async fn runs_echo_and_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let out = RunCommandTool::default()
            .execute(
                &call(json!({"command": "echo hello_cmd"})),
                &test_context(dir.path()),
            )
            .await;
        assert!(!out.is_error, "{}", out.content);
        assert!(out.content.contains("hello_cmd"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_error_with_code() {
        let dir = tempfile::tempdir().unwrap();
        let out = RunCommandTool::default()
            .execute(&call(json!({"command": "exit 3"})), &test_context(dir.path()))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("[exit 3]"));
    }

    #[tokio::test]
    async fn commands_run_in_project_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let out = RunCommandTool::default()
            .execute(&call(json!({"command": "ls"})), &test_context(dir.path()))
            .await;
        assert!(out.content.contains("marker.txt"), "{}", out.content);
    }

    #[tokio::test]
    async fn denied_command_is_rejected_before_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let out = RunCommandTool::default()
            .execute(
                &call(json!({"command": "rm -rf /"})),
                &test_context(dir.path()),
            )
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("deny-list"), "{}", out.content);
    }

    #[tokio::test]
    async fn timeout_kills_the_command() {
        let dir = tempfile::tempdir().unwrap();
        let out = RunCommandTool::default()
            .execute(
                &call(json!({"command": "sleep 10", "timeout_secs": 1})),
                &test_context(dir.path()),
            )
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("timeout"));
    }

    #[test]
    fn run_command_is_sensitive() {
        assert!(RunCommandTool::default().sensitive());
    }

    #[tokio::test]
    async fn large_output_is_returned_untruncated() {
        // The shared tool-result cap lives in the dispatcher, not here.
        let dir = tempfile::tempdir().unwrap();
        let out = RunCommandTool::default()
            .execute(
                &call(json!({"command": "seq 1 2000"})),
                &test_context(dir.path()),
            )
            .await;
        assert!(!out.is_error, "{}", out.content);
        assert!(out.content.contains("\n2000"));
    }
}
