// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Tools fronting the background process manager: start, stop, and read the
//! log ring buffer of long-running commands (dev servers, watchers).

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::context::ExecutionContext;
use crate::process::ProcessStatus;
use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct ProcessStartTool;

#[async_trait]
impl Tool for ProcessStartTool {
    fn name(&self) -> &str {
        "process_start"
    }

    fn description(&self) -> &str {
        "Starts a long-running command (dev server, watcher) in the background \
         and returns a process id. Use process_logs to inspect output and \
         process_stop to terminate. For one-shot commands use run_command."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to run in the background"
                },
                "workdir": {
                    "type": "string",
                    "description": "Working directory relative to the project root (optional)"
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

        debug!(cmd = %command, "process_start tool");
        match ctx.processes.start(&command, Some(&workdir)) {
            Ok(id) => ToolOutput::ok(&call.id, format!("started {id}: {command}")),
            Err(e) => ToolOutput::err(&call.id, e),
        }
    }
}

pub struct ProcessStopTool;

#[async_trait]
impl Tool for ProcessStopTool {
    fn name(&self) -> &str {
        "process_stop"
    }

    fn description(&self) -> &str {
        "Stops a background process started with process_start. The whole \
         process tree receives a terminate signal, then a kill after a grace \
         period."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "string",
                    "description": "Process id returned by process_start"
                }
            },
            "required": ["id"],
            "additionalProperties": false
        })
    }

    fn sensitive(&self) -> bool {
        true
    }

    async fn execute(&self, call: &ToolCall, ctx: &ExecutionContext) -> ToolOutput {
        let id = match call.args.get("id").and_then(|v| v.as_str()) {
            Some(i) => i.to_string(),
            None => return ToolOutput::err(&call.id, "missing 'id' argument"),
        };
        debug!(process = %id, "process_stop tool");
        match ctx.processes.stop(&id).await {
            Ok(status) => ToolOutput::ok(&call.id, format!("{id} stopped ({status:?})")),
            Err(e) => ToolOutput::err(&call.id, e),
        }
    }
}

pub struct ProcessLogsTool;

#[async_trait]
impl Tool for ProcessLogsTool {
    fn name(&self) -> &str {
        "process_logs"
    }

    fn description(&self) -> &str {
        "Returns the status and the most recent log lines of a background \
         process (the manager retains a bounded ring buffer per process)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "string",
                    "description": "Process id returned by process_start"
                },
                "tail": {
                    "type": "integer",
                    "description": "Number of trailing log lines to return (default 50)"
                }
            },
            "required": ["id"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall, ctx: &ExecutionContext) -> ToolOutput {
        let id = match call.args.get("id").and_then(|v| v.as_str()) {
            Some(i) => i.to_string(),
            None => return ToolOutput::err(&call.id, "missing 'id' argument"),
        };
        let tail = call.args.get("tail").and_then(|v| v.as_u64()).unwrap_or(50) as usize;

        let Some(status) = ctx.processes.status(&id) else {
            return ToolOutput::err(&call.id, format!("unknown process: {id}"));
        };
        let logs = ctx.processes.logs(&id, tail).unwrap_or_default();
        let status_line = match status {
            ProcessStatus::Running => format!("{id}: running"),
            ProcessStatus::Exited { code } => format!("{id}: exited (code {code:?})"),
        };
        if logs.is_empty() {
            ToolOutput::ok(&call.id, format!("{status_line}\n(no output yet)"))
        } else {
            ToolOutput::ok(&call.id, format!("{status_line}\n{}", logs.join("\n")))
        }
    }
}
