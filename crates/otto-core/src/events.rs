// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use otto_model::ToolCallRequest;
use otto_state::{TaskStatus, UserIntent};

/// Events emitted by the graph while a thread runs.
/// Consumers (the CLI host, tests) subscribe to these to drive their output.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A node started executing
    NodeEntered { node: &'static str },
    /// The opening user turn was classified
    IntentClassified { intent: UserIntent, confidence: f32 },
    /// The planner produced a plan and todo list
    PlanReady { plan: String, todos: Vec<String> },
    /// A complete assistant text response
    TextComplete(String),
    /// The model has requested a tool call
    ToolCallStarted(ToolCallRequest),
    /// A tool call finished
    ToolCallFinished {
        call_id: String,
        tool_name: String,
        output: String,
        is_error: bool,
    },
    /// The todo cursor moved forward
    TodoAdvanced { index: usize, total: usize },
    /// A pathological cycle was detected and progress was forced
    LoopDetected { reason: &'static str },
    /// The oldest message prefix was compressed into the summary
    SummaryCreated { summarized: usize },
    /// Sensitive tool calls are waiting for human approval
    ApprovalRequired { calls: Vec<ToolCallRequest> },
    /// A recoverable error occurred
    Error(String),
    /// The thread finished processing
    RunComplete { status: TaskStatus },
}
