// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Prompt builder functions.  Callers treat every returned string as opaque.

use serde_json::{json, Value};

/// Base system prompt for the executor.  `custom` replaces the built-in
/// identity entirely when set (config override).
pub fn system_prompt(custom: Option<&str>) -> String {
    if let Some(text) = custom {
        return text.to_string();
    }
    "You are otto, an autonomous software engineering agent. You work through \
     a plan one task at a time, using the provided tools for every file and \
     shell operation. You never invent file contents — you read them. You \
     keep output short and factual."
        .to_string()
}

/// Project-plan context block.
pub fn plan_block(plan: &str) -> String {
    format!("## Project plan\n{plan}")
}

/// Project-tree context block, truncated to `max_chars` with an ellipsis.
pub fn tree_block(tree: &str, max_chars: usize) -> String {
    let body = if tree.chars().count() > max_chars {
        let cut: String = tree.chars().take(max_chars).collect();
        format!("{cut}…")
    } else {
        tree.to_string()
    };
    format!("## Project tree\n{body}")
}

/// Current-task block with the executor's operating rules.
pub fn task_block(index: usize, total: usize, task: &str) -> String {
    format!(
        "## Current task ({} of {total})\n{task}\n\n\
         Rules:\n\
         - You MUST call tools for every file and shell operation.\n\
         - When the task is finished, reply with an explicit \"✅ done\" signal.\n\
         - Do NOT ask the user questions; decide and proceed.",
        index + 1
    )
}

/// Conversation-summary context block.
pub fn summary_block(summary: &str) -> String {
    format!("## Conversation summary\n{summary}")
}

// ─── Intent classification ────────────────────────────────────────────────────

pub fn intent_prompt() -> String {
    "Classify the user's latest request. `task` means the user wants software \
     engineering work performed (creating or changing files, running commands, \
     building a project). `chat` means a question or conversation with no \
     file-system work. Respond with the JSON object only."
        .to_string()
}

pub fn intent_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "intent": { "type": "string", "enum": ["task", "chat"] },
            "confidence": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
            "reasoning": { "type": "string" }
        },
        "required": ["intent", "confidence"],
        "additionalProperties": false
    })
}

// ─── Planning ─────────────────────────────────────────────────────────────────

pub fn project_plan_prompt() -> String {
    "Produce a short implementation plan for the user's request. Describe the \
     approach, name the tech stack, and list any project initialization steps. \
     If the work belongs in a new directory, set target_directory to its path. \
     Respond with the JSON object only."
        .to_string()
}

pub fn plan_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "project_plan_text": { "type": "string" },
            "tech_stack_summary": { "type": "string" },
            "target_directory": { "type": "string" },
            "project_init_steps": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["project_plan_text", "tech_stack_summary"],
        "additionalProperties": false
    })
}

pub fn decompose_prompt(plan: &str) -> String {
    format!(
        "Break this plan into 4-8 ordered engineering tasks. Every task must be \
         a concrete, physically observable action: create or write a file, \
         install dependencies, run a command. Cognitive tasks (\"analyze\", \
         \"plan\", \"review\") are forbidden. Aggregate related file writes into \
         one task. Respond with the JSON object only.\n\nPlan:\n{plan}"
    )
}

pub fn todos_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "todos": { "type": "array", "items": { "type": "string" }, "minItems": 1 }
        },
        "required": ["todos"],
        "additionalProperties": false
    })
}

/// Marker prefix of the plan-summary system message; the planner's re-entry
/// guard checks for it.
pub const PLAN_READY_MARKER: &str = "Plan ready:";

pub fn plan_summary_message(plan: &str, todos: &[String]) -> String {
    let list: String = todos
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}. {t}\n", i + 1))
        .collect();
    format!("{PLAN_READY_MARKER} {} tasks\n{list}\nPlan: {plan}", todos.len())
}

// ─── Summarization ────────────────────────────────────────────────────────────

pub fn summarize_prompt(history: &str) -> String {
    format!(
        "Summarise the following conversation history for an engineering agent \
         that will continue the work. Be information-dense and preserve:\n\
         - completed tasks and their outcomes\n\
         - files touched (paths and what was done)\n\
         - the pending plan and remaining work\n\
         - open questions and unresolved errors\n\
         The summary replaces the original history.\n\n---\n\n{history}"
    )
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
