// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The core loop body.
//!
//! On every tick: compress or terminate when a bound is hit, detect
//! pathological cycles, compose the layered prompt, invoke the model, and
//! convert the reply into a state delta plus a routing command.  The routing
//! decision itself is delegated to [`crate::router::route`] so the decision
//! table stays in one place.

use otto_config::AgentConfig;
use otto_model::{invoke_with_retry, CompletionRequest, Message, ToolSchema};
use otto_state::{AgentState, StateDelta, TaskStatus};

use super::{Node, NodeCtx, NodeOutcome};
use crate::classify::detect_loop;
use crate::events::AgentEvent;
use crate::prompts;
use crate::router::route;

pub(crate) async fn run(state: &AgentState, ctx: &NodeCtx) -> anyhow::Result<NodeOutcome> {
    let cfg = &ctx.config.agent;

    // Step 1 — compress the log before composing a prompt from it.
    if state.messages.len() > cfg.summary_trigger {
        return Ok(NodeOutcome::goto(Node::Summarizer));
    }

    // Step 2 — iteration budget.
    if state.iteration_count >= state.max_iterations {
        let error = format!(
            "iteration budget exhausted ({} iterations without completing the plan)",
            state.max_iterations
        );
        ctx.emit(AgentEvent::Error(error.clone())).await;
        return Ok(NodeOutcome::new(
            StateDelta {
                messages: vec![Message::system(format!(
                    "Stopping: the agent used all {} iterations without finishing the \
                     current task. Completed work is preserved in this thread; re-run \
                     with a higher budget or a narrower request to continue.",
                    state.max_iterations
                ))],
                error: Some(error),
                task_status: Some(TaskStatus::Completed),
                ..Default::default()
            },
            Node::End,
        ));
    }

    // Step 3 — all todos done.
    if state.todos_exhausted() {
        return Ok(NodeOutcome::new(
            StateDelta {
                messages: vec![Message::system("All planned tasks are complete.")],
                task_status: Some(TaskStatus::Completed),
                ..Default::default()
            },
            Node::End,
        ));
    }

    // Step 4 — cycle detection; forced progress instead of an error.
    if let Some(kind) = detect_loop(&state.messages) {
        ctx.emit(AgentEvent::LoopDetected {
            reason: kind.reason(),
        })
        .await;
        return Ok(NodeOutcome::new(
            StateDelta {
                messages: vec![Message::system(format!(
                    "Loop detected ({}); moving to the next task.",
                    kind.reason()
                ))],
                iteration_count: Some(0),
                ..Default::default()
            },
            Node::AdvanceTodo,
        ));
    }

    // Steps 5 + 6 — compose the layered prompt and invoke the model.
    let schemas: Vec<ToolSchema> = ctx
        .tools
        .schemas()
        .into_iter()
        .map(|s| ToolSchema {
            name: s.name,
            description: s.description,
            parameters: s.parameters,
        })
        .collect();
    let req = CompletionRequest {
        messages: compose_prompt(state, cfg),
        tools: schemas,
        ..Default::default()
    };

    let reply = match invoke_with_retry(
        ctx.model.as_ref(),
        &req,
        ctx.config.model.retry_attempts,
    )
    .await
    {
        Ok(r) => r,
        Err(e) => {
            let error = format!("model unavailable: {e:#}");
            ctx.emit(AgentEvent::Error(error.clone())).await;
            return Ok(NodeOutcome::new(
                StateDelta {
                    messages: vec![Message::system(
                        "The agent run failed: the language model could not be reached \
                         after repeated attempts. The thread state up to this point is \
                         checkpointed and can be resumed once connectivity returns.",
                    )],
                    error: Some(error),
                    ..Default::default()
                },
                Node::End,
            ));
        }
    };

    // Step 7 — classify the reply by projecting it onto the state and
    // letting the decision table pick the edge.
    if !reply.content.is_empty() {
        ctx.emit(AgentEvent::TextComplete(reply.content.clone())).await;
    }

    let mut delta = StateDelta::default();
    if reply.has_tool_calls() {
        delta.pending_tool_calls = Some(reply.tool_calls.clone());
        delta.iteration_count = Some(state.iteration_count + 1);
    }
    delta.messages.push(reply.into_message());

    let mut projected = state.clone();
    projected.apply(delta.clone());
    let next = route(&projected, &ctx.tools, cfg);

    // A plain continuation consumes budget too.
    if next == crate::router::NextNode::Executor && delta.iteration_count.is_none() {
        delta.iteration_count = Some(state.iteration_count + 1);
    }

    Ok(NodeOutcome::new(delta, Node::from(next)))
}

/// Build the layered context: system identity, plan, truncated tree, the
/// current task with its operating rules, the rolling summary, then the full
/// message log.  Only non-empty blocks are included; the log itself is never
/// tail-truncated (memory is bounded by summarization).
pub(crate) fn compose_prompt(state: &AgentState, cfg: &AgentConfig) -> Vec<Message> {
    let mut messages = vec![Message::system(prompts::system_prompt(
        cfg.system_prompt.as_deref(),
    ))];
    if !state.project_plan_text.is_empty() {
        messages.push(Message::system(prompts::plan_block(&state.project_plan_text)));
    }
    if !state.project_tree_text.is_empty() {
        messages.push(Message::system(prompts::tree_block(
            &state.project_tree_text,
            cfg.max_tree_chars,
        )));
    }
    if let Some(task) = state.current_todo() {
        messages.push(Message::system(prompts::task_block(
            state.current_todo_index,
            state.todos.len(),
            task,
        )));
    }
    if !state.summary.is_empty() {
        messages.push(Message::system(prompts::summary_block(&state.summary)));
    }
    messages.extend(state.messages.iter().cloned());
    messages
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
