// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use serde_json::Value;
use tracing::{debug, warn};

use otto_model::{invoke_with_retry, CompletionRequest, Message};
use otto_state::{AgentState, StateDelta, TaskStatus};

use super::{Node, NodeCtx, NodeOutcome};
use crate::events::AgentEvent;
use crate::prompts;

/// Produce the project plan and the ordered todo list with two structured
/// calls, then hand control to the executor.
///
/// Idempotent on replay: when the previous message already carries the plan
/// summary, the node short-circuits without calling the model again.
pub(crate) async fn run(state: &AgentState, ctx: &NodeCtx) -> anyhow::Result<NodeOutcome> {
    if let Some(Message::System { content, .. }) = state.last_message() {
        if content.starts_with(prompts::PLAN_READY_MARKER) {
            debug!("plan summary already present; skipping re-planning");
            return Ok(NodeOutcome::goto(Node::Executor));
        }
    }

    // Call 1 — project plan.
    let plan = match structured_call(
        state,
        ctx,
        &prompts::project_plan_prompt(),
        prompts::plan_schema(),
    )
    .await
    {
        Ok(v) => v,
        Err(e) => return Ok(fail(ctx, e).await),
    };
    let plan_text = plan["project_plan_text"].as_str().unwrap_or_default().to_string();
    let tech_stack = plan["tech_stack_summary"].as_str().unwrap_or_default().to_string();
    let target_directory = plan["target_directory"].as_str().map(str::to_string);
    let init_steps: Vec<String> = plan["project_init_steps"]
        .as_array()
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    // Call 2 — task decomposition.
    let decomposition = match structured_call(
        state,
        ctx,
        &prompts::decompose_prompt(&plan_text),
        prompts::todos_schema(),
    )
    .await
    {
        Ok(v) => v,
        Err(e) => return Ok(fail(ctx, e).await),
    };
    let mut todos: Vec<String> = decomposition["todos"]
        .as_array()
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if todos.is_empty() {
        return Ok(fail(ctx, "planner produced an empty todo list".into()).await);
    }

    let mut delta = StateDelta {
        project_plan_text: Some(plan_text.clone()),
        tech_stack_summary: Some(tech_stack),
        project_init_steps: Some(init_steps),
        current_todo_index: Some(0),
        task_status: Some(TaskStatus::Executing),
        iteration_count: Some(0),
        ..Default::default()
    };

    // A nominated target directory becomes the new project root, with an
    // explicit bootstrap task prepended.
    if let Some(dir) = target_directory.filter(|d| !d.is_empty()) {
        let target = PathBuf::from(&dir);
        if target != state.project_root {
            todos.insert(0, format!("create and initialize project root: {dir}"));
            delta.project_root = Some(target);
        }
    }

    debug!(tasks = todos.len(), "plan decomposed");
    ctx.emit(AgentEvent::PlanReady {
        plan: plan_text.clone(),
        todos: todos.clone(),
    })
    .await;

    delta.messages = vec![Message::system(prompts::plan_summary_message(
        &plan_text, &todos,
    ))];
    delta.todos = Some(todos);
    Ok(NodeOutcome::new(delta, Node::Executor))
}

/// One structured-output call with a single clarifying retry on a schema
/// violation, per the error-handling contract.
async fn structured_call(
    state: &AgentState,
    ctx: &NodeCtx,
    prompt: &str,
    schema: Value,
) -> Result<Value, String> {
    let base: Vec<Message> = {
        let mut m = vec![Message::system(prompt.to_string())];
        m.extend(state.messages.iter().cloned());
        m
    };

    for attempt in 0..2 {
        let mut messages = base.clone();
        if attempt > 0 {
            messages.push(Message::system(
                "Your previous reply was not a valid JSON document matching the \
                 required schema. Respond with the JSON object only — no prose.",
            ));
        }
        let req = CompletionRequest {
            messages,
            structured_output: Some(schema.clone()),
            ..Default::default()
        };
        let reply = invoke_with_retry(ctx.model.as_ref(), &req, ctx.config.model.retry_attempts)
            .await
            .map_err(|e| format!("planner model call failed: {e:#}"))?;
        match serde_json::from_str::<Value>(reply.content.trim()) {
            Ok(v) if v.is_object() => return Ok(v),
            _ => warn!(attempt, "planner reply violated the output schema"),
        }
    }
    Err("planner reply violated the output schema twice".into())
}

async fn fail(ctx: &NodeCtx, error: String) -> NodeOutcome {
    warn!(error = %error, "planner failed");
    ctx.emit(AgentEvent::Error(error.clone())).await;
    NodeOutcome::new(
        StateDelta {
            messages: vec![Message::system(format!(
                "Planning failed and the thread ends here: {error}. \
                 Retry the request, possibly with a more specific description."
            ))],
            error: Some(error),
            task_status: Some(TaskStatus::Completed),
            ..Default::default()
        },
        Node::End,
    )
}
