// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use tracing::debug;

use otto_state::{AgentState, StateDelta, TaskStatus};

use super::{Node, NodeCtx, NodeOutcome};
use crate::events::AgentEvent;

/// Move the todo cursor forward by one.  On the last todo the thread
/// completes; otherwise the executor continues with a fresh iteration
/// budget.
pub(crate) async fn run(state: &AgentState, ctx: &NodeCtx) -> anyhow::Result<NodeOutcome> {
    let next_index = state.current_todo_index + 1;
    let total = state.todos.len();

    if next_index >= total {
        debug!(total, "final todo finished");
        return Ok(NodeOutcome::new(
            StateDelta {
                current_todo_index: Some(total),
                task_status: Some(TaskStatus::Completed),
                task_completed: Some(true),
                iteration_count: Some(0),
                ..Default::default()
            },
            Node::End,
        ));
    }

    debug!(index = next_index, total, "advancing to next todo");
    ctx.emit(AgentEvent::TodoAdvanced {
        index: next_index,
        total,
    })
    .await;
    Ok(NodeOutcome::new(
        StateDelta {
            current_todo_index: Some(next_index),
            task_completed: Some(true),
            iteration_count: Some(0),
            ..Default::default()
        },
        Node::Executor,
    ))
}
