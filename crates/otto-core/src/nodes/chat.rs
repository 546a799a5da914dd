// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use tracing::warn;

use otto_model::{invoke_with_retry, CompletionRequest, Message};
use otto_state::{AgentState, StateDelta, TaskStatus};

use super::{Node, NodeCtx, NodeOutcome};
use crate::events::AgentEvent;
use crate::prompts;

/// Single-reply chat path: no planner, no executor, no tools.
pub(crate) async fn run(state: &AgentState, ctx: &NodeCtx) -> anyhow::Result<NodeOutcome> {
    let mut messages = vec![Message::system(prompts::system_prompt(
        ctx.config.agent.system_prompt.as_deref(),
    ))];
    messages.extend(state.messages.iter().cloned());
    let req = CompletionRequest {
        messages,
        ..Default::default()
    };

    match invoke_with_retry(ctx.model.as_ref(), &req, ctx.config.model.retry_attempts).await {
        Ok(reply) => {
            ctx.emit(AgentEvent::TextComplete(reply.content.clone())).await;
            Ok(NodeOutcome::new(
                StateDelta {
                    messages: vec![Message::assistant(reply.content)],
                    task_status: Some(TaskStatus::Completed),
                    ..Default::default()
                },
                Node::End,
            ))
        }
        Err(e) => {
            warn!(error = %e, "chat reply failed");
            let error = format!("chat reply failed: {e:#}");
            ctx.emit(AgentEvent::Error(error.clone())).await;
            Ok(NodeOutcome::new(
                StateDelta {
                    messages: vec![Message::system(
                        "The agent could not reach the language model to answer; the thread \
                         ends here. Check connectivity and retry the request.",
                    )],
                    error: Some(error),
                    task_status: Some(TaskStatus::Completed),
                    ..Default::default()
                },
                Node::End,
            ))
        }
    }
}
