// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use tracing::debug;

use otto_model::Message;
use otto_state::{AgentState, StateDelta};
use otto_tools::{DenyList, ExecutionContext, ToolCall};

use super::{Node, NodeCtx, NodeOutcome};
use crate::events::AgentEvent;

/// Execute the pending tool calls and normalize the results back into the
/// message stream.  Always clears the pending set, resets the iteration
/// counter, and marks the project tree for a refresh before returning to the
/// executor.
///
/// With `reject_sensitive` (an approval rejection) every sensitive call is
/// answered with a synthetic error result instead of executing; read-only
/// calls in the same batch still run.
pub(crate) async fn run(
    state: &AgentState,
    ctx: &NodeCtx,
    reject_sensitive: bool,
) -> anyhow::Result<NodeOutcome> {
    let exec_ctx = ExecutionContext::new(state.project_root.clone())
        .with_deny_list(DenyList::from_config(&ctx.config.tools))
        .with_processes(ctx.processes.clone())
        .with_cancel_flag(ctx.cancel.clone());
    let cap = ctx.config.agent.tool_result_char_cap;

    let mut messages = Vec::with_capacity(state.pending_tool_calls.len());
    for tc in &state.pending_tool_calls {
        if reject_sensitive && ctx.tools.is_sensitive(&tc.name) {
            debug!(tool = %tc.name, "sensitive call rejected by user");
            ctx.emit(AgentEvent::ToolCallFinished {
                call_id: tc.id.clone(),
                tool_name: tc.name.clone(),
                output: "user rejected".into(),
                is_error: true,
            })
            .await;
            messages.push(Message::tool_error(&tc.id, &tc.name, "user rejected"));
            continue;
        }

        ctx.emit(AgentEvent::ToolCallStarted(tc.clone())).await;

        let output = if tc.args.is_object() {
            let call = ToolCall {
                id: tc.id.clone(),
                name: tc.name.clone(),
                args: tc.args.clone(),
            };
            ctx.tools.execute(&call, &exec_ctx).await
        } else {
            otto_tools::ToolOutput::err(
                &tc.id,
                format!("invalid arguments for {}: expected a JSON object", tc.name),
            )
        };

        let content = truncate_result(&output.content, cap);
        ctx.emit(AgentEvent::ToolCallFinished {
            call_id: tc.id.clone(),
            tool_name: tc.name.clone(),
            output: content.clone(),
            is_error: output.is_error,
        })
        .await;

        messages.push(if output.is_error {
            Message::tool_error(&tc.id, &tc.name, content)
        } else {
            Message::tool_result(&tc.id, &tc.name, content)
        });
    }

    Ok(NodeOutcome::new(
        StateDelta {
            messages,
            pending_tool_calls: Some(Vec::new()),
            iteration_count: Some(0),
            project_tree_injected: Some(false),
            ..Default::default()
        },
        Node::Executor,
    ))
}

/// Head-preserving cut with an explicit omission notice.  `cap == 0`
/// disables truncation.
fn truncate_result(content: &str, cap: usize) -> String {
    if cap == 0 || content.chars().count() <= cap {
        return content.to_string();
    }
    let kept: String = content.chars().take(cap).collect();
    let omitted = content.chars().count() - cap;
    format!("{kept}\n[... {omitted} characters omitted ...]")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_results_pass_through() {
        assert_eq!(truncate_result("short", 100), "short");
    }

    #[test]
    fn long_results_get_notice() {
        let out = truncate_result(&"x".repeat(200), 50);
        assert!(out.contains("150 characters omitted"));
        assert!(out.starts_with(&"x".repeat(50)));
    }

    #[test]
    fn zero_cap_disables_truncation() {
        let long = "y".repeat(500);
        assert_eq!(truncate_result(&long, 0), long);
    }
}
