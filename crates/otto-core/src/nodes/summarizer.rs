// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use tracing::{debug, warn};

use otto_model::{invoke_with_retry, CompletionRequest, Message};
use otto_state::{AgentState, StateDelta};

use super::{Node, NodeCtx, NodeOutcome};
use crate::events::AgentEvent;
use crate::prompts;

/// Compress the oldest prefix of the message log into the rolling summary.
///
/// The cut point starts `summary_keep_tail` messages from the end and moves
/// forward past any tool-result run, so the cut never lands on a tool result
/// and the kept tail never exceeds `summary_keep_tail` messages.  A tool
/// interaction straddling the baseline is summarized as a whole (call and
/// results together), which keeps the tail free of orphaned results.  The
/// summarized prefix is removed via tombstones; the summary text itself
/// lives in the `summary` state field and is injected as a context block by
/// the executor.
pub(crate) async fn run(state: &AgentState, ctx: &NodeCtx) -> anyhow::Result<NodeOutcome> {
    let keep_tail = ctx.config.agent.summary_keep_tail;
    let cut = summary_cut_index(&state.messages, keep_tail);
    if cut == 0 {
        debug!("nothing to summarize");
        return Ok(NodeOutcome::goto(Node::Executor));
    }

    let mut history = String::new();
    if !state.summary.is_empty() {
        history.push_str(&format!("Previous summary:\n{}\n\n", state.summary));
    }
    history.push_str(&serialize_history(&state.messages[..cut]));

    let req = CompletionRequest {
        messages: vec![Message::human(prompts::summarize_prompt(&history))],
        ..Default::default()
    };
    match invoke_with_retry(ctx.model.as_ref(), &req, ctx.config.model.retry_attempts).await {
        Ok(reply) if !reply.content.trim().is_empty() => {
            debug!(summarized = cut, "log prefix compressed");
            ctx.emit(AgentEvent::SummaryCreated { summarized: cut }).await;
            let messages: Vec<Message> = state.messages[..cut]
                .iter()
                .map(|m| Message::remove(m.id()))
                .collect();
            Ok(NodeOutcome::new(
                StateDelta {
                    messages,
                    summary: Some(reply.content.trim().to_string()),
                    ..Default::default()
                },
                Node::Executor,
            ))
        }
        Ok(_) => {
            // An empty summary would silently lose the prefix; keep the log
            // intact and let the executor proceed with the long context.
            warn!("summarizer returned empty text; skipping compression");
            Ok(NodeOutcome::goto(Node::Executor))
        }
        Err(e) => {
            let error = format!("summarization failed: {e:#}");
            warn!(error = %error, "summarizer model call failed");
            ctx.emit(AgentEvent::Error(error.clone())).await;
            Ok(NodeOutcome::new(
                StateDelta {
                    messages: vec![Message::system(
                        "The agent run failed while compressing conversation history: \
                         the language model could not be reached. The thread is \
                         checkpointed and can be resumed.",
                    )],
                    error: Some(error),
                    ..Default::default()
                },
                Node::End,
            ))
        }
    }
}

/// Serialize a message slice into plain text for the summary prompt.
pub(crate) fn serialize_history(messages: &[Message]) -> String {
    messages
        .iter()
        .filter_map(|m| match m {
            Message::Human { content, .. } => Some(format!("User: {content}")),
            Message::System { content, .. } => Some(format!("Context: {content}")),
            Message::Assistant {
                content,
                tool_calls,
                ..
            } => {
                if tool_calls.is_empty() {
                    Some(format!("Assistant: {content}"))
                } else {
                    let calls: Vec<String> = tool_calls
                        .iter()
                        .map(|tc| format!("{}({})", tc.name, tc.args))
                        .collect();
                    Some(format!("Assistant called: {}", calls.join(", ")))
                }
            }
            Message::ToolResult { name, content, .. } => {
                Some(format!("Tool {name} returned: {content}"))
            }
            Message::Remove { .. } => None,
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Compute the cut index for a message log; exposed for property tests.
///
/// The result is never below `len - keep_tail`: the search starts at that
/// baseline and advances forward while it would land on a tool result, so
/// the kept tail is at most `keep_tail` messages long.
pub fn summary_cut_index(messages: &[Message], keep_tail: usize) -> usize {
    let mut cut = messages.len().saturating_sub(keep_tail);
    while cut < messages.len() && messages[cut].is_tool_result() {
        cut += 1;
    }
    cut
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
