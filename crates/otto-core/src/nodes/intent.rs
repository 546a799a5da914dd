// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use tracing::{debug, warn};

use otto_model::{invoke_with_retry, CompletionRequest, Message};
use otto_state::{AgentState, StateDelta, UserIntent};

use super::{Node, NodeCtx, NodeOutcome};
use crate::events::AgentEvent;
use crate::prompts;

/// Classify the user turn as `task` or `chat` with one structured call.
/// Any failure defaults to `chat` — the user can simply retry.
pub(crate) async fn run(state: &AgentState, ctx: &NodeCtx) -> anyhow::Result<NodeOutcome> {
    let mut messages = vec![Message::system(prompts::intent_prompt())];
    messages.extend(state.messages.iter().cloned());
    let req = CompletionRequest {
        messages,
        structured_output: Some(prompts::intent_schema()),
        ..Default::default()
    };

    let (intent, confidence) = match invoke_with_retry(
        ctx.model.as_ref(),
        &req,
        ctx.config.model.retry_attempts,
    )
    .await
    {
        Ok(reply) => parse_intent(&reply.content).unwrap_or_else(|| {
            warn!("unparseable intent reply; defaulting to chat");
            (UserIntent::Chat, 0.0)
        }),
        Err(e) => {
            warn!(error = %e, "intent classification failed; defaulting to chat");
            (UserIntent::Chat, 0.0)
        }
    };

    debug!(?intent, confidence, "intent classified");
    ctx.emit(AgentEvent::IntentClassified { intent, confidence }).await;

    let next = match intent {
        UserIntent::Task => Node::Planner,
        UserIntent::Chat => Node::ChatResponder,
    };
    Ok(NodeOutcome::new(
        StateDelta {
            user_intent: Some(intent),
            ..Default::default()
        },
        next,
    ))
}

fn parse_intent(content: &str) -> Option<(UserIntent, f32)> {
    let value: serde_json::Value = serde_json::from_str(content.trim()).ok()?;
    let intent = match value["intent"].as_str()? {
        "task" => UserIntent::Task,
        "chat" => UserIntent::Chat,
        _ => return None,
    };
    let confidence = value["confidence"].as_f64().unwrap_or(0.0) as f32;
    Some((intent, confidence))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
