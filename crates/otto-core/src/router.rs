// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The routing decision table.
//!
//! `route` is a pure function of the state (plus the registry's sensitivity
//! flags): given the same state it always returns the same next node.  The
//! executor delegates its post-reply classification here so the table below
//! is the single source of routing truth.
//!
//! Decision order (ties: earlier rows dominate):
//!
//! | last message        | condition                                   | next      |
//! |---------------------|---------------------------------------------|-----------|
//! | assistant+toolcalls | any sensitive tool ∧ !demo_mode             | Review    |
//! | assistant+toolcalls | otherwise                                   | Tools     |
//! | tool result         | —                                           | Executor  |
//! | any                 | todos non-empty ∧ cursor ≥ len              | End       |
//! | assistant text      | completion signal                           | AdvanceTodo |
//! | assistant text      | help request ∧ recent tool result           | AdvanceTodo |
//! | assistant text      | ambiguous ∧ stuck ∧ no recent tool result   | AdvanceTodo |
//! | assistant text      | otherwise                                   | Executor  |
//! | any                 | messages.len() > summary trigger            | Summarize |
//! | —                   | —                                           | End       |

use otto_config::AgentConfig;
use otto_model::Message;
use otto_state::AgentState;
use otto_tools::ToolRegistry;

use crate::classify::{classify_content, recent_tool_result, ContentClass};

/// Window of trailing messages inspected for a recent tool result.
pub const RECENT_TOOL_WINDOW: usize = 10;

/// The next phase chosen by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextNode {
    Tools,
    Review,
    Summarize,
    Executor,
    AdvanceTodo,
    End,
}

/// Pure routing decision; see the module table.
pub fn route(state: &AgentState, registry: &ToolRegistry, config: &AgentConfig) -> NextNode {
    // 1. Pending tool calls on the last assistant message.
    if let Some(Message::Assistant { tool_calls, .. }) = state.last_message() {
        if !tool_calls.is_empty() {
            let sensitive = tool_calls.iter().any(|tc| registry.is_sensitive(&tc.name));
            return if sensitive && !state.demo_mode {
                NextNode::Review
            } else {
                NextNode::Tools
            };
        }
    }

    // 2. A tool result always hands control back to the executor; the
    //    current todo is not advanced.
    if matches!(state.last_message(), Some(m) if m.is_tool_result()) {
        return NextNode::Executor;
    }

    // 3. All todos worked through.
    if state.todos_exhausted() {
        return NextNode::End;
    }

    // 4. Classify a textual assistant reply.
    if let Some(Message::Assistant { content, tool_calls, .. }) = state.last_message() {
        if tool_calls.is_empty() {
            let recent_tool = recent_tool_result(&state.messages, RECENT_TOOL_WINDOW);
            match classify_content(content) {
                ContentClass::CompletionSignal => return NextNode::AdvanceTodo,
                ContentClass::AskForHelp if recent_tool => return NextNode::AdvanceTodo,
                ContentClass::Ambiguous
                    if state.iteration_count >= config.soft_stuck_after && !recent_tool =>
                {
                    return NextNode::AdvanceTodo
                }
                ContentClass::AskForHelp | ContentClass::Continuation => {
                    return NextNode::Executor
                }
                ContentClass::Ambiguous => {}
            }
        }
    }

    // 5. Compress the log before it grows without bound.
    if state.messages.len() > config.summary_trigger {
        return NextNode::Summarize;
    }

    // 6. Nothing left to do.
    NextNode::End
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use otto_model::{Message, ToolCallRequest};
    use otto_state::TaskStatus;
    use otto_tools::default_registry;
    use serde_json::json;

    use super::*;

    fn config() -> AgentConfig {
        AgentConfig::default()
    }

    fn executing_state() -> AgentState {
        let mut s = AgentState::default();
        s.todos = vec!["create hello.txt".into()];
        s.task_status = TaskStatus::Executing;
        s
    }

    fn tool_call(name: &str) -> Message {
        Message::assistant_with_tool_calls(
            "",
            vec![ToolCallRequest::new("tc-1", name, json!({}))],
        )
    }

    #[test]
    fn sensitive_tool_without_demo_goes_to_review() {
        let mut s = executing_state();
        s.messages.push(tool_call("write_file"));
        assert_eq!(route(&s, &default_registry(30), &config()), NextNode::Review);
    }

    #[test]
    fn sensitive_tool_in_demo_mode_goes_to_tools() {
        let mut s = executing_state();
        s.demo_mode = true;
        s.messages.push(tool_call("write_file"));
        assert_eq!(route(&s, &default_registry(30), &config()), NextNode::Tools);
    }

    #[test]
    fn read_only_tool_goes_straight_to_tools() {
        let mut s = executing_state();
        s.messages.push(tool_call("read_file"));
        assert_eq!(route(&s, &default_registry(30), &config()), NextNode::Tools);
    }

    #[test]
    fn tool_result_continues_current_todo() {
        let mut s = executing_state();
        s.messages.push(tool_call("read_file"));
        s.messages.push(Message::tool_result("tc-1", "read_file", "content"));
        assert_eq!(route(&s, &default_registry(30), &config()), NextNode::Executor);
    }

    #[test]
    fn exhausted_todos_end_the_thread() {
        let mut s = executing_state();
        s.current_todo_index = 1;
        s.messages.push(Message::human("x"));
        assert_eq!(route(&s, &default_registry(30), &config()), NextNode::End);
    }

    #[test]
    fn completion_signal_advances() {
        let mut s = executing_state();
        s.messages.push(Message::assistant("✅ done — file created"));
        assert_eq!(
            route(&s, &default_registry(30), &config()),
            NextNode::AdvanceTodo
        );
    }

    #[test]
    fn help_after_tool_use_is_implicit_completion() {
        let mut s = executing_state();
        s.messages.push(tool_call("read_file"));
        s.messages.push(Message::tool_result("tc-1", "read_file", "x"));
        s.messages
            .push(Message::assistant("Everything is written; let me know what's next."));
        assert_eq!(
            route(&s, &default_registry(30), &config()),
            NextNode::AdvanceTodo
        );
    }

    #[test]
    fn help_without_tool_use_continues() {
        let mut s = executing_state();
        s.messages
            .push(Message::assistant("Please let me know which port to use."));
        assert_eq!(route(&s, &default_registry(30), &config()), NextNode::Executor);
    }

    #[test]
    fn continuation_returns_to_executor() {
        let mut s = executing_state();
        s.messages
            .push(Message::assistant("Now I will read the manifest to check deps."));
        assert_eq!(route(&s, &default_registry(30), &config()), NextNode::Executor);
    }

    #[test]
    fn stuck_ambiguous_reply_forces_progress() {
        let mut s = executing_state();
        s.iteration_count = 5;
        s.messages.push(Message::assistant("hm"));
        assert_eq!(
            route(&s, &default_registry(30), &config()),
            NextNode::AdvanceTodo
        );
    }

    #[test]
    fn ambiguous_but_not_stuck_falls_through() {
        let mut s = executing_state();
        s.iteration_count = 1;
        s.messages.push(Message::assistant("hm"));
        // Not stuck, log short → End.
        assert_eq!(route(&s, &default_registry(30), &config()), NextNode::End);
    }

    #[test]
    fn long_log_routes_to_summarize() {
        let mut s = executing_state();
        for i in 0..45 {
            s.messages.push(Message::human(format!("turn {i}")));
        }
        assert_eq!(route(&s, &default_registry(30), &config()), NextNode::Summarize);
    }

    #[test]
    fn empty_state_ends() {
        let s = AgentState::default();
        assert_eq!(route(&s, &default_registry(30), &config()), NextNode::End);
    }

    #[test]
    fn route_is_deterministic() {
        let mut s = executing_state();
        s.messages.push(Message::assistant("✅ done"));
        let reg = default_registry(30);
        let first = route(&s, &reg, &config());
        for _ in 0..10 {
            assert_eq!(route(&s, &reg, &config()), first);
        }
    }
}
