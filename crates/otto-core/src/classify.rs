// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Assistant-reply classification and cycle detection.
//!
//! The keyword predicate is a pragmatic fallback inherited from the original
//! system; the lists deliberately include the multi-language phrases the
//! models actually emit.

use otto_model::Message;

/// Tools for which repeated consecutive calls are legitimate — writing many
/// files in sequence is the normal shape of scaffolding work.
pub const FILE_WRITER_TOOLS: &[&str] = &["write_file", "edit_file"];

const COMPLETION_KEYWORDS: &[&str] = &[
    "任务完成",
    "已完成",
    "completed",
    "done",
    "✅",
    "finished",
    "all set",
];

const HELP_KEYWORDS: &[&str] = &[
    "需要帮助",
    "let me know",
    "need help",
    "need your",
    "please provide",
    "could you clarify",
];

/// How an assistant text reply should steer the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentClass {
    /// Explicit completion signal ("✅ done" etc.)
    CompletionSignal,
    /// The model is soliciting input from the user
    AskForHelp,
    /// Substantive text that continues the current task
    Continuation,
    /// Empty or noise — nothing to act on
    Ambiguous,
}

/// Classify assistant text content via the keyword predicate.
/// Completion dominates help-solicitation; both dominate continuation.
pub fn classify_content(text: &str) -> ContentClass {
    let trimmed = text.trim();
    if trimmed.len() <= 10 {
        return ContentClass::Ambiguous;
    }
    let lower = trimmed.to_lowercase();
    if COMPLETION_KEYWORDS.iter().any(|k| lower.contains(&k.to_lowercase())) {
        return ContentClass::CompletionSignal;
    }
    if HELP_KEYWORDS.iter().any(|k| lower.contains(&k.to_lowercase())) {
        return ContentClass::AskForHelp;
    }
    ContentClass::Continuation
}

/// True when a tool result appears among the last `window` messages.
pub fn recent_tool_result(messages: &[Message], window: usize) -> bool {
    messages
        .iter()
        .rev()
        .take(window)
        .any(|m| m.is_tool_result())
}

/// Which cycle detector fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    /// The last two assistant replies share a long common prefix
    RepeatText,
    /// The last four assistant tool-call messages all call the same tool
    RepeatToolCalls,
    /// The last three plain replies are mutually prefix-similar
    RepeatReply,
}

impl LoopKind {
    pub fn reason(&self) -> &'static str {
        match self {
            LoopKind::RepeatText => "repeated assistant text",
            LoopKind::RepeatToolCalls => "repeated identical tool calls",
            LoopKind::RepeatReply => "repeated similar replies",
        }
    }
}

/// Run the three loop detectors in order; the first positive wins.
pub fn detect_loop(messages: &[Message]) -> Option<LoopKind> {
    if repeat_text_loop(messages) {
        return Some(LoopKind::RepeatText);
    }
    if repeat_tool_loop(messages) {
        return Some(LoopKind::RepeatToolCalls);
    }
    if repeat_reply_loop(messages) {
        return Some(LoopKind::RepeatReply);
    }
    None
}

/// Common prefix length of two strings, in characters.
fn common_prefix_chars(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Last two assistant messages share a prefix of ≥ 50 chars and the latest
/// is more than noise.
fn repeat_text_loop(messages: &[Message]) -> bool {
    let mut assistants = messages.iter().rev().filter(|m| m.is_assistant());
    let (Some(last), Some(prev)) = (assistants.next(), assistants.next()) else {
        return false;
    };
    let (Some(a), Some(b)) = (last.content_text(), prev.content_text()) else {
        return false;
    };
    a.chars().count() > 10 && common_prefix_chars(a, b) >= 50
}

/// Among the last 15 messages, the last 4 assistant tool-call messages all
/// call the same tool — except when that tool is a file writer.
fn repeat_tool_loop(messages: &[Message]) -> bool {
    let start = messages.len().saturating_sub(15);
    let tool_names: Vec<&str> = messages[start..]
        .iter()
        .filter(|m| m.is_assistant() && !m.tool_calls().is_empty())
        .map(|m| m.tool_calls()[0].name.as_str())
        .collect();
    if tool_names.len() < 4 {
        return false;
    }
    let last_four = &tool_names[tool_names.len() - 4..];
    let first = last_four[0];
    if FILE_WRITER_TOOLS.contains(&first) {
        return false;
    }
    last_four.iter().all(|n| *n == first)
}

/// The last 3 assistant messages with no tool calls have content prefixes
/// that are mutually similar (≥ 100-char overlap) and are more than noise.
fn repeat_reply_loop(messages: &[Message]) -> bool {
    let texts: Vec<&str> = messages
        .iter()
        .rev()
        .filter(|m| m.is_assistant() && m.tool_calls().is_empty())
        .filter_map(|m| m.content_text())
        .take(3)
        .collect();
    if texts.len() < 3 {
        return false;
    }
    if texts.iter().any(|t| t.chars().count() <= 10) {
        return false;
    }
    for i in 0..texts.len() {
        for j in (i + 1)..texts.len() {
            if common_prefix_chars(texts[i], texts[j]) < 100 {
                return false;
            }
        }
    }
    true
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use otto_model::{Message, ToolCallRequest};
    use serde_json::json;

    use super::*;

    // ── Content classification ────────────────────────────────────────────────

    #[test]
    fn completion_keyword_english() {
        assert_eq!(
            classify_content("The task has been completed successfully."),
            ContentClass::CompletionSignal
        );
    }

    #[test]
    fn completion_keyword_chinese() {
        assert_eq!(
            classify_content("好的，这个任务完成了，请查看文件。"),
            ContentClass::CompletionSignal
        );
    }

    #[test]
    fn completion_checkmark() {
        assert_eq!(
            classify_content("✅ created hello.txt with the requested content"),
            ContentClass::CompletionSignal
        );
    }

    #[test]
    fn help_solicitation() {
        assert_eq!(
            classify_content("I'm stuck — please let me know which database to use."),
            ContentClass::AskForHelp
        );
    }

    #[test]
    fn completion_dominates_help() {
        assert_eq!(
            classify_content("✅ done — let me know if anything else is needed"),
            ContentClass::CompletionSignal
        );
    }

    #[test]
    fn plain_text_is_continuation() {
        assert_eq!(
            classify_content("Next I will inspect the Cargo manifest for dependencies."),
            ContentClass::Continuation
        );
    }

    #[test]
    fn short_text_is_ambiguous() {
        assert_eq!(classify_content("ok"), ContentClass::Ambiguous);
        assert_eq!(classify_content("   "), ContentClass::Ambiguous);
    }

    // ── Recent tool result ────────────────────────────────────────────────────

    #[test]
    fn recent_tool_result_respects_window() {
        let mut messages = vec![Message::assistant_with_tool_calls(
            "",
            vec![ToolCallRequest::new("tc", "grep", json!({}))],
        )];
        messages.push(Message::tool_result("tc", "grep", "out"));
        for _ in 0..10 {
            messages.push(Message::assistant("filler text of some length"));
        }
        assert!(!recent_tool_result(&messages, 10));
        assert!(recent_tool_result(&messages, 12));
    }

    // ── Loop detectors ────────────────────────────────────────────────────────

    fn tool_call_msg(name: &str) -> Message {
        Message::assistant_with_tool_calls(
            "",
            vec![ToolCallRequest::new("tc", name, json!({"path": "x"}))],
        )
    }

    #[test]
    fn repeat_text_fires_on_long_shared_prefix() {
        let shared = "I will now analyse the repository structure and report on it";
        let messages = vec![
            Message::assistant(format!("{shared} in detail.")),
            Message::assistant(format!("{shared} once more.")),
        ];
        assert_eq!(detect_loop(&messages), Some(LoopKind::RepeatText));
    }

    #[test]
    fn repeat_text_ignores_short_prefixes() {
        let messages = vec![
            Message::assistant("Reading the manifest now."),
            Message::assistant("Running the test suite now."),
        ];
        assert_eq!(detect_loop(&messages), None);
    }

    #[test]
    fn repeat_tool_fires_on_four_identical_tools() {
        let messages: Vec<Message> = (0..4).map(|_| tool_call_msg("grep")).collect();
        assert_eq!(detect_loop(&messages), Some(LoopKind::RepeatToolCalls));
    }

    #[test]
    fn repeat_tool_exempts_file_writers() {
        let messages: Vec<Message> = (0..4).map(|_| tool_call_msg("write_file")).collect();
        assert_eq!(detect_loop(&messages), None);
    }

    #[test]
    fn repeat_tool_needs_four_calls() {
        let messages: Vec<Message> = (0..3).map(|_| tool_call_msg("grep")).collect();
        assert_eq!(detect_loop(&messages), None);
    }

    #[test]
    fn repeat_tool_mixed_tools_do_not_fire() {
        let messages = vec![
            tool_call_msg("grep"),
            tool_call_msg("read_file"),
            tool_call_msg("grep"),
            tool_call_msg("read_file"),
        ];
        assert_eq!(detect_loop(&messages), None);
    }

    #[test]
    fn repeat_reply_fires_on_three_similar_replies() {
        let base = "a".repeat(120);
        let messages = vec![
            Message::assistant(format!("{base} first")),
            Message::assistant(format!("{base} second")),
            Message::assistant(format!("{base} third")),
        ];
        assert_eq!(detect_loop(&messages), Some(LoopKind::RepeatReply));
    }

    #[test]
    fn repeat_reply_needs_hundred_char_overlap() {
        let messages = vec![
            Message::assistant("short shared prefix one ........................"),
            Message::assistant("short shared prefix two ........................"),
            Message::assistant("short shared prefix three ......................"),
        ];
        assert_eq!(detect_loop(&messages), None);
    }

    #[test]
    fn text_loop_wins_over_reply_loop() {
        // Both conditions hold; detector order makes RepeatText win.
        let base = "b".repeat(150);
        let messages = vec![
            Message::assistant(base.clone()),
            Message::assistant(base.clone()),
            Message::assistant(base),
        ];
        assert_eq!(detect_loop(&messages), Some(LoopKind::RepeatText));
    }
}
