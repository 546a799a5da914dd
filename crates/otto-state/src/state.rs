// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use otto_model::{Message, ToolCallRequest};

use crate::reducer::reduce_messages;

/// Where the thread currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Planning,
    Executing,
    Completed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Planning => write!(f, "planning"),
            TaskStatus::Executing => write!(f, "executing"),
            TaskStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Classified intent of the opening user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserIntent {
    Task,
    Chat,
}

/// Invariant breaches are fatal to a thread.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("todo cursor {index} out of range for {len} todos")]
    TodoCursorOutOfRange { index: usize, len: usize },
    #[error("task status is `executing` but the todo list is empty")]
    ExecutingWithoutTodos,
    #[error("iteration count {count} exceeds the budget of {max}")]
    IterationOverrun { count: u32, max: u32 },
    #[error("duplicate message id in log: {id}")]
    DuplicateMessageId { id: String },
    #[error("tool result {tool_call_id} has no matching assistant tool call")]
    OrphanToolResult { tool_call_id: String },
}

fn default_project_root() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn default_max_iterations() -> u32 {
    50
}

/// The single value threaded through every node of the graph.
///
/// Reducer semantics are explicit per field: `messages` is the only
/// append-style field (tombstone-aware, see [`reduce_messages`]); every other
/// field is replace-when-present via [`StateDelta`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub summary: String,
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,
    #[serde(default)]
    pub project_tree_injected: bool,
    #[serde(default)]
    pub project_tree_text: String,
    #[serde(default)]
    pub project_plan_text: String,
    #[serde(default)]
    pub tech_stack_summary: String,
    #[serde(default)]
    pub project_init_steps: Vec<String>,
    /// Concrete engineering actions, in execution order.
    #[serde(default)]
    pub todos: Vec<String>,
    /// Cursor into `todos`; `todos.len()` means all done.
    #[serde(default)]
    pub current_todo_index: usize,
    #[serde(default)]
    pub task_status: TaskStatus,
    /// Transient flag set when a todo just finished.
    #[serde(default)]
    pub task_completed: bool,
    /// Executor ticks since the last tool result or todo advance.
    #[serde(default)]
    pub iteration_count: u32,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default)]
    pub pending_tool_calls: Vec<ToolCallRequest>,
    /// File paths to inject into context on the next initialization pass
    /// (consumed by the initializer).
    #[serde(default)]
    pub pending_file_paths: Vec<PathBuf>,
    #[serde(default)]
    pub error: String,
    /// When true, sensitive tool calls bypass human approval.
    #[serde(default)]
    pub demo_mode: bool,
    #[serde(default)]
    pub user_intent: Option<UserIntent>,
}

impl Default for AgentState {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            summary: String::new(),
            project_root: default_project_root(),
            project_tree_injected: false,
            project_tree_text: String::new(),
            project_plan_text: String::new(),
            tech_stack_summary: String::new(),
            project_init_steps: Vec::new(),
            todos: Vec::new(),
            current_todo_index: 0,
            task_status: TaskStatus::Planning,
            task_completed: false,
            iteration_count: 0,
            max_iterations: default_max_iterations(),
            pending_tool_calls: Vec::new(),
            pending_file_paths: Vec::new(),
            error: String::new(),
            demo_mode: false,
            user_intent: None,
        }
    }
}

/// Partial update returned by a node.  `messages` goes through the tombstone
/// reducer; every `Some` field replaces the current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateDelta {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
    pub summary: Option<String>,
    pub project_root: Option<PathBuf>,
    pub project_tree_injected: Option<bool>,
    pub project_tree_text: Option<String>,
    pub project_plan_text: Option<String>,
    pub tech_stack_summary: Option<String>,
    pub project_init_steps: Option<Vec<String>>,
    pub todos: Option<Vec<String>>,
    pub current_todo_index: Option<usize>,
    pub task_status: Option<TaskStatus>,
    pub task_completed: Option<bool>,
    pub iteration_count: Option<u32>,
    pub max_iterations: Option<u32>,
    pub pending_tool_calls: Option<Vec<ToolCallRequest>>,
    pub pending_file_paths: Option<Vec<PathBuf>>,
    pub error: Option<String>,
    pub demo_mode: Option<bool>,
    pub user_intent: Option<UserIntent>,
}

impl StateDelta {
    /// Delta that only appends messages.
    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }
}

impl AgentState {
    /// A fresh state for a new thread rooted at `project_root`.
    pub fn new(project_root: PathBuf) -> Self {
        Self {
            project_root,
            ..Default::default()
        }
    }

    /// Apply a node delta: per-field reducers, messages through the
    /// tombstone-aware append reducer.
    pub fn apply(&mut self, delta: StateDelta) {
        reduce_messages(&mut self.messages, delta.messages);
        if let Some(v) = delta.summary {
            self.summary = v;
        }
        if let Some(v) = delta.project_root {
            self.project_root = v;
        }
        if let Some(v) = delta.project_tree_injected {
            self.project_tree_injected = v;
        }
        if let Some(v) = delta.project_tree_text {
            self.project_tree_text = v;
        }
        if let Some(v) = delta.project_plan_text {
            self.project_plan_text = v;
        }
        if let Some(v) = delta.tech_stack_summary {
            self.tech_stack_summary = v;
        }
        if let Some(v) = delta.project_init_steps {
            self.project_init_steps = v;
        }
        if let Some(v) = delta.todos {
            self.todos = v;
        }
        if let Some(v) = delta.current_todo_index {
            self.current_todo_index = v;
        }
        if let Some(v) = delta.task_status {
            self.task_status = v;
        }
        if let Some(v) = delta.task_completed {
            self.task_completed = v;
        }
        if let Some(v) = delta.iteration_count {
            self.iteration_count = v;
        }
        if let Some(v) = delta.max_iterations {
            self.max_iterations = v;
        }
        if let Some(v) = delta.pending_tool_calls {
            self.pending_tool_calls = v;
        }
        if let Some(v) = delta.pending_file_paths {
            self.pending_file_paths = v;
        }
        if let Some(v) = delta.error {
            self.error = v;
        }
        if let Some(v) = delta.demo_mode {
            self.demo_mode = v;
        }
        if let Some(v) = delta.user_intent {
            self.user_intent = Some(v);
        }
    }

    /// The current todo text, when the cursor points at one.
    pub fn current_todo(&self) -> Option<&str> {
        self.todos.get(self.current_todo_index).map(|s| s.as_str())
    }

    /// True once every todo has been worked through.
    pub fn todos_exhausted(&self) -> bool {
        !self.todos.is_empty() && self.current_todo_index >= self.todos.len()
    }

    /// Verify the structural invariants that must hold after every reducer
    /// application.  A breach is fatal to the thread.
    pub fn check_invariants(&self) -> Result<(), StateError> {
        if self.current_todo_index > self.todos.len() {
            return Err(StateError::TodoCursorOutOfRange {
                index: self.current_todo_index,
                len: self.todos.len(),
            });
        }
        if self.todos.is_empty() && self.task_status == TaskStatus::Executing {
            return Err(StateError::ExecutingWithoutTodos);
        }
        if self.iteration_count > self.max_iterations {
            return Err(StateError::IterationOverrun {
                count: self.iteration_count,
                max: self.max_iterations,
            });
        }

        let mut ids: HashSet<&str> = HashSet::with_capacity(self.messages.len());
        let mut known_call_ids: HashSet<&str> = HashSet::new();
        for msg in &self.messages {
            if !ids.insert(msg.id()) {
                return Err(StateError::DuplicateMessageId {
                    id: msg.id().to_string(),
                });
            }
            for tc in msg.tool_calls() {
                known_call_ids.insert(&tc.id);
            }
            if let Message::ToolResult { tool_call_id, .. } = msg {
                if !known_call_ids.contains(tool_call_id.as_str()) {
                    return Err(StateError::OrphanToolResult {
                        tool_call_id: tool_call_id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// The last message in the log, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use otto_model::Message;

    #[test]
    fn default_state_is_planning_with_empty_log() {
        let s = AgentState::default();
        assert_eq!(s.task_status, TaskStatus::Planning);
        assert!(s.messages.is_empty());
        assert_eq!(s.current_todo_index, 0);
        assert_eq!(s.max_iterations, 50);
        assert!(s.user_intent.is_none());
        assert!(s.check_invariants().is_ok());
    }

    #[test]
    fn apply_replaces_scalar_fields() {
        let mut s = AgentState::default();
        s.apply(StateDelta {
            summary: Some("so far".into()),
            iteration_count: Some(3),
            task_status: Some(TaskStatus::Executing),
            todos: Some(vec!["write main.rs".into()]),
            ..Default::default()
        });
        assert_eq!(s.summary, "so far");
        assert_eq!(s.iteration_count, 3);
        assert_eq!(s.task_status, TaskStatus::Executing);
        assert!(s.check_invariants().is_ok());
    }

    #[test]
    fn apply_appends_messages() {
        let mut s = AgentState::default();
        s.apply(StateDelta::with_messages(vec![Message::human("hello")]));
        s.apply(StateDelta::with_messages(vec![Message::assistant("hi")]));
        assert_eq!(s.messages.len(), 2);
    }

    #[test]
    fn apply_none_fields_leave_state_untouched() {
        let mut s = AgentState::default();
        s.summary = "existing".into();
        s.apply(StateDelta::default());
        assert_eq!(s.summary, "existing");
    }

    #[test]
    fn current_todo_follows_cursor() {
        let mut s = AgentState::default();
        s.todos = vec!["a".into(), "b".into()];
        assert_eq!(s.current_todo(), Some("a"));
        s.current_todo_index = 1;
        assert_eq!(s.current_todo(), Some("b"));
        s.current_todo_index = 2;
        assert_eq!(s.current_todo(), None);
        assert!(s.todos_exhausted());
    }

    // ── Invariants ────────────────────────────────────────────────────────────

    #[test]
    fn cursor_may_equal_len_but_not_exceed_it() {
        let mut s = AgentState::default();
        s.todos = vec!["a".into()];
        s.current_todo_index = 1;
        assert!(s.check_invariants().is_ok());
        s.current_todo_index = 2;
        assert!(matches!(
            s.check_invariants(),
            Err(StateError::TodoCursorOutOfRange { .. })
        ));
    }

    #[test]
    fn executing_with_no_todos_is_a_breach() {
        let mut s = AgentState::default();
        s.task_status = TaskStatus::Executing;
        assert!(matches!(
            s.check_invariants(),
            Err(StateError::ExecutingWithoutTodos)
        ));
    }

    #[test]
    fn iteration_overrun_is_a_breach() {
        let mut s = AgentState::default();
        s.max_iterations = 2;
        s.iteration_count = 3;
        assert!(matches!(
            s.check_invariants(),
            Err(StateError::IterationOverrun { .. })
        ));
    }

    #[test]
    fn duplicate_message_ids_are_a_breach() {
        let mut s = AgentState::default();
        let m = Message::human("x");
        s.messages.push(m.clone());
        s.messages.push(m);
        assert!(matches!(
            s.check_invariants(),
            Err(StateError::DuplicateMessageId { .. })
        ));
    }

    #[test]
    fn tool_result_requires_matching_tool_call() {
        let mut s = AgentState::default();
        s.messages
            .push(Message::tool_result("tc-1", "grep", "matches"));
        assert!(matches!(
            s.check_invariants(),
            Err(StateError::OrphanToolResult { .. })
        ));
    }

    #[test]
    fn tool_result_after_its_call_is_valid() {
        use otto_model::ToolCallRequest;
        let mut s = AgentState::default();
        s.messages.push(Message::assistant_with_tool_calls(
            "",
            vec![ToolCallRequest::new("tc-1", "grep", serde_json::json!({}))],
        ));
        s.messages
            .push(Message::tool_result("tc-1", "grep", "matches"));
        assert!(s.check_invariants().is_ok());
    }

    #[test]
    fn state_serialises_round_trip() {
        let mut s = AgentState::default();
        s.todos = vec!["create file".into()];
        s.task_status = TaskStatus::Executing;
        s.messages.push(Message::human("go"));
        let json = serde_json::to_string(&s).unwrap();
        let back: AgentState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.todos, s.todos);
        assert_eq!(back.task_status, TaskStatus::Executing);
        assert_eq!(back.messages.len(), 1);
    }
}
