// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod advance;
pub mod chat;
pub mod dispatcher;
pub mod executor;
pub mod initializer;
pub mod intent;
pub mod planner;
pub mod summarizer;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::mpsc;

use otto_config::Config;
use otto_model::ModelProvider;
use otto_state::StateDelta;
use otto_tools::{ProcessManager, ToolRegistry};

use crate::events::AgentEvent;
use crate::router::NextNode;

/// A named phase of the orchestration graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Initializer,
    Intent,
    ChatResponder,
    Planner,
    Executor,
    Dispatcher,
    /// Approval interrupt: the graph suspends *before* the dispatcher.
    Review,
    Summarizer,
    AdvanceTodo,
    End,
}

impl Node {
    pub fn name(&self) -> &'static str {
        match self {
            Node::Initializer => "initializer",
            Node::Intent => "intent",
            Node::ChatResponder => "chat",
            Node::Planner => "planner",
            Node::Executor => "executor",
            Node::Dispatcher => "tools",
            Node::Review => "review",
            Node::Summarizer => "summarize",
            Node::AdvanceTodo => "advance_todo",
            Node::End => "end",
        }
    }
}

impl From<NextNode> for Node {
    fn from(next: NextNode) -> Self {
        match next {
            NextNode::Tools => Node::Dispatcher,
            NextNode::Review => Node::Review,
            NextNode::Summarize => Node::Summarizer,
            NextNode::Executor => Node::Executor,
            NextNode::AdvanceTodo => Node::AdvanceTodo,
            NextNode::End => Node::End,
        }
    }
}

/// The structured command every node returns.  Errors never cross this
/// boundary: failures become a delta with `error` set and `next = End`.
#[derive(Debug)]
pub struct NodeOutcome {
    pub delta: StateDelta,
    pub next: Node,
}

impl NodeOutcome {
    pub fn new(delta: StateDelta, next: Node) -> Self {
        Self { delta, next }
    }

    pub fn goto(next: Node) -> Self {
        Self {
            delta: StateDelta::default(),
            next,
        }
    }
}

/// Shared dependencies handed to every node invocation.
pub struct NodeCtx {
    pub model: Arc<dyn ModelProvider>,
    pub tools: Arc<ToolRegistry>,
    pub config: Arc<Config>,
    pub processes: Arc<ProcessManager>,
    pub cancel: Arc<AtomicBool>,
    pub events: mpsc::Sender<AgentEvent>,
}

impl NodeCtx {
    pub(crate) async fn emit(&self, event: AgentEvent) {
        // The consumer may have hung up; a full or closed channel never
        // stalls the graph.
        let _ = self.events.send(event).await;
    }
}
