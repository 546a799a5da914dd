// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The orchestration graph runner.
//!
//! Drives one thread through the node state machine, applying each node's
//! delta through the reducers, enforcing the state invariants, and writing a
//! checkpoint after every step.  Sensitive tool calls suspend the run before
//! the dispatcher; [`AgentGraph::resume`] continues with the human decision.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use otto_config::Config;
use otto_model::{Message, ModelProvider, ToolCallRequest};
use otto_state::{
    AgentState, Checkpoint, Checkpointer, PendingWrite, StateDelta, TaskStatus,
};
use otto_tools::{ProcessManager, ToolRegistry};

use crate::events::AgentEvent;
use crate::nodes::{
    advance, chat, dispatcher, executor, initializer, intent, planner, summarizer, Node, NodeCtx,
};

/// Per-invocation options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Bypass the human-approval interrupt for sensitive tools.
    pub demo_mode: bool,
    /// Cap on router decisions for this invocation.
    /// Defaults to `20 + 15 × todo count` when unset.
    pub recursion_limit: Option<u32>,
    /// Cooperative cancellation flag, observed between nodes.
    pub cancel: Option<Arc<AtomicBool>>,
    /// Files whose contents the initializer injects into context this turn.
    pub context_files: Vec<PathBuf>,
}

/// How an invocation ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The thread ran to a terminal state (inspect `state.error` for
    /// budget-exhaustion diagnostics).
    Completed(Box<AgentState>),
    /// Sensitive tool calls await an approval decision; resume with
    /// [`AgentGraph::resume`].
    NeedsApproval { calls: Vec<ToolCallRequest> },
    /// An unrecoverable failure; the last checkpoint carries the error.
    Failed { error: String },
    /// Cancelled between nodes; no partial step was committed.
    Cancelled,
}

/// The decision injected when resuming from the approval interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    Reject,
}

pub struct AgentGraph {
    model: Arc<dyn ModelProvider>,
    tools: Arc<ToolRegistry>,
    config: Arc<Config>,
    checkpointer: Arc<dyn Checkpointer>,
    processes: Arc<ProcessManager>,
}

impl AgentGraph {
    pub fn new(
        model: Arc<dyn ModelProvider>,
        tools: Arc<ToolRegistry>,
        config: Arc<Config>,
        checkpointer: Arc<dyn Checkpointer>,
    ) -> Self {
        let processes = Arc::new(ProcessManager::new(config.tools.process_log_lines));
        Self {
            model,
            tools,
            config,
            checkpointer,
            processes,
        }
    }

    /// Start (or continue) a thread with a new user turn.
    pub async fn run(
        &self,
        thread_id: &str,
        user_input: &str,
        opts: RunOptions,
        events: mpsc::Sender<AgentEvent>,
    ) -> anyhow::Result<RunOutcome> {
        let (mut state, step, parent) = self.load_or_create(thread_id).await?;

        // A fresh user turn restarts the plan lifecycle; the message log,
        // summary, and scanned tree carry over from prior turns.
        state.apply(StateDelta {
            messages: vec![Message::human(user_input)],
            demo_mode: Some(opts.demo_mode),
            task_status: Some(TaskStatus::Planning),
            todos: Some(Vec::new()),
            current_todo_index: Some(0),
            iteration_count: Some(0),
            task_completed: Some(false),
            pending_tool_calls: Some(Vec::new()),
            pending_file_paths: Some(opts.context_files.clone()),
            error: Some(String::new()),
            max_iterations: Some(self.config.agent.max_iterations),
            ..Default::default()
        });
        state.user_intent = None;

        info!(thread_id, "starting run");
        let ctx = self.node_ctx(events, &opts);
        self.drive(thread_id, state, step, parent, Node::Initializer, &opts, &ctx, false)
            .await
    }

    /// Resume a thread suspended at the approval interrupt.
    pub async fn resume(
        &self,
        thread_id: &str,
        decision: ApprovalDecision,
        opts: RunOptions,
        events: mpsc::Sender<AgentEvent>,
    ) -> anyhow::Result<RunOutcome> {
        let cp = self
            .checkpointer
            .get_tuple(thread_id)
            .await?
            .with_context(|| format!("no checkpoint for thread {thread_id}"))?;
        anyhow::ensure!(
            !cp.state.pending_tool_calls.is_empty(),
            "thread {thread_id} has no tool calls awaiting approval"
        );
        info!(thread_id, ?decision, "resuming from approval interrupt");
        let ctx = self.node_ctx(events, &opts);
        self.drive(
            thread_id,
            cp.state,
            cp.step + 1,
            Some(cp.id),
            Node::Dispatcher,
            &opts,
            &ctx,
            decision == ApprovalDecision::Reject,
        )
        .await
    }

    fn node_ctx(&self, events: mpsc::Sender<AgentEvent>, opts: &RunOptions) -> NodeCtx {
        NodeCtx {
            model: Arc::clone(&self.model),
            tools: Arc::clone(&self.tools),
            config: Arc::clone(&self.config),
            processes: Arc::clone(&self.processes),
            cancel: opts
                .cancel
                .clone()
                .unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
            events,
        }
    }

    async fn load_or_create(
        &self,
        thread_id: &str,
    ) -> anyhow::Result<(AgentState, u64, Option<String>)> {
        match self.checkpointer.get_tuple(thread_id).await? {
            Some(cp) => {
                debug!(thread_id, step = cp.step, "rehydrated thread from checkpoint");
                Ok((cp.state, cp.step + 1, Some(cp.id)))
            }
            None => {
                let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
                Ok((AgentState::new(root), 0, None))
            }
        }
    }

    /// The node loop.  One node runs at a time; every return is reduced,
    /// invariant-checked, and checkpointed before the next edge is taken.
    #[allow(clippy::too_many_arguments)]
    async fn drive(
        &self,
        thread_id: &str,
        mut state: AgentState,
        mut step: u64,
        mut parent: Option<String>,
        mut node: Node,
        opts: &RunOptions,
        ctx: &NodeCtx,
        mut reject_pending: bool,
    ) -> anyhow::Result<RunOutcome> {
        let mut steps_taken: u32 = 0;

        loop {
            if cancelled(opts) {
                info!(thread_id, "run cancelled; last committed checkpoint stands");
                return Ok(RunOutcome::Cancelled);
            }

            let limit = opts
                .recursion_limit
                .unwrap_or(20 + 15 * state.todos.len() as u32);
            if steps_taken >= limit {
                let error = format!("recursion limit of {limit} router decisions reached");
                warn!(thread_id, %error, "terminating gracefully");
                ctx.emit(AgentEvent::Error(error.clone())).await;
                state.apply(StateDelta {
                    messages: vec![Message::system(format!(
                        "Stopping: this invocation reached its recursion limit of {limit} \
                         steps. Completed work is checkpointed; run the thread again to \
                         continue."
                    ))],
                    error: Some(error),
                    task_status: Some(TaskStatus::Completed),
                    ..Default::default()
                });
                self.commit(thread_id, &state, step, &mut parent).await?;
                ctx.emit(AgentEvent::RunComplete {
                    status: state.task_status,
                })
                .await;
                return Ok(RunOutcome::Completed(Box::new(state)));
            }

            ctx.emit(AgentEvent::NodeEntered { node: node.name() }).await;
            debug!(thread_id, node = node.name(), step, "entering node");

            let result = match node {
                Node::Initializer => initializer::run(&state, ctx).await,
                Node::Intent => intent::run(&state, ctx).await,
                Node::ChatResponder => chat::run(&state, ctx).await,
                Node::Planner => planner::run(&state, ctx).await,
                Node::Executor => executor::run(&state, ctx).await,
                Node::Dispatcher => {
                    let r = dispatcher::run(&state, ctx, reject_pending).await;
                    reject_pending = false;
                    r
                }
                Node::Summarizer => summarizer::run(&state, ctx).await,
                Node::AdvanceTodo => advance::run(&state, ctx).await,
                Node::Review | Node::End => {
                    anyhow::bail!("node {:?} is an edge target, not executable", node)
                }
            };

            let outcome = match result {
                Ok(o) => o,
                Err(e) => {
                    // A node-boundary error is unrecoverable for the thread.
                    let error = format!("{} failed: {e:#}", node.name());
                    warn!(thread_id, %error, "node error");
                    state.error = error.clone();
                    self.commit(thread_id, &state, step, &mut parent).await?;
                    ctx.emit(AgentEvent::Error(error.clone())).await;
                    return Ok(RunOutcome::Failed { error });
                }
            };

            self.checkpointer
                .put_writes(
                    thread_id,
                    step,
                    vec![PendingWrite {
                        node: node.name().to_string(),
                        delta: outcome.delta.clone(),
                    }],
                )
                .await?;

            state.apply(outcome.delta);
            if let Err(breach) = state.check_invariants() {
                let error = format!("invariant breach: {breach}");
                warn!(thread_id, %error, "aborting thread");
                state.error = error.clone();
                self.commit(thread_id, &state, step, &mut parent).await?;
                ctx.emit(AgentEvent::Error(error.clone())).await;
                return Ok(RunOutcome::Failed { error });
            }
            self.commit(thread_id, &state, step, &mut parent).await?;
            step += 1;
            steps_taken += 1;

            match outcome.next {
                Node::Review => {
                    let calls = state.pending_tool_calls.clone();
                    ctx.emit(AgentEvent::ApprovalRequired {
                        calls: calls.clone(),
                    })
                    .await;
                    return Ok(RunOutcome::NeedsApproval { calls });
                }
                Node::End => {
                    ctx.emit(AgentEvent::RunComplete {
                        status: state.task_status,
                    })
                    .await;
                    return Ok(RunOutcome::Completed(Box::new(state)));
                }
                next => node = next,
            }
        }
    }

    async fn commit(
        &self,
        thread_id: &str,
        state: &AgentState,
        step: u64,
        parent: &mut Option<String>,
    ) -> anyhow::Result<()> {
        let cp = Checkpoint::new(step, parent.clone(), state.clone());
        let id = cp.id.clone();
        self.checkpointer
            .put(thread_id, cp)
            .await
            .with_context(|| format!("persisting checkpoint {step} for thread {thread_id}"))?;
        *parent = Some(id);
        Ok(())
    }
}

fn cancelled(opts: &RunOptions) -> bool {
    opts.cancel
        .as_ref()
        .map(|flag| flag.load(Ordering::Relaxed))
        .unwrap_or(false)
}
