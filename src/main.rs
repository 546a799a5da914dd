// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod cli;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use otto_core::{AgentEvent, AgentGraph, ApprovalDecision, RunOptions, RunOutcome};
use otto_state::{Checkpointer, FileSaver};

use crate::cli::Cli;

// ── Exit codes ────────────────────────────────────────────────────────────────

const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_CANCELLED: i32 = 2;

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("[otto:fatal] {e:#}");
            EXIT_ERROR
        }
    };
    std::process::exit(code);
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Arc::new(otto_config::load(cli.config.as_deref())?);

    let state_dir = cli.state_dir.clone().unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("otto/threads")
    });
    let checkpointer: Arc<dyn Checkpointer> = Arc::new(FileSaver::new(state_dir));

    // ── Thread management ────────────────────────────────────────────────────
    if cli.list_threads {
        for meta in checkpointer.threads().await? {
            println!(
                "{}  {}  [{} messages]  {}",
                meta.thread_id,
                meta.updated_at.format("%Y-%m-%d %H:%M"),
                meta.message_count,
                meta.title
            );
        }
        return Ok(EXIT_SUCCESS);
    }
    if let Some(id) = &cli.delete_thread {
        checkpointer.delete_thread(id).await?;
        eprintln!("[otto] deleted thread {id}");
        return Ok(EXIT_SUCCESS);
    }

    let prompt = cli.prompt.join(" ");
    anyhow::ensure!(
        !prompt.trim().is_empty(),
        "no prompt given; run `otto --help` for usage"
    );

    // ── Wiring ───────────────────────────────────────────────────────────────
    let model_cfg = match &cli.model {
        Some(name) => otto_model::resolve_model_from_config(&config, name),
        None => config.model.clone(),
    };
    let model: Arc<dyn otto_model::ModelProvider> = Arc::from(
        otto_model::from_config(&model_cfg).context("initialising model provider")?,
    );
    let tools = Arc::new(otto_tools::default_registry(config.tools.timeout_secs));
    let graph = AgentGraph::new(model, tools, Arc::clone(&config), checkpointer);

    let thread_id = cli
        .thread_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    eprintln!("[otto] thread {thread_id}");

    // Ctrl-C sets the cooperative cancel flag; the run stops between nodes
    // with the last committed checkpoint intact.
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    let opts = RunOptions {
        demo_mode: cli.demo,
        recursion_limit: cli.recursion_limit,
        cancel: Some(Arc::clone(&cancel)),
        context_files: cli.files.clone(),
    };

    let (tx, rx) = mpsc::channel::<AgentEvent>(256);
    let printer = tokio::spawn(print_events(rx));

    let mut outcome = graph.run(&thread_id, &prompt, opts.clone(), tx.clone()).await?;
    let code = loop {
        match outcome {
            RunOutcome::NeedsApproval { calls } => {
                eprintln!(
                    "[otto] the agent wants to run {} sensitive tool call(s):",
                    calls.len()
                );
                for call in &calls {
                    eprintln!("  - {} {}", call.name, call.args);
                }
                let decision = if ask_approval().await? {
                    ApprovalDecision::Approve
                } else {
                    ApprovalDecision::Reject
                };
                outcome = graph
                    .resume(&thread_id, decision, opts.clone(), tx.clone())
                    .await?;
            }
            RunOutcome::Completed(state) => {
                if !state.error.is_empty() {
                    eprintln!("[otto] finished with diagnostic: {}", state.error);
                }
                break EXIT_SUCCESS;
            }
            RunOutcome::Failed { error } => {
                eprintln!("[otto] failed: {error}");
                break EXIT_ERROR;
            }
            RunOutcome::Cancelled => {
                eprintln!("[otto] cancelled; resume with --thread-id {thread_id}");
                break EXIT_CANCELLED;
            }
        }
    };

    drop(tx);
    let _ = printer.await;
    Ok(code)
}

async fn ask_approval() -> anyhow::Result<bool> {
    eprint!("[otto] approve? [y/N] ");
    let line = tokio::task::spawn_blocking(|| {
        let mut buf = String::new();
        std::io::stdin().read_line(&mut buf).map(|_| buf)
    })
    .await
    .context("reading approval decision")??;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Render agent events: assistant text to stdout (pipeable), everything else
/// as tagged stderr traces.
async fn print_events(mut rx: mpsc::Receiver<AgentEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            AgentEvent::TextComplete(text) => {
                if !text.is_empty() {
                    println!("{text}");
                }
            }
            AgentEvent::IntentClassified { intent, confidence } => {
                eprintln!("[otto:intent] {intent:?} ({confidence:.2})");
            }
            AgentEvent::PlanReady { todos, .. } => {
                eprintln!("[otto:plan] {} task(s)", todos.len());
                for (i, todo) in todos.iter().enumerate() {
                    eprintln!("  {}. {todo}", i + 1);
                }
            }
            AgentEvent::ToolCallStarted(tc) => {
                eprintln!("[otto:tool:call] name=\"{}\" args={}", tc.name, tc.args);
            }
            AgentEvent::ToolCallFinished {
                tool_name,
                output,
                is_error,
                ..
            } => {
                if is_error {
                    eprintln!(
                        "[otto:tool:result] name=\"{tool_name}\" success=false output={output:?}"
                    );
                } else {
                    eprintln!(
                        "[otto:tool:result] name=\"{tool_name}\" success=true size={}",
                        output.len()
                    );
                }
            }
            AgentEvent::TodoAdvanced { index, total } => {
                eprintln!("[otto:todo] {index}/{total} complete");
            }
            AgentEvent::LoopDetected { reason } => {
                eprintln!("[otto:loop] {reason}");
            }
            AgentEvent::SummaryCreated { summarized } => {
                eprintln!("[otto:context] summarised {summarized} messages");
            }
            AgentEvent::Error(e) => {
                eprintln!("[otto:error] {e}");
            }
            AgentEvent::ApprovalRequired { .. }
            | AgentEvent::NodeEntered { .. }
            | AgentEvent::RunComplete { .. } => {}
        }
    }
}
