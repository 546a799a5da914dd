// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// otto — an autonomous coding agent.
///
/// Give it a request in natural language; it plans the work, breaks it into
/// concrete engineering tasks, and drives them to completion with file and
/// shell tools.  Sensitive operations (writes, commands, processes) prompt
/// for approval unless --demo is set.
#[derive(Parser, Debug)]
#[command(name = "otto", version, about)]
pub struct Cli {
    /// The request to work on.  Multiple words are joined with spaces.
    pub prompt: Vec<String>,

    /// Bypass human approval for sensitive tool calls.
    #[arg(long)]
    pub demo: bool,

    /// Resume or create the named thread (default: a fresh thread).
    #[arg(long)]
    pub thread_id: Option<String>,

    /// Cap router decisions per invocation (default: 20 + 15 × task count).
    #[arg(long)]
    pub recursion_limit: Option<u32>,

    /// Model override: a bare model name, a named provider from the config's
    /// `providers:` map, or `<provider>/<model>`.
    #[arg(long, short = 'm')]
    pub model: Option<String>,

    /// Explicit config file (merged over the standard search paths).
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Inject the contents of FILE into the agent's context (repeatable).
    #[arg(long = "file", short = 'f', value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Directory for thread checkpoints (default: the platform data dir).
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    /// List known threads and exit.
    #[arg(long)]
    pub list_threads: bool,

    /// Delete the named thread and exit.
    #[arg(long, value_name = "THREAD_ID")]
    pub delete_thread: Option<String>,

    /// Increase stderr trace verbosity (-v: debug, -vv: trace).
    #[arg(long, short = 'v', action = ArgAction::Count)]
    pub verbose: u8,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
