// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use otto_model::Message;
use otto_state::{AgentState, StateDelta};

use super::{Node, NodeCtx, NodeOutcome};

static EXCLUDED_DIRS: &[&str] = &["node_modules", "target", "dist", "build", "__pycache__"];

/// Load referenced files into context and scan the project tree once.
///
/// Idempotent: with no pending file paths and the tree already injected this
/// is a pass-through to the intent classifier.
pub(crate) async fn run(state: &AgentState, ctx: &NodeCtx) -> anyhow::Result<NodeOutcome> {
    let mut delta = StateDelta::default();
    let cfg = &ctx.config.agent;

    if !state.pending_file_paths.is_empty() {
        let mut block = String::from("File context:\n");
        for path in &state.pending_file_paths {
            block.push_str(&format!("== {} ==\n", path.display()));
            let oversized = tokio::fs::metadata(path)
                .await
                .map(|m| m.len() > cfg.max_context_file_bytes)
                .unwrap_or(false);
            if oversized {
                block.push_str(&format!(
                    "[skipped: file exceeds the {} byte cap]\n",
                    cfg.max_context_file_bytes
                ));
                continue;
            }
            match tokio::fs::read_to_string(path).await {
                Ok(text) => {
                    block.push_str(&text);
                    if !text.ends_with('\n') {
                        block.push('\n');
                    }
                }
                Err(e) => block.push_str(&format!("[unreadable: {e}]\n")),
            }
        }
        debug!(files = state.pending_file_paths.len(), "injected file context");
        delta.messages.push(Message::system(block));
        delta.pending_file_paths = Some(Vec::new());
    }

    if !state.project_tree_injected {
        let tree = scan_project_tree(&state.project_root, cfg.max_tree_entries);
        debug!(
            root = %state.project_root.display(),
            chars = tree.len(),
            "scanned project tree"
        );
        delta.project_tree_text = Some(tree);
        delta.project_tree_injected = Some(true);
    }

    Ok(NodeOutcome::new(delta, Node::Intent))
}

/// Render the project tree as one relative path per line (directories carry
/// a trailing `/`).  Hidden entries and build artifacts are excluded; the
/// walk stops after `max_entries` lines.
pub(crate) fn scan_project_tree(root: &Path, max_entries: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut truncated = false;

    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            if name.starts_with('.') {
                return false;
            }
            !(e.file_type().is_dir() && EXCLUDED_DIRS.contains(&name.as_ref()))
        });

    for entry in walker.flatten() {
        if lines.len() >= max_entries {
            truncated = true;
            break;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .to_string();
        if entry.file_type().is_dir() {
            lines.push(format!("{rel}/"));
        } else {
            lines.push(rel);
        }
    }

    let mut tree = lines.join("\n");
    if truncated {
        tree.push_str(&format!("\n… (truncated at {max_entries} entries)"));
    }
    tree
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
