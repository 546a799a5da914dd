// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Execution context threaded through every tool invocation.
//!
//! Tools never reach for ambient module-global state: the project root, the
//! command deny-list, and the background process manager are all carried
//! here, so concurrent threads stay isolated and tests can build a context
//! per case.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::process::ProcessManager;
use crate::safety::{confine_to_root, DenyList};

#[derive(Clone)]
pub struct ExecutionContext {
    /// Absolute path every file operation is confined to.
    pub project_root: PathBuf,
    pub deny_list: Arc<DenyList>,
    pub processes: Arc<ProcessManager>,
    /// Cooperative cancellation signal; long-running tools check it before
    /// doing work.
    pub cancelled: Arc<AtomicBool>,
}

impl ExecutionContext {
    pub fn new(project_root: PathBuf) -> Self {
        Self {
            project_root,
            deny_list: Arc::new(DenyList::default()),
            processes: Arc::new(ProcessManager::default()),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_deny_list(mut self, deny_list: DenyList) -> Self {
        self.deny_list = Arc::new(deny_list);
        self
    }

    pub fn with_processes(mut self, processes: Arc<ProcessManager>) -> Self {
        self.processes = processes;
        self
    }

    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Resolve a tool-supplied path under the project root, rejecting escapes.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, String> {
        confine_to_root(&self.project_root, path)
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("project_root", &self.project_root)
            .finish_non_exhaustive()
    }
}

/// Context rooted at a temp-friendly path for tests.
pub fn test_context(root: &Path) -> ExecutionContext {
    ExecutionContext::new(root.to_path_buf())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
