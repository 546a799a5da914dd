// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Durable `(state, step)` snapshots keyed by thread id.
//!
//! Every node return is followed by a `put`; a thread can therefore be
//! resumed from its latest checkpoint after a crash or a cancellation.
//! [`MemorySaver`] backs tests; [`FileSaver`] appends JSONL records per
//! thread plus a small metadata document for thread listings.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use crate::{AgentState, StateDelta};

/// A durable snapshot of the full agent state plus its step number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub step: u64,
    pub parent_id: Option<String>,
    pub state: AgentState,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(step: u64, parent_id: Option<String>, state: AgentState) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            step,
            parent_id,
            state,
            created_at: Utc::now(),
        }
    }
}

/// One intermediate node write recorded before its checkpoint lands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingWrite {
    pub node: String,
    pub delta: StateDelta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    #[default]
    Active,
    Archived,
}

/// Human-facing record describing one thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMetadata {
    pub thread_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
    pub status: ThreadStatus,
}

#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Persist a checkpoint.  Must be durable before returning.
    async fn put(&self, thread_id: &str, checkpoint: Checkpoint) -> anyhow::Result<()>;

    /// Record intermediate node writes for the given step.
    async fn put_writes(
        &self,
        thread_id: &str,
        step: u64,
        writes: Vec<PendingWrite>,
    ) -> anyhow::Result<()>;

    /// The latest checkpoint for a thread, if any.
    async fn get_tuple(&self, thread_id: &str) -> anyhow::Result<Option<Checkpoint>>;

    /// All checkpoints for a thread, newest first.
    async fn list(&self, thread_id: &str) -> anyhow::Result<Vec<Checkpoint>>;

    /// All known threads, most recently updated first.
    async fn threads(&self) -> anyhow::Result<Vec<ThreadMetadata>>;

    async fn delete_thread(&self, thread_id: &str) -> anyhow::Result<()>;
}

/// Derive a thread title from the first human message.
fn derive_title(state: &AgentState) -> String {
    let text = state
        .messages
        .iter()
        .find(|m| matches!(m, otto_model::Message::Human { .. }))
        .and_then(|m| m.content_text())
        .unwrap_or("(untitled)");
    let mut title: String = text.chars().take(60).collect();
    if text.chars().count() > 60 {
        title.push('…');
    }
    title
}

// ─── In-memory saver ──────────────────────────────────────────────────────────

#[derive(Default)]
struct MemoryThread {
    metadata: Option<ThreadMetadata>,
    checkpoints: Vec<Checkpoint>,
    writes: Vec<(u64, Vec<PendingWrite>)>,
}

/// Non-durable checkpointer for tests.
#[derive(Default)]
pub struct MemorySaver {
    threads: Mutex<HashMap<String, MemoryThread>>,
}

impl MemorySaver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for MemorySaver {
    async fn put(&self, thread_id: &str, checkpoint: Checkpoint) -> anyhow::Result<()> {
        let mut threads = self.threads.lock().unwrap();
        let entry = threads.entry(thread_id.to_string()).or_default();
        let now = Utc::now();
        let meta = entry.metadata.get_or_insert_with(|| ThreadMetadata {
            thread_id: thread_id.to_string(),
            title: derive_title(&checkpoint.state),
            created_at: now,
            updated_at: now,
            message_count: 0,
            status: ThreadStatus::Active,
        });
        meta.updated_at = now;
        meta.message_count = checkpoint.state.messages.len();
        entry.checkpoints.push(checkpoint);
        Ok(())
    }

    async fn put_writes(
        &self,
        thread_id: &str,
        step: u64,
        writes: Vec<PendingWrite>,
    ) -> anyhow::Result<()> {
        let mut threads = self.threads.lock().unwrap();
        let entry = threads.entry(thread_id.to_string()).or_default();
        entry.writes.push((step, writes));
        Ok(())
    }

    async fn get_tuple(&self, thread_id: &str) -> anyhow::Result<Option<Checkpoint>> {
        Ok(self.list(thread_id).await?.into_iter().next())
    }

    async fn list(&self, thread_id: &str) -> anyhow::Result<Vec<Checkpoint>> {
        let threads = self.threads.lock().unwrap();
        let mut cps = threads
            .get(thread_id)
            .map(|t| t.checkpoints.clone())
            .unwrap_or_default();
        cps.sort_by(|a, b| b.step.cmp(&a.step));
        Ok(cps)
    }

    async fn threads(&self) -> anyhow::Result<Vec<ThreadMetadata>> {
        let threads = self.threads.lock().unwrap();
        let mut metas: Vec<ThreadMetadata> = threads
            .values()
            .filter_map(|t| t.metadata.clone())
            .collect();
        metas.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(metas)
    }

    async fn delete_thread(&self, thread_id: &str) -> anyhow::Result<()> {
        self.threads.lock().unwrap().remove(thread_id);
        Ok(())
    }
}

// ─── File-backed saver ────────────────────────────────────────────────────────

/// One JSONL record in a thread's checkpoint log.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum LogRecord {
    Checkpoint { checkpoint: Checkpoint },
    Writes { step: u64, writes: Vec<PendingWrite> },
}

/// JSONL-per-thread checkpointer rooted at a directory.
pub struct FileSaver {
    root: PathBuf,
}

impl FileSaver {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn log_path(&self, thread_id: &str) -> PathBuf {
        self.root.join(format!("{thread_id}.jsonl"))
    }

    fn meta_path(&self, thread_id: &str) -> PathBuf {
        self.root.join(format!("{thread_id}.meta.json"))
    }

    async fn append_record(&self, thread_id: &str, record: &LogRecord) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("creating {}", self.root.display()))?;
        let path = self.log_path(thread_id);
        let mut line = serde_json::to_string(record).context("serializing checkpoint record")?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .await
            .with_context(|| format!("opening {}", path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        // The checkpoint must be durable before the node's completion is
        // acknowledged to the router.
        file.flush().await?;
        file.sync_all()
            .await
            .with_context(|| format!("syncing {}", path.display()))?;
        Ok(())
    }

    async fn read_records(&self, thread_id: &str) -> anyhow::Result<Vec<LogRecord>> {
        let path = self.log_path(thread_id);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let mut records = Vec::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let record: LogRecord = serde_json::from_str(line)
                .with_context(|| format!("parsing checkpoint record in {}", path.display()))?;
            records.push(record);
        }
        Ok(records)
    }
}

#[async_trait]
impl Checkpointer for FileSaver {
    async fn put(&self, thread_id: &str, checkpoint: Checkpoint) -> anyhow::Result<()> {
        debug!(thread_id, step = checkpoint.step, "persisting checkpoint");
        let now = Utc::now();
        let meta_path = self.meta_path(thread_id);
        let mut meta = match tokio::fs::read_to_string(&meta_path).await {
            Ok(text) => serde_json::from_str::<ThreadMetadata>(&text)
                .with_context(|| format!("parsing {}", meta_path.display()))?,
            Err(_) => ThreadMetadata {
                thread_id: thread_id.to_string(),
                title: derive_title(&checkpoint.state),
                created_at: now,
                updated_at: now,
                message_count: 0,
                status: ThreadStatus::Active,
            },
        };
        meta.updated_at = now;
        meta.message_count = checkpoint.state.messages.len();

        self.append_record(
            thread_id,
            &LogRecord::Checkpoint { checkpoint },
        )
        .await?;
        tokio::fs::write(&meta_path, serde_json::to_vec_pretty(&meta)?)
            .await
            .with_context(|| format!("writing {}", meta_path.display()))?;
        Ok(())
    }

    async fn put_writes(
        &self,
        thread_id: &str,
        step: u64,
        writes: Vec<PendingWrite>,
    ) -> anyhow::Result<()> {
        self.append_record(thread_id, &LogRecord::Writes { step, writes })
            .await
    }

    async fn get_tuple(&self, thread_id: &str) -> anyhow::Result<Option<Checkpoint>> {
        Ok(self.list(thread_id).await?.into_iter().next())
    }

    async fn list(&self, thread_id: &str) -> anyhow::Result<Vec<Checkpoint>> {
        let mut cps: Vec<Checkpoint> = self
            .read_records(thread_id)
            .await?
            .into_iter()
            .filter_map(|r| match r {
                LogRecord::Checkpoint { checkpoint } => Some(checkpoint),
                LogRecord::Writes { .. } => None,
            })
            .collect();
        cps.sort_by(|a, b| b.step.cmp(&a.step));
        Ok(cps)
    }

    async fn threads(&self) -> anyhow::Result<Vec<ThreadMetadata>> {
        let mut metas = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("reading {}", self.root.display())),
        };
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.ends_with(".meta.json") {
                continue;
            }
            let text = tokio::fs::read_to_string(entry.path()).await?;
            if let Ok(meta) = serde_json::from_str::<ThreadMetadata>(&text) {
                metas.push(meta);
            }
        }
        metas.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(metas)
    }

    async fn delete_thread(&self, thread_id: &str) -> anyhow::Result<()> {
        for path in [self.log_path(thread_id), self.meta_path(thread_id)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e).with_context(|| format!("removing {}", path.display())),
            }
        }
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
