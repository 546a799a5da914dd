// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Background process manager.
//!
//! Long-running commands (dev servers, watchers) are started detached from
//! the tool-call timeout and tracked in an in-memory map from process id to
//! handle plus a bounded ring buffer of log lines.  Access happens from the
//! single executor thread of a graph run; the manager is `Sync` only so the
//! registry can share it behind an `Arc`.

use std::collections::{HashMap, VecDeque};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

const KILL_GRACE: Duration = Duration::from_secs(2);

/// Observable status of a managed process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    Exited { code: Option<i32> },
}

struct ManagedProcess {
    command: String,
    pid: Option<u32>,
    logs: Arc<Mutex<VecDeque<String>>>,
    /// Set exactly once when the child is reaped; both the exit path and the
    /// spawn-error path race to this flag, the loser is a no-op.
    finished: Arc<AtomicBool>,
    exit_code: Arc<Mutex<Option<i32>>>,
}

pub struct ProcessManager {
    procs: Mutex<HashMap<String, ManagedProcess>>,
    next_id: AtomicU64,
    log_capacity: usize,
}

impl ProcessManager {
    pub fn new(log_capacity: usize) -> Self {
        Self {
            procs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            log_capacity,
        }
    }

    /// Spawn `command` through the shell and start tracking it.
    /// Returns the process id used for stop / logs lookups.
    pub fn start(&self, command: &str, workdir: Option<&std::path::Path>) -> Result<String, String> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(wd) = workdir {
            cmd.current_dir(wd);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| format!("spawn error: {e}"))?;
        let pid = child.id();

        let logs: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(VecDeque::new()));
        let finished = Arc::new(AtomicBool::new(false));
        let exit_code: Arc<Mutex<Option<i32>>> = Arc::new(Mutex::new(None));

        let capacity = self.log_capacity;
        if let Some(stdout) = child.stdout.take() {
            spawn_line_pump(stdout, Arc::clone(&logs), capacity);
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_pump(stderr, Arc::clone(&logs), capacity);
        }

        // The waiter owns the child; stop() signals by pid so the two can
        // never fight over the handle.
        {
            let finished = Arc::clone(&finished);
            let exit_code = Arc::clone(&exit_code);
            tokio::spawn(async move {
                match child.wait().await {
                    Ok(status) => {
                        if !finished.swap(true, Ordering::SeqCst) {
                            *exit_code.lock().unwrap() = status.code();
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "background process wait failed");
                        finished.swap(true, Ordering::SeqCst);
                    }
                }
            });
        }

        let id = format!("proc-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        debug!(id = %id, pid = ?pid, command, "background process started");
        self.procs.lock().unwrap().insert(
            id.clone(),
            ManagedProcess {
                command: command.to_string(),
                pid,
                logs,
                finished,
                exit_code,
            },
        );
        Ok(id)
    }

    pub fn status(&self, id: &str) -> Option<ProcessStatus> {
        let procs = self.procs.lock().unwrap();
        let p = procs.get(id)?;
        if p.finished.load(Ordering::SeqCst) {
            Some(ProcessStatus::Exited {
                code: *p.exit_code.lock().unwrap(),
            })
        } else {
            Some(ProcessStatus::Running)
        }
    }

    /// Last `tail` log lines for a process (all retained lines when `tail`
    /// is larger than the buffer).
    pub fn logs(&self, id: &str, tail: usize) -> Option<Vec<String>> {
        let procs = self.procs.lock().unwrap();
        let p = procs.get(id)?;
        let buf = p.logs.lock().unwrap();
        let skip = buf.len().saturating_sub(tail);
        Some(buf.iter().skip(skip).cloned().collect())
    }

    pub fn list(&self) -> Vec<(String, String, ProcessStatus)> {
        let procs = self.procs.lock().unwrap();
        let mut out: Vec<(String, String, ProcessStatus)> = procs
            .iter()
            .map(|(id, p)| {
                let status = if p.finished.load(Ordering::SeqCst) {
                    ProcessStatus::Exited {
                        code: *p.exit_code.lock().unwrap(),
                    }
                } else {
                    ProcessStatus::Running
                };
                (id.clone(), p.command.clone(), status)
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Terminate a process tree: SIGTERM, a grace period, then SIGKILL.
    pub async fn stop(&self, id: &str) -> Result<ProcessStatus, String> {
        let (pid, finished) = {
            let procs = self.procs.lock().unwrap();
            let p = procs.get(id).ok_or_else(|| format!("unknown process: {id}"))?;
            (p.pid, Arc::clone(&p.finished))
        };

        if finished.load(Ordering::SeqCst) {
            return self.status(id).ok_or_else(|| format!("unknown process: {id}"));
        }
        let pid = pid.ok_or_else(|| format!("process {id} has no pid"))?;

        signal_tree(pid, false).await;
        tokio::time::sleep(KILL_GRACE).await;
        if !finished.load(Ordering::SeqCst) {
            signal_tree(pid, true).await;
            // Give the waiter a moment to reap.
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        self.status(id).ok_or_else(|| format!("unknown process: {id}"))
    }
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new(1_000)
    }
}

fn spawn_line_pump(
    reader: impl tokio::io::AsyncRead + Unpin + Send + 'static,
    logs: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let mut buf = logs.lock().unwrap();
            if buf.len() >= capacity {
                buf.pop_front();
            }
            buf.push_back(line);
        }
    });
}

/// Send a terminate (or kill) signal to the whole process group / tree.
#[cfg(unix)]
async fn signal_tree(pid: u32, force: bool) {
    let sig = if force { "-KILL" } else { "-TERM" };
    // The child was spawned in its own process group (pgid == pid), so the
    // negative pid addresses the entire tree.
    let _ = Command::new("kill")
        .args([sig, "--", &format!("-{pid}")])
        .output()
        .await;
}

#[cfg(windows)]
async fn signal_tree(pid: u32, force: bool) {
    let mut cmd = Command::new("taskkill");
    cmd.args(["/T", "/PID", &pid.to_string()]);
    if force {
        cmd.arg("/F");
    }
    let _ = cmd.output().await;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn short_command_runs_and_exits() {
        let mgr = ProcessManager::new(100);
        let id = mgr.start("echo background-hello", None).unwrap();
        // Wait for the process to finish and the pumps to drain.
        for _ in 0..50 {
            if matches!(mgr.status(&id), Some(ProcessStatus::Exited { .. })) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(matches!(
            mgr.status(&id),
            Some(ProcessStatus::Exited { code: Some(0) })
        ));
        let logs = mgr.logs(&id, 10).unwrap();
        assert!(logs.iter().any(|l| l.contains("background-hello")));
    }

    #[tokio::test]
    async fn ring_buffer_is_bounded() {
        let mgr = ProcessManager::new(5);
        let id = mgr.start("for i in $(seq 1 50); do echo line-$i; done", None).unwrap();
        for _ in 0..50 {
            if matches!(mgr.status(&id), Some(ProcessStatus::Exited { .. })) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        // One more tick for the pumps.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let logs = mgr.logs(&id, 100).unwrap();
        assert!(logs.len() <= 5, "ring must cap at capacity, got {}", logs.len());
        assert_eq!(logs.last().map(|s| s.as_str()), Some("line-50"));
    }

    #[tokio::test]
    async fn stop_terminates_a_long_running_process() {
        let mgr = ProcessManager::new(100);
        let id = mgr.start("sleep 30", None).unwrap();
        assert_eq!(mgr.status(&id), Some(ProcessStatus::Running));
        let status = mgr.stop(&id).await.unwrap();
        assert!(matches!(status, ProcessStatus::Exited { .. }));
    }

    #[tokio::test]
    async fn unknown_process_is_an_error() {
        let mgr = ProcessManager::new(100);
        assert!(mgr.stop("proc-999").await.is_err());
        assert!(mgr.status("proc-999").is_none());
        assert!(mgr.logs("proc-999", 10).is_none());
    }

    #[tokio::test]
    async fn list_shows_started_processes() {
        let mgr = ProcessManager::new(100);
        let id = mgr.start("sleep 5", None).unwrap();
        let listed = mgr.list();
        assert!(listed.iter().any(|(pid, cmd, _)| pid == &id && cmd.contains("sleep")));
        let _ = mgr.stop(&id).await;
    }
}
