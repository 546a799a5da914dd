// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Named provider configurations.
    ///
    /// Define custom endpoints, local models, or additional accounts here and
    /// reference them by name with `--model <key>` or `--model <key>/<model>`.
    ///
    /// ```yaml
    /// providers:
    ///   my_ollama:
    ///     provider: openai        # uses the OpenAI-compatible wire format
    ///     base_url: http://localhost:11434/v1
    ///     name: llama3.2
    /// ```
    #[serde(default)]
    pub providers: std::collections::HashMap<String, ModelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider identifier: "openai" (any OpenAI-compatible endpoint) | "mock"
    pub provider: String,
    /// Model name forwarded to the provider API
    pub name: String,
    /// Environment variable that holds the API key (read at runtime)
    pub api_key_env: Option<String>,
    /// Explicit API key; prefer api_key_env in config files to avoid secrets
    /// in version-controlled files
    pub api_key: Option<String>,
    /// Base URL override.  Useful for local proxies, LiteLLM, or Cloudflare.
    pub base_url: Option<String>,
    /// Maximum tokens to request in a single completion
    pub max_tokens: Option<u32>,
    /// Sampling temperature (0.0–2.0)
    pub temperature: Option<f32>,
    /// Per-call timeout in seconds
    #[serde(default = "default_model_timeout_secs")]
    pub timeout_secs: u64,
    /// Transport-error retries per call (exponential backoff between attempts)
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
}

fn default_model_timeout_secs() -> u64 {
    60
}
fn default_retry_attempts() -> u32 {
    3
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            name: "gpt-4o".into(),
            // api_key_env is intentionally None: the provider constructor
            // falls back to the canonical env var for the chosen provider
            // (OPENAI_API_KEY).  Hard-coding it here would shadow that lookup
            // when the provider is overridden via the providers map.
            api_key_env: None,
            api_key: None,
            base_url: None,
            max_tokens: Some(4096),
            temperature: Some(0.2),
            timeout_secs: default_model_timeout_secs(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

fn default_max_iterations() -> u32 {
    50
}
fn default_soft_stuck_after() -> u32 {
    5
}
fn default_summary_trigger() -> usize {
    40
}
fn default_summary_keep_tail() -> usize {
    10
}
fn default_max_tree_chars() -> usize {
    5_000
}
fn default_max_tree_entries() -> usize {
    3_000
}
fn default_max_context_file_bytes() -> u64 {
    10 * 1024 * 1024
}
fn default_tool_result_char_cap() -> usize {
    16_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum executor iterations per todo before the thread is force-closed
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Iterations without tool use after which an ambiguous reply forces the
    /// todo cursor forward instead of looping
    #[serde(default = "default_soft_stuck_after")]
    pub soft_stuck_after: u32,
    /// Message-log length at which the oldest prefix is summarised away
    #[serde(default = "default_summary_trigger")]
    pub summary_trigger: usize,
    /// Upper bound on the trailing messages kept out of a summarisation cut.
    /// The cut point additionally advances past tool results so that no
    /// tool-call/tool-result pair is ever split across it.
    #[serde(default = "default_summary_keep_tail")]
    pub summary_keep_tail: usize,
    /// Character cap for the project-tree context block (truncated with an
    /// ellipsis beyond this)
    #[serde(default = "default_max_tree_chars")]
    pub max_tree_chars: usize,
    /// Maximum entries recorded during the project-tree scan
    #[serde(default = "default_max_tree_entries")]
    pub max_tree_entries: usize,
    /// Size cap for files injected into context via pending file paths;
    /// larger files are reported instead of read
    #[serde(default = "default_max_context_file_bytes")]
    pub max_context_file_bytes: u64,
    /// Maximum characters allowed for a single tool result before it is
    /// head-truncated with an explicit omission notice.  0 disables the cap.
    #[serde(default = "default_tool_result_char_cap")]
    pub tool_result_char_cap: usize,
    /// System prompt override; leave None to use the built-in prompt
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            soft_stuck_after: default_soft_stuck_after(),
            summary_trigger: default_summary_trigger(),
            summary_keep_tail: default_summary_keep_tail(),
            max_tree_chars: default_max_tree_chars(),
            max_tree_entries: default_max_tree_entries(),
            max_context_file_bytes: default_max_context_file_bytes(),
            tool_result_char_cap: default_tool_result_char_cap(),
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Commands containing any of these substrings are rejected before spawn
    pub deny_substrings: Vec<String>,
    /// Timeout in seconds for a single foreground tool call
    pub timeout_secs: u64,
    /// Lines retained per background process in its log ring buffer
    pub process_log_lines: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            deny_substrings: vec![
                "rm -rf".into(),
                "del /f".into(),
                "format ".into(),
                "dd if=".into(),
                "mkfs".into(),
                ":(){".into(),
                "shutdown".into(),
            ],
            timeout_secs: 60,
            process_log_lines: 1_000,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
