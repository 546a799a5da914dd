// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

use anyhow::Context;
use tracing::warn;

use crate::{AssistantReply, CompletionRequest, ModelProvider};

const INITIAL_BACKOFF_MS: u64 = 500;

/// Invoke the model with bounded retries and exponential backoff.
///
/// Transport and timeout failures are transient (§ error taxonomy): each
/// failed attempt doubles the delay before the next.  After `attempts`
/// failures the last error is surfaced with context; the caller decides
/// whether that terminates the thread.
pub async fn invoke_with_retry(
    provider: &dyn ModelProvider,
    req: &CompletionRequest,
    attempts: u32,
) -> anyhow::Result<AssistantReply> {
    let attempts = attempts.max(1);
    let mut backoff = Duration::from_millis(INITIAL_BACKOFF_MS);
    let mut last_err = None;

    for attempt in 1..=attempts {
        match provider.invoke(req.clone()).await {
            Ok(reply) => return Ok(reply),
            Err(e) => {
                warn!(
                    attempt,
                    attempts,
                    provider = provider.name(),
                    error = %e,
                    "model invocation failed"
                );
                last_err = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("no attempts made")))
        .with_context(|| format!("model completion failed after {attempts} attempts"))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
