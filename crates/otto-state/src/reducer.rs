// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashSet;

use otto_model::Message;

/// Tombstone-aware append reducer for the message log.
///
/// Incoming `Remove { id }` records delete any existing message with that id
/// and do not themselves persist.  Remaining incoming messages are appended
/// unless their id is tombstoned or already present in the log (dedup).
/// Appending the same tombstone twice is a no-op, which makes removal
/// idempotent.
pub fn reduce_messages(current: &mut Vec<Message>, incoming: Vec<Message>) {
    if incoming.is_empty() {
        return;
    }

    let tombstones: HashSet<String> = incoming
        .iter()
        .filter(|m| m.is_remove())
        .map(|m| m.id().to_string())
        .collect();

    if !tombstones.is_empty() {
        current.retain(|m| !tombstones.contains(m.id()));
    }

    let mut present: HashSet<String> = current.iter().map(|m| m.id().to_string()).collect();
    for msg in incoming {
        if msg.is_remove() || tombstones.contains(msg.id()) {
            continue;
        }
        if present.insert(msg.id().to_string()) {
            current.push(msg);
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
