// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod checkpoint;
mod reducer;
mod state;

pub use checkpoint::{
    Checkpoint, Checkpointer, FileSaver, MemorySaver, PendingWrite, ThreadMetadata, ThreadStatus,
};
pub use reducer::reduce_messages;
pub use state::{AgentState, StateDelta, StateError, TaskStatus, UserIntent};
