// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod builtin;
pub mod context;
pub mod process;
pub mod registry;
pub mod safety;
pub mod tool;

pub use context::ExecutionContext;
pub use process::{ProcessManager, ProcessStatus};
pub use registry::{ToolRegistry, ToolSchema};
pub use safety::{confine_to_root, DenyList};
pub use tool::{Tool, ToolCall, ToolOutput};

pub use builtin::edit_file::EditFileTool;
pub use builtin::grep::GrepTool;
pub use builtin::list_dir::ListDirTool;
pub use builtin::process_tools::{ProcessLogsTool, ProcessStartTool, ProcessStopTool};
pub use builtin::read_file::ReadFileTool;
pub use builtin::run_command::RunCommandTool;
pub use builtin::write_file::WriteFileTool;

/// Registry with the full default tool set.
pub fn default_registry(timeout_secs: u64) -> ToolRegistry {
    let mut reg = ToolRegistry::new();
    reg.register(ReadFileTool);
    reg.register(WriteFileTool);
    reg.register(EditFileTool);
    reg.register(ListDirTool);
    reg.register(GrepTool);
    reg.register(RunCommandTool { timeout_secs });
    reg.register(ProcessStartTool);
    reg.register(ProcessStopTool);
    reg.register(ProcessLogsTool);
    reg
}
