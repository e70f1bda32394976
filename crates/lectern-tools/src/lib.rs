// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tools the model can call during a conversation.

pub mod builtin;
pub mod tool;

pub use builtin::register_builtins;
pub use tool::{Tool, ToolContext, ToolOutput, ToolRegistry};
