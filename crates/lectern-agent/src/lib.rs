// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation orchestration and live session management for Lectern.
//!
//! The [`ConversationOrchestrator`] drives a tool-augmented exchange with
//! the completion service; the [`SessionRegistry`] owns every live
//! conversation, its event queue, and resumption from the message log.

pub mod orchestrator;
pub mod prompt;
pub mod queue;
pub mod registry;
pub mod replay;
pub mod transcript;

pub use orchestrator::{
    Capabilities, ConversationOrchestrator, OrchestratorConfig, TurnOutcome, TurnState,
};
pub use queue::EventQueue;
pub use registry::{LiveSession, SessionRegistry, TurnReport};
pub use transcript::{Transcript, TranscriptError};
