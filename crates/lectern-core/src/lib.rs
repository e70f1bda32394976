// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Lectern catalog assistant.
//!
//! This crate provides the trait definitions, error type, and domain types
//! shared by every other Lectern crate. Storage backends, LLM providers and
//! the catalog client implement the traits defined here.

pub mod error;
pub mod events;
pub mod traits;
pub mod types;

pub use error::LecternError;
pub use events::{ChatEvent, ChatEventKind, ConversationListener, Focus};
pub use types::{AdapterType, HealthStatus};

pub use traits::{CatalogAdapter, PluginAdapter, ProviderAdapter, ProviderStream, StorageAdapter};
