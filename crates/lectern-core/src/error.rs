// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Lectern catalog assistant.

use thiserror::Error;

/// The primary error type used across all Lectern adapter traits and core operations.
#[derive(Debug, Error)]
pub enum LecternError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// LLM provider errors, including failures in the middle of a stream.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Catalog service errors (unreachable, non-success status, bad payload).
    #[error("catalog error: {message}")]
    Catalog {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Missing or invalid API key, or a key that does not own the session.
    #[error("unauthorized: {0}")]
    Auth(String),

    /// The caller is known but not allowed to proceed (blocked user).
    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    /// Unknown chat, or a chat not owned by the caller.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed request input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Daily message or token budget exhausted.
    #[error("daily quota exceeded ({remaining} of {limit} remaining, resets at {reset_at})")]
    QuotaExceeded {
        remaining: i64,
        limit: i64,
        reset_at: String,
    },

    /// A tool invocation failed (bad arguments, catalog failure).
    #[error("tool error: {message}")]
    Tool {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The tool-call loop hit its configured round cap.
    #[error("tool round limit of {rounds} reached")]
    RoundLimit { rounds: u32 },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LecternError {
    /// Shorthand for a [`LecternError::Tool`] without an underlying source.
    pub fn tool(message: impl Into<String>) -> Self {
        Self::Tool {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a [`LecternError::Provider`] without an underlying source.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a [`LecternError::Catalog`] without an underlying source.
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps any error as a storage failure.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            source: Box::new(err),
        }
    }
}
