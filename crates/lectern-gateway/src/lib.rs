// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP boundary of Lectern.
//!
//! Translates requests into [`SessionRegistry`](lectern_agent::SessionRegistry)
//! and [`QuotaGovernor`](lectern_quota::QuotaGovernor) calls and serializes
//! each conversation's event queue back to the client, either as an SSE
//! stream per turn or through long-polling.

pub mod admin;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;
pub mod sse;

pub use error::ApiError;
pub use server::{GatewayState, ServerConfig, router, start_server};
