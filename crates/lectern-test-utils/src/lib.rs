// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Lectern integration tests.
//!
//! Provides mock adapters and a test harness for fast, deterministic,
//! CI-runnable tests without a real completion service or catalog.
//!
//! # Components
//!
//! - [`MockProvider`] - Scripted completion rounds, records every request
//! - [`MockCatalog`] - In-memory catalog with identities and entries
//! - [`RecordingListener`] - Captures conversation events in order
//! - [`TestHarness`] - Full registry + quota stack over temp storage

pub mod harness;
pub mod mock_catalog;
pub mod mock_provider;
pub mod recording;

pub use harness::{TEST_API_KEY, TEST_USER_ID, TestHarness, TestHarnessBuilder};
pub use mock_catalog::MockCatalog;
pub use mock_provider::{MockProvider, MockRound};
pub use recording::RecordingListener;
