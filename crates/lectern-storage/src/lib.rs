// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence for the Lectern catalog assistant.
//!
//! Two interchangeable [`StorageAdapter`](lectern_core::StorageAdapter)
//! implementations: [`SqliteStorage`] (WAL-mode SQLite with embedded
//! migrations, single writer through `tokio-rusqlite`) and
//! [`JsonFileStorage`] (one JSON document, rewritten atomically).

pub mod adapter;
pub mod database;
pub mod file;
pub mod migrations;
pub mod queries;

use std::sync::Arc;

use lectern_config::model::{StorageBackend, StorageConfig};
use lectern_core::StorageAdapter;

pub use adapter::SqliteStorage;
pub use database::Database;
pub use file::JsonFileStorage;

/// Builds the backend selected in configuration. Call `initialize` before use.
pub fn from_config(config: &StorageConfig) -> Arc<dyn StorageAdapter + Send + Sync> {
    match config.backend {
        StorageBackend::Sqlite => Arc::new(SqliteStorage::new(config.clone())),
        StorageBackend::File => Arc::new(JsonFileStorage::new(&config.json_path)),
    }
}
