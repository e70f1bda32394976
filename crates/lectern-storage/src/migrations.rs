// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded schema migrations.
//!
//! SQL files under `migrations/` are compiled in with refinery and applied
//! on every open. Refinery records applied versions in
//! `refinery_schema_history`.

use lectern_core::LecternError;
use tracing::info;

use crate::database::Database;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Applies all pending migrations.
pub async fn run(db: &Database) -> Result<(), LecternError> {
    let applied = db
        .connection()
        .call(|conn| embedded::migrations::runner().run(conn))
        .await
        .map_err(|e| LecternError::Storage {
            source: e.to_string().into(),
        })?;
    let count = applied.applied_migrations().len();
    if count > 0 {
        info!(count, "applied database migrations");
    }
    Ok(())
}
