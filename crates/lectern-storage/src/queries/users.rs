// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User upsert, lookup, listing, and block state.

use lectern_core::LecternError;
use lectern_core::types::User;
use rusqlite::{OptionalExtension, Row, params};

use super::{from_json, to_json};
use crate::database::{Database, map_tr_err};

const COLUMNS: &str = "id, first_name, last_name, username, is_superuser, permissions,
     catalog_permissions, blocked, blocked_reason, blocked_until, created_at, last_seen_at";

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let permissions: String = row.get(5)?;
    let catalog_permissions: String = row.get(6)?;
    Ok(User {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        username: row.get(3)?,
        is_superuser: row.get(4)?,
        permissions: from_json(5, &permissions)?,
        catalog_permissions: from_json(6, &catalog_permissions)?,
        blocked: row.get(7)?,
        blocked_reason: row.get(8)?,
        blocked_until: row.get(9)?,
        created_at: row.get(10)?,
        last_seen_at: row.get(11)?,
    })
}

fn select_user(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
        params![id],
        row_to_user,
    )
    .optional()
}

/// Inserts a user, or refreshes profile fields and `last_seen_at`.
pub async fn upsert_user(db: &Database, user: &User) -> Result<User, LecternError> {
    let user = user.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO users (id, first_name, last_name, username, is_superuser, permissions,
                     catalog_permissions, blocked, blocked_reason, blocked_until, created_at, last_seen_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(id) DO UPDATE SET
                     first_name = excluded.first_name,
                     last_name = excluded.last_name,
                     username = excluded.username,
                     is_superuser = excluded.is_superuser,
                     permissions = excluded.permissions,
                     catalog_permissions = excluded.catalog_permissions,
                     last_seen_at = excluded.last_seen_at",
                params![
                    user.id,
                    user.first_name,
                    user.last_name,
                    user.username,
                    user.is_superuser,
                    to_json(&user.permissions)?,
                    to_json(&user.catalog_permissions)?,
                    user.blocked,
                    user.blocked_reason,
                    user.blocked_until,
                    user.created_at,
                    user.last_seen_at,
                ],
            )?;
            select_user(conn, &user.id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_user(db: &Database, id: &str) -> Result<Option<User>, LecternError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| select_user(conn, &id))
        .await
        .map_err(map_tr_err)
}

/// One page of users in creation order. `limit = None` returns the rest.
pub async fn list_users(
    db: &Database,
    offset: u64,
    limit: Option<u64>,
) -> Result<Vec<User>, LecternError> {
    // SQLite treats a negative LIMIT as unbounded.
    let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
    let offset = i64::try_from(offset).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM users ORDER BY created_at ASC, rowid ASC LIMIT ?1 OFFSET ?2"
            ))?;
            let rows = stmt.query_map(params![limit, offset], row_to_user)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn count_users(db: &Database) -> Result<u64, LecternError> {
    db.connection()
        .call(|conn| conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get::<_, i64>(0)))
        .await
        .map(|n| n as u64)
        .map_err(map_tr_err)
}

/// Sets or clears the block. Returns `None` for an unknown user.
pub async fn set_user_blocked(
    db: &Database,
    id: &str,
    blocked: bool,
    reason: Option<String>,
    until: Option<String>,
) -> Result<Option<User>, LecternError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE users SET blocked = ?2, blocked_reason = ?3, blocked_until = ?4 WHERE id = ?1",
                params![id, blocked, reason, until],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            select_user(conn, &id)
        })
        .await
        .map_err(map_tr_err)
}
