// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user daily counters.
//!
//! Admission goes through [`try_increment`], whose single conditional
//! UPDATE makes check-and-increment atomic.

use lectern_core::LecternError;
use lectern_core::types::{DailyLimit, timestamp_now};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};

fn row_to_limit(row: &Row<'_>) -> rusqlite::Result<DailyLimit> {
    Ok(DailyLimit {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date: row.get(2)?,
        messages_used: row.get(3)?,
        messages_limit: row.get(4)?,
        tokens_used: row.get(5)?,
        tokens_limit: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn select_limit(
    conn: &rusqlite::Connection,
    user_id: &str,
    date: &str,
) -> rusqlite::Result<Option<DailyLimit>> {
    conn.query_row(
        "SELECT id, user_id, date, messages_used, messages_limit, tokens_used, tokens_limit,
                created_at, updated_at
         FROM daily_limits WHERE user_id = ?1 AND date = ?2",
        params![user_id, date],
        row_to_limit,
    )
    .optional()
}

pub async fn get(db: &Database, user_id: &str, date: &str) -> Result<Option<DailyLimit>, LecternError> {
    let (user_id, date) = (user_id.to_string(), date.to_string());
    db.connection()
        .call(move |conn| select_limit(conn, &user_id, &date))
        .await
        .map_err(map_tr_err)
}

/// Inserts the row for `(user_id, date)` if absent and returns the stored row.
pub async fn create(db: &Database, limit: &DailyLimit) -> Result<DailyLimit, LecternError> {
    let limit = limit.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO daily_limits (id, user_id, date, messages_used, messages_limit,
                     tokens_used, tokens_limit, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(user_id, date) DO NOTHING",
                params![
                    limit.id,
                    limit.user_id,
                    limit.date,
                    limit.messages_used,
                    limit.messages_limit,
                    limit.tokens_used,
                    limit.tokens_limit,
                    limit.created_at,
                    limit.updated_at,
                ],
            )?;
            select_limit(conn, &limit.user_id, &limit.date)?
                .ok_or(rusqlite::Error::QueryReturnedNoRows)
        })
        .await
        .map_err(map_tr_err)
}

/// Adds usage only if both counters stay within their limits.
pub async fn try_increment(
    db: &Database,
    user_id: &str,
    date: &str,
    messages: i64,
    tokens: i64,
) -> Result<Option<DailyLimit>, LecternError> {
    let (user_id, date) = (user_id.to_string(), date.to_string());
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE daily_limits
                 SET messages_used = messages_used + ?3,
                     tokens_used = tokens_used + ?4,
                     updated_at = ?5
                 WHERE user_id = ?1 AND date = ?2
                   AND messages_used + ?3 <= messages_limit
                   AND tokens_used + ?4 <= tokens_limit",
                params![user_id, date, messages, tokens, timestamp_now()],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            select_limit(conn, &user_id, &date)
        })
        .await
        .map_err(map_tr_err)
}

/// Adjusts token usage without a limit check, never going below zero.
pub async fn add_tokens(
    db: &Database,
    user_id: &str,
    date: &str,
    tokens: i64,
) -> Result<(), LecternError> {
    let (user_id, date) = (user_id.to_string(), date.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE daily_limits
                 SET tokens_used = MAX(0, tokens_used + ?3), updated_at = ?4
                 WHERE user_id = ?1 AND date = ?2",
                params![user_id, date, tokens, timestamp_now()],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Removes rows for quota days before `date`.
pub async fn delete_before(db: &Database, date: &str) -> Result<u64, LecternError> {
    let date = date.to_string();
    db.connection()
        .call(move |conn| {
            let removed = conn.execute("DELETE FROM daily_limits WHERE date < ?1", params![date])?;
            Ok(removed as u64)
        })
        .await
        .map_err(map_tr_err)
}
