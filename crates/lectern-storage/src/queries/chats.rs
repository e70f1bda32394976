// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat records and their running aggregates.

use lectern_core::LecternError;
use lectern_core::types::Chat;
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};

fn row_to_chat(row: &Row<'_>) -> rusqlite::Result<Chat> {
    Ok(Chat {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        started_at: row.get(3)?,
        message_count: row.get(4)?,
        total_tokens: row.get(5)?,
    })
}

fn select_chat(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<Chat>> {
    conn.query_row(
        "SELECT id, user_id, title, started_at, message_count, total_tokens
         FROM chats WHERE id = ?1",
        params![id],
        row_to_chat,
    )
    .optional()
}

/// Inserts the chat unless its id exists; either way returns the stored row.
pub async fn create_chat(db: &Database, chat: &Chat) -> Result<Chat, LecternError> {
    let chat = chat.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO chats (id, user_id, title, started_at, message_count, total_tokens)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO NOTHING",
                params![
                    chat.id,
                    chat.user_id,
                    chat.title,
                    chat.started_at,
                    chat.message_count,
                    chat.total_tokens,
                ],
            )?;
            select_chat(conn, &chat.id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_chat(db: &Database, id: &str) -> Result<Option<Chat>, LecternError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| select_chat(conn, &id))
        .await
        .map_err(map_tr_err)
}

/// A user's chats, most recently started first.
pub async fn list_chats_for_user(db: &Database, user_id: &str) -> Result<Vec<Chat>, LecternError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, title, started_at, message_count, total_tokens
                 FROM chats WHERE user_id = ?1
                 ORDER BY started_at DESC, rowid DESC",
            )?;
            let rows = stmt.query_map(params![user_id], row_to_chat)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn add_chat_tokens(db: &Database, chat_id: &str, tokens: i64) -> Result<(), LecternError> {
    let chat_id = chat_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE chats SET total_tokens = total_tokens + ?2 WHERE id = ?1",
                params![chat_id, tokens],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
