// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only message log.

use lectern_core::LecternError;
use lectern_core::types::{Message, Role};
use rusqlite::{Row, params};

use super::{from_json, to_json};
use crate::database::{Database, map_tr_err};

const SELECT: &str = "SELECT id, chat_id, user_id, role, content, created_at, entry_id, catalog_id,
            provider_msg_id, entry_ids, entry_catalogs
     FROM messages";

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    let role: String = row.get(3)?;
    let role = role.parse::<Role>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let entry_ids: Option<String> = row.get(9)?;
    let entry_catalogs: Option<String> = row.get(10)?;
    Ok(Message {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        user_id: row.get(2)?,
        role,
        content: row.get(4)?,
        created_at: row.get(5)?,
        entry_id: row.get(6)?,
        catalog_id: row.get(7)?,
        provider_msg_id: row.get(8)?,
        entry_ids: entry_ids.map(|raw| from_json(9, &raw)).transpose()?,
        entry_catalogs: entry_catalogs.map(|raw| from_json(10, &raw)).transpose()?,
    })
}

/// Appends a message and bumps the chat's message count in one transaction.
pub async fn append_message(db: &Database, message: &Message) -> Result<(), LecternError> {
    let msg = message.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO messages (id, chat_id, user_id, role, content, created_at, entry_id,
                     catalog_id, provider_msg_id, entry_ids, entry_catalogs)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    msg.id,
                    msg.chat_id,
                    msg.user_id,
                    msg.role.to_string(),
                    msg.content,
                    msg.created_at,
                    msg.entry_id,
                    msg.catalog_id,
                    msg.provider_msg_id,
                    msg.entry_ids.as_ref().map(to_json).transpose()?,
                    msg.entry_catalogs.as_ref().map(to_json).transpose()?,
                ],
            )?;
            tx.execute(
                "UPDATE chats SET message_count = message_count + 1 WHERE id = ?1",
                params![msg.chat_id],
            )?;
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// A chat's messages in conversation order.
pub async fn list_messages(db: &Database, chat_id: &str) -> Result<Vec<Message>, LecternError> {
    let chat_id = chat_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT} WHERE chat_id = ?1 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt.query_map(params![chat_id], row_to_message)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// A chat's messages, only if the chat belongs to `user_id`.
pub async fn list_user_messages(
    db: &Database,
    chat_id: &str,
    user_id: &str,
) -> Result<Vec<Message>, LecternError> {
    let chat_id = chat_id.to_string();
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT} WHERE chat_id = ?1
                   AND EXISTS (SELECT 1 FROM chats WHERE chats.id = ?1 AND chats.user_id = ?2)
                 ORDER BY created_at ASC, rowid ASC"
            ))?;
            let rows = stmt.query_map(params![chat_id, user_id], row_to_message)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Deletes the chat's log and resets its message count.
pub async fn clear_messages(db: &Database, chat_id: &str) -> Result<u64, LecternError> {
    let chat_id = chat_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute("DELETE FROM messages WHERE chat_id = ?1", params![chat_id])?;
            tx.execute(
                "UPDATE chats SET message_count = 0 WHERE id = ?1",
                params![chat_id],
            )?;
            tx.commit()?;
            Ok(removed as u64)
        })
        .await
        .map_err(map_tr_err)
}
