// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File-backed implementation of the StorageAdapter trait.
//!
//! The whole store lives in memory behind one async mutex and is written
//! back as a single JSON document after every mutation. Writes go to a
//! sibling temp file that is then renamed over the original, so a crash
//! leaves either the old or the new document.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use lectern_core::types::{Chat, DailyLimit, Message, User, timestamp_now};
use lectern_core::{AdapterType, HealthStatus, LecternError, PluginAdapter, StorageAdapter};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    chats: Vec<Chat>,
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    daily_limits: Vec<DailyLimit>,
}

/// JSON document store. `path = None` keeps everything in memory.
pub struct JsonFileStorage {
    path: Option<PathBuf>,
    doc: Mutex<Document>,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            doc: Mutex::new(Document::default()),
        }
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            doc: Mutex::new(Document::default()),
        }
    }

    async fn persist(&self, doc: &Document) -> Result<(), LecternError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let body = serde_json::to_vec_pretty(doc).map_err(LecternError::storage)?;
        let tmp = tmp_path(path);
        tokio::fs::write(&tmp, body)
            .await
            .map_err(LecternError::storage)?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(LecternError::storage)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn sorted_by_time(mut messages: Vec<Message>) -> Vec<Message> {
    // Stable sort keeps insertion order for equal timestamps.
    messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    messages
}

#[async_trait]
impl PluginAdapter for JsonFileStorage {
    fn name(&self) -> &str {
        "json-file"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, LecternError> {
        match &self.path {
            Some(path) if tokio::fs::metadata(path).await.is_err() => Ok(HealthStatus::Degraded(
                format!("{} has not been written yet", path.display()),
            )),
            _ => Ok(HealthStatus::Healthy),
        }
    }

    async fn shutdown(&self) -> Result<(), LecternError> {
        self.close().await
    }
}

#[async_trait]
impl StorageAdapter for JsonFileStorage {
    async fn initialize(&self) -> Result<(), LecternError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(LecternError::storage)?;
        }
        let mut doc = self.doc.lock().await;
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                *doc = serde_json::from_slice(&bytes).map_err(LecternError::storage)?;
                info!(
                    path = %path.display(),
                    users = doc.users.len(),
                    chats = doc.chats.len(),
                    "loaded JSON store"
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no JSON store yet, starting empty");
            }
            Err(e) => return Err(LecternError::storage(e)),
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), LecternError> {
        let doc = self.doc.lock().await;
        self.persist(&doc).await
    }

    async fn upsert_user(&self, user: &User) -> Result<User, LecternError> {
        let mut doc = self.doc.lock().await;
        let stored = match doc.users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => {
                existing.first_name = user.first_name.clone();
                existing.last_name = user.last_name.clone();
                existing.username = user.username.clone();
                existing.is_superuser = user.is_superuser;
                existing.permissions = user.permissions.clone();
                existing.catalog_permissions = user.catalog_permissions.clone();
                existing.last_seen_at = user.last_seen_at.clone();
                existing.clone()
            }
            None => {
                doc.users.push(user.clone());
                user.clone()
            }
        };
        self.persist(&doc).await?;
        Ok(stored)
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, LecternError> {
        let doc = self.doc.lock().await;
        Ok(doc.users.iter().find(|u| u.id == id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, LecternError> {
        let doc = self.doc.lock().await;
        Ok(doc.users.clone())
    }

    async fn list_users_page(&self, offset: u64, limit: u64) -> Result<Vec<User>, LecternError> {
        let doc = self.doc.lock().await;
        Ok(doc
            .users
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count_users(&self) -> Result<u64, LecternError> {
        Ok(self.doc.lock().await.users.len() as u64)
    }

    async fn set_user_blocked(
        &self,
        id: &str,
        blocked: bool,
        reason: Option<String>,
        until: Option<String>,
    ) -> Result<Option<User>, LecternError> {
        let mut doc = self.doc.lock().await;
        let Some(user) = doc.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        user.blocked = blocked;
        user.blocked_reason = reason;
        user.blocked_until = until;
        let updated = user.clone();
        self.persist(&doc).await?;
        Ok(Some(updated))
    }

    async fn create_chat(&self, chat: &Chat) -> Result<Chat, LecternError> {
        let mut doc = self.doc.lock().await;
        if let Some(existing) = doc.chats.iter().find(|c| c.id == chat.id) {
            return Ok(existing.clone());
        }
        doc.chats.push(chat.clone());
        self.persist(&doc).await?;
        Ok(chat.clone())
    }

    async fn get_chat(&self, id: &str) -> Result<Option<Chat>, LecternError> {
        let doc = self.doc.lock().await;
        Ok(doc.chats.iter().find(|c| c.id == id).cloned())
    }

    async fn list_chats_for_user(&self, user_id: &str) -> Result<Vec<Chat>, LecternError> {
        let doc = self.doc.lock().await;
        let mut chats: Vec<Chat> = doc
            .chats
            .iter()
            .rev()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        // Reversed first so equal start times list the later insert first.
        chats.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(chats)
    }

    async fn add_chat_tokens(&self, chat_id: &str, tokens: i64) -> Result<(), LecternError> {
        let mut doc = self.doc.lock().await;
        if let Some(chat) = doc.chats.iter_mut().find(|c| c.id == chat_id) {
            chat.total_tokens += tokens;
            self.persist(&doc).await?;
        }
        Ok(())
    }

    async fn append_message(&self, message: &Message) -> Result<(), LecternError> {
        let mut doc = self.doc.lock().await;
        if doc.messages.iter().any(|m| m.id == message.id) {
            return Err(LecternError::Storage {
                source: format!("duplicate message id {}", message.id).into(),
            });
        }
        doc.messages.push(message.clone());
        if let Some(chat) = doc.chats.iter_mut().find(|c| c.id == message.chat_id) {
            chat.message_count += 1;
        }
        self.persist(&doc).await
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>, LecternError> {
        let doc = self.doc.lock().await;
        Ok(sorted_by_time(
            doc.messages
                .iter()
                .filter(|m| m.chat_id == chat_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_user_messages(
        &self,
        chat_id: &str,
        user_id: &str,
    ) -> Result<Vec<Message>, LecternError> {
        let doc = self.doc.lock().await;
        let owned = doc
            .chats
            .iter()
            .any(|c| c.id == chat_id && c.user_id == user_id);
        if !owned {
            return Ok(Vec::new());
        }
        Ok(sorted_by_time(
            doc.messages
                .iter()
                .filter(|m| m.chat_id == chat_id)
                .cloned()
                .collect(),
        ))
    }

    async fn clear_messages(&self, chat_id: &str) -> Result<u64, LecternError> {
        let mut doc = self.doc.lock().await;
        let before = doc.messages.len();
        doc.messages.retain(|m| m.chat_id != chat_id);
        let removed = (before - doc.messages.len()) as u64;
        if let Some(chat) = doc.chats.iter_mut().find(|c| c.id == chat_id) {
            chat.message_count = 0;
        }
        self.persist(&doc).await?;
        Ok(removed)
    }

    async fn get_daily_limit(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<Option<DailyLimit>, LecternError> {
        let doc = self.doc.lock().await;
        Ok(doc
            .daily_limits
            .iter()
            .find(|l| l.user_id == user_id && l.date == date)
            .cloned())
    }

    async fn create_daily_limit(&self, limit: &DailyLimit) -> Result<DailyLimit, LecternError> {
        let mut doc = self.doc.lock().await;
        if let Some(existing) = doc
            .daily_limits
            .iter()
            .find(|l| l.user_id == limit.user_id && l.date == limit.date)
        {
            return Ok(existing.clone());
        }
        doc.daily_limits.push(limit.clone());
        self.persist(&doc).await?;
        Ok(limit.clone())
    }

    async fn try_increment_daily_limit(
        &self,
        user_id: &str,
        date: &str,
        messages: i64,
        tokens: i64,
    ) -> Result<Option<DailyLimit>, LecternError> {
        let mut doc = self.doc.lock().await;
        let Some(row) = doc
            .daily_limits
            .iter_mut()
            .find(|l| l.user_id == user_id && l.date == date)
        else {
            return Ok(None);
        };
        if row.messages_used + messages > row.messages_limit
            || row.tokens_used + tokens > row.tokens_limit
        {
            return Ok(None);
        }
        row.messages_used += messages;
        row.tokens_used += tokens;
        row.updated_at = timestamp_now();
        let updated = row.clone();
        self.persist(&doc).await?;
        Ok(Some(updated))
    }

    async fn add_daily_tokens(
        &self,
        user_id: &str,
        date: &str,
        tokens: i64,
    ) -> Result<(), LecternError> {
        let mut doc = self.doc.lock().await;
        if let Some(row) = doc
            .daily_limits
            .iter_mut()
            .find(|l| l.user_id == user_id && l.date == date)
        {
            row.tokens_used = (row.tokens_used + tokens).max(0);
            row.updated_at = timestamp_now();
            self.persist(&doc).await?;
        }
        Ok(())
    }

    async fn delete_daily_limits_before(&self, date: &str) -> Result<u64, LecternError> {
        let mut doc = self.doc.lock().await;
        let before = doc.daily_limits.len();
        doc.daily_limits.retain(|l| l.date.as_str() >= date);
        let removed = (before - doc.daily_limits.len()) as u64;
        if removed > 0 {
            self.persist(&doc).await?;
        }
        Ok(removed)
    }
}
