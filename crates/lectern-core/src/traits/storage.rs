// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait shared by the relational and file-backed stores.

use async_trait::async_trait;

use crate::error::LecternError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Chat, DailyLimit, Message, User};

/// Persistence contract for users, chats, messages, and daily counters.
///
/// Every history query returns messages strictly by timestamp ascending,
/// ties broken by insertion order.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, loading files, etc.).
    async fn initialize(&self) -> Result<(), LecternError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), LecternError>;

    // --- Users ---

    /// Inserts a user or refreshes its profile fields and `last_seen_at`.
    /// Block state and `created_at` of an existing user are preserved.
    async fn upsert_user(&self, user: &User) -> Result<User, LecternError>;

    async fn get_user(&self, id: &str) -> Result<Option<User>, LecternError>;

    /// All users ordered by creation time.
    async fn list_users(&self) -> Result<Vec<User>, LecternError>;

    /// One page of users ordered by creation time.
    async fn list_users_page(&self, offset: u64, limit: u64) -> Result<Vec<User>, LecternError>;

    async fn count_users(&self) -> Result<u64, LecternError>;

    /// Sets block state. Returns the updated user, or `None` if unknown.
    async fn set_user_blocked(
        &self,
        id: &str,
        blocked: bool,
        reason: Option<String>,
        until: Option<String>,
    ) -> Result<Option<User>, LecternError>;

    // --- Chats ---

    /// Creates a chat. If the id already exists the stored record is
    /// returned unchanged and nothing is written.
    async fn create_chat(&self, chat: &Chat) -> Result<Chat, LecternError>;

    async fn get_chat(&self, id: &str) -> Result<Option<Chat>, LecternError>;

    /// Chats owned by `user_id`, most recently started first.
    async fn list_chats_for_user(&self, user_id: &str) -> Result<Vec<Chat>, LecternError>;

    async fn add_chat_tokens(&self, chat_id: &str, tokens: i64) -> Result<(), LecternError>;

    // --- Messages ---

    /// Appends a message and bumps the owning chat's message count.
    async fn append_message(&self, message: &Message) -> Result<(), LecternError>;

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>, LecternError>;

    /// Messages of one chat restricted to `user_id`'s ownership.
    async fn list_user_messages(
        &self,
        chat_id: &str,
        user_id: &str,
    ) -> Result<Vec<Message>, LecternError>;

    /// Deletes a chat's message log. Returns the number removed.
    async fn clear_messages(&self, chat_id: &str) -> Result<u64, LecternError>;

    // --- Daily limits ---

    async fn get_daily_limit(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<Option<DailyLimit>, LecternError>;

    /// Creates the row for `(user_id, date)`, or returns the existing one.
    async fn create_daily_limit(&self, limit: &DailyLimit) -> Result<DailyLimit, LecternError>;

    /// Atomically adds `messages` and `tokens` to the row if both stay within
    /// their limits. Returns the updated row, or `None` when denied or absent.
    async fn try_increment_daily_limit(
        &self,
        user_id: &str,
        date: &str,
        messages: i64,
        tokens: i64,
    ) -> Result<Option<DailyLimit>, LecternError>;

    /// Unconditionally adjusts token usage (clamped at zero).
    async fn add_daily_tokens(
        &self,
        user_id: &str,
        date: &str,
        tokens: i64,
    ) -> Result<(), LecternError>;

    /// Deletes every row dated strictly before `date`. Returns rows removed.
    async fn delete_daily_limits_before(&self, date: &str) -> Result<u64, LecternError>;
}
