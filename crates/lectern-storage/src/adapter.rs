// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use lectern_config::model::StorageConfig;
use lectern_core::types::{Chat, DailyLimit, Message, User};
use lectern_core::{AdapterType, HealthStatus, LecternError, PluginAdapter, StorageAdapter};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// The database is opened lazily by [`StorageAdapter::initialize`]; every
/// other call fails until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wraps an already-open database (in-memory databases in tests).
    pub fn from_database(db: Database) -> Self {
        Self {
            config: StorageConfig {
                wal_mode: false,
                ..StorageConfig::default()
            },
            db: OnceCell::new_with(Some(db)),
        }
    }

    fn db(&self) -> Result<&Database, LecternError> {
        self.db.get().ok_or_else(|| LecternError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, LecternError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LecternError> {
        if self.db.get().is_some() {
            self.close().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), LecternError> {
        if self.db.initialized() {
            return Ok(());
        }
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| LecternError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), LecternError> {
        let db = self.db()?;
        if self.config.wal_mode {
            db.checkpoint().await?;
            debug!("WAL checkpoint complete");
        }
        Ok(())
    }

    async fn upsert_user(&self, user: &User) -> Result<User, LecternError> {
        queries::users::upsert_user(self.db()?, user).await
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, LecternError> {
        queries::users::get_user(self.db()?, id).await
    }

    async fn list_users(&self) -> Result<Vec<User>, LecternError> {
        queries::users::list_users(self.db()?, 0, None).await
    }

    async fn list_users_page(&self, offset: u64, limit: u64) -> Result<Vec<User>, LecternError> {
        queries::users::list_users(self.db()?, offset, Some(limit)).await
    }

    async fn count_users(&self) -> Result<u64, LecternError> {
        queries::users::count_users(self.db()?).await
    }

    async fn set_user_blocked(
        &self,
        id: &str,
        blocked: bool,
        reason: Option<String>,
        until: Option<String>,
    ) -> Result<Option<User>, LecternError> {
        queries::users::set_user_blocked(self.db()?, id, blocked, reason, until).await
    }

    async fn create_chat(&self, chat: &Chat) -> Result<Chat, LecternError> {
        queries::chats::create_chat(self.db()?, chat).await
    }

    async fn get_chat(&self, id: &str) -> Result<Option<Chat>, LecternError> {
        queries::chats::get_chat(self.db()?, id).await
    }

    async fn list_chats_for_user(&self, user_id: &str) -> Result<Vec<Chat>, LecternError> {
        queries::chats::list_chats_for_user(self.db()?, user_id).await
    }

    async fn add_chat_tokens(&self, chat_id: &str, tokens: i64) -> Result<(), LecternError> {
        queries::chats::add_chat_tokens(self.db()?, chat_id, tokens).await
    }

    async fn append_message(&self, message: &Message) -> Result<(), LecternError> {
        queries::messages::append_message(self.db()?, message).await
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>, LecternError> {
        queries::messages::list_messages(self.db()?, chat_id).await
    }

    async fn list_user_messages(
        &self,
        chat_id: &str,
        user_id: &str,
    ) -> Result<Vec<Message>, LecternError> {
        queries::messages::list_user_messages(self.db()?, chat_id, user_id).await
    }

    async fn clear_messages(&self, chat_id: &str) -> Result<u64, LecternError> {
        queries::messages::clear_messages(self.db()?, chat_id).await
    }

    async fn get_daily_limit(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<Option<DailyLimit>, LecternError> {
        queries::daily_limits::get(self.db()?, user_id, date).await
    }

    async fn create_daily_limit(&self, limit: &DailyLimit) -> Result<DailyLimit, LecternError> {
        queries::daily_limits::create(self.db()?, limit).await
    }

    async fn try_increment_daily_limit(
        &self,
        user_id: &str,
        date: &str,
        messages: i64,
        tokens: i64,
    ) -> Result<Option<DailyLimit>, LecternError> {
        queries::daily_limits::try_increment(self.db()?, user_id, date, messages, tokens).await
    }

    async fn add_daily_tokens(
        &self,
        user_id: &str,
        date: &str,
        tokens: i64,
    ) -> Result<(), LecternError> {
        queries::daily_limits::add_tokens(self.db()?, user_id, date, tokens).await
    }

    async fn delete_daily_limits_before(&self, date: &str) -> Result<u64, LecternError> {
        queries::daily_limits::delete_before(self.db()?, date).await
    }
}
