// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the conversation stack (storage in a temp
//! directory, mock provider and catalog, built-in tools, session registry
//! and quota governor) and drives turns the way the HTTP boundary does:
//! admit against quota, run the turn, settle tokens.

use std::sync::Arc;

use lectern_agent::{Capabilities, OrchestratorConfig, SessionRegistry};
use lectern_config::model::{LecternConfig, QuotaConfig, StorageBackend, StorageConfig};
use lectern_core::{ChatEvent, LecternError, StorageAdapter};
use lectern_quota::{QuotaGovernor, estimate_tokens};
use lectern_tools::{ToolRegistry, register_builtins};

use crate::mock_catalog::MockCatalog;
use crate::mock_provider::{MockProvider, MockRound};

/// API key the harness catalog accepts.
pub const TEST_API_KEY: &str = "test-key";
/// User id behind [`TEST_API_KEY`].
pub const TEST_USER_ID: &str = "test-user";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    rounds: Vec<MockRound>,
    catalog: Option<MockCatalog>,
    quota: QuotaConfig,
    max_tool_rounds: Option<u32>,
    backend: StorageBackend,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            rounds: Vec::new(),
            catalog: None,
            quota: QuotaConfig::default(),
            max_tool_rounds: None,
            backend: StorageBackend::File,
        }
    }

    /// Scripted completion rounds, consumed one per request.
    pub fn with_rounds(mut self, rounds: Vec<MockRound>) -> Self {
        self.rounds = rounds;
        self
    }

    /// Replaces the default catalog, which only knows [`TEST_API_KEY`].
    pub fn with_catalog(mut self, catalog: MockCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_quota(mut self, quota: QuotaConfig) -> Self {
        self.quota = quota;
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = Some(rounds);
        self
    }

    /// Use the SQLite backend instead of the JSON file.
    pub fn with_sqlite(mut self) -> Self {
        self.backend = StorageBackend::Sqlite;
        self
    }

    pub async fn build(self) -> Result<TestHarness, LecternError> {
        let temp_dir = tempfile::TempDir::new().map_err(LecternError::storage)?;

        let storage_config = StorageConfig {
            backend: self.backend,
            database_path: temp_dir.path().join("test.db").to_string_lossy().into_owned(),
            json_path: temp_dir.path().join("test.json").to_string_lossy().into_owned(),
            wal_mode: true,
        };
        let storage = lectern_storage::from_config(&storage_config);
        storage.initialize().await?;

        let mut config = LecternConfig {
            storage: storage_config,
            quota: self.quota,
            ..LecternConfig::default()
        };
        if let Some(rounds) = self.max_tool_rounds {
            config.agent.max_tool_rounds = rounds;
        }

        let provider = Arc::new(MockProvider::with_rounds(self.rounds));
        let catalog = Arc::new(self.catalog.unwrap_or_else(|| {
            MockCatalog::new().with_identity(TEST_API_KEY, MockCatalog::identity(TEST_USER_ID))
        }));

        let mut tools = ToolRegistry::new();
        register_builtins(&mut tools);
        let caps = Capabilities {
            provider: provider.clone(),
            catalog: catalog.clone(),
            tools: Arc::new(tools),
        };
        let registry = Arc::new(SessionRegistry::new(
            storage.clone(),
            caps,
            OrchestratorConfig::from_config(&config),
        ));
        let quota = Arc::new(QuotaGovernor::new(storage.clone(), config.quota.clone()));

        Ok(TestHarness {
            provider,
            catalog,
            storage,
            registry,
            quota,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete conversation stack over temp storage.
pub struct TestHarness {
    pub provider: Arc<MockProvider>,
    pub catalog: Arc<MockCatalog>,
    /// Storage in a temp directory, removed on drop.
    pub storage: Arc<dyn StorageAdapter + Send + Sync>,
    pub registry: Arc<SessionRegistry>,
    pub quota: Arc<QuotaGovernor>,
    pub config: LecternConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Opens a new chat for [`TEST_USER_ID`] and returns its id.
    pub async fn start_chat(&self) -> Result<String, LecternError> {
        let chat_id = uuid::Uuid::new_v4().to_string();
        self.registry
            .create(&chat_id, None, None, TEST_USER_ID, TEST_API_KEY)
            .await?;
        Ok(chat_id)
    }

    /// Runs one admitted turn and returns the events it produced.
    ///
    /// Fails with [`LecternError::QuotaExceeded`] without running the turn
    /// when the message is not admitted.
    pub async fn send(&self, chat_id: &str, text: &str) -> Result<Vec<ChatEvent>, LecternError> {
        let receipt = self
            .quota
            .record_usage(TEST_USER_ID, text, estimate_tokens(text))
            .await?;
        let start = self.registry.queue_length(chat_id).unwrap_or(0);
        let report = self.registry.chat(chat_id, TEST_API_KEY, text).await?;
        self.quota
            .settle_tokens(TEST_USER_ID, &receipt, i64::from(report.usage.total()))
            .await?;
        self.registry.flush(chat_id).await;

        let session = self
            .registry
            .session(chat_id)
            .ok_or_else(|| LecternError::NotFound(format!("chat {chat_id}")))?;
        Ok(session.queue().since(start))
    }
}

#[cfg(test)]
mod tests {
    use lectern_core::ChatEventKind;

    use super::*;

    #[tokio::test]
    async fn harness_runs_a_turn_end_to_end() {
        let harness = TestHarness::builder()
            .with_rounds(vec![MockRound::text("msg_1", "hello")])
            .build()
            .await
            .unwrap();
        let chat_id = harness.start_chat().await.unwrap();
        let events = harness.send(&chat_id, "hi").await.unwrap();
        assert_eq!(events.last().unwrap().kind, ChatEventKind::Done);

        let messages = harness.storage.list_messages(&chat_id).await.unwrap();
        assert_eq!(messages.len(), 2);

        let row = harness.quota.daily_limit(TEST_USER_ID).await.unwrap();
        assert_eq!(row.messages_used, 1);
        assert_eq!(row.tokens_used, 30);
    }

    #[tokio::test]
    async fn sqlite_backend_works_too() {
        let harness = TestHarness::builder().with_sqlite().build().await.unwrap();
        let chat_id = harness.start_chat().await.unwrap();
        harness.send(&chat_id, "hi").await.unwrap();
        let chat = harness.storage.get_chat(&chat_id).await.unwrap().unwrap();
        assert_eq!(chat.message_count, 2);
        assert_eq!(chat.total_tokens, 30);
    }
}
