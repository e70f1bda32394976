// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session registry lifecycle: creation, resumption from the message log,
//! termination, and detached persistence.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lectern_agent::{Capabilities, OrchestratorConfig, SessionRegistry};
use lectern_core::traits::provider::ProviderStream;
use lectern_core::types::{
    AdapterType, Chat, DailyLimit, HealthStatus, Message, ProviderRequest, Role, TurnItem, User,
};
use lectern_core::{
    ChatEventKind, LecternError, PluginAdapter, ProviderAdapter, StorageAdapter,
};
use lectern_storage::JsonFileStorage;
use lectern_test_utils::{MockCatalog, MockProvider, MockRound};
use lectern_tools::{ToolRegistry, register_builtins};
use tokio::sync::Notify;

fn registry_with(
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    provider: Arc<dyn ProviderAdapter + Send + Sync>,
) -> SessionRegistry {
    let mut tools = ToolRegistry::new();
    register_builtins(&mut tools);
    let caps = Capabilities {
        provider,
        catalog: Arc::new(MockCatalog::new()),
        tools: Arc::new(tools),
    };
    SessionRegistry::new(storage, caps, OrchestratorConfig::default())
}

fn memory_store() -> Arc<dyn StorageAdapter + Send + Sync> {
    Arc::new(JsonFileStorage::in_memory())
}

#[tokio::test]
async fn create_twice_keeps_one_chat() {
    let storage = memory_store();
    let registry = registry_with(storage.clone(), Arc::new(MockProvider::new()));

    registry.create("chat-1", None, None, "u1", "key").await.unwrap();
    let started = storage.get_chat("chat-1").await.unwrap().unwrap().started_at;
    registry.create("chat-1", None, None, "u1", "key").await.unwrap();

    let chats = storage.list_chats_for_user("u1").await.unwrap();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].started_at, started);
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn create_for_chat_owned_by_someone_else_is_not_found() {
    let storage = memory_store();
    let registry = registry_with(storage, Arc::new(MockProvider::new()));
    registry.create("chat-1", None, None, "u1", "key").await.unwrap();
    let err = registry.create("chat-1", None, None, "u2", "other").await;
    assert!(matches!(err, Err(LecternError::NotFound(_))));
}

#[tokio::test]
async fn turn_is_logged_in_event_order() {
    let storage = memory_store();
    let provider = Arc::new(MockProvider::with_rounds(vec![
        MockRound::tool_call("call_1", "display_items", r#"{"ids":["a"],"catalogs":{"a":"c1"}}"#),
        MockRound::text("msg_2", "Here it is").usage(40, 10),
    ]));
    let registry = registry_with(storage.clone(), provider);
    registry
        .create("chat-1", Some("e1".into()), Some("c1".into()), "u1", "key")
        .await
        .unwrap();

    let report = registry.chat("chat-1", "key", "show me").await.unwrap();
    assert!(report.outcome.is_ok());
    assert_eq!(report.usage.total(), 10 + 20 + 40 + 10);
    registry.flush("chat-1").await;

    let messages = storage.list_messages("chat-1").await.unwrap();
    let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, [Role::User, Role::Agent, Role::Agent]);
    assert_eq!(messages[0].content, "show me");
    assert_eq!(messages[0].entry_id.as_deref(), Some("e1"));
    assert_eq!(messages[1].entry_ids.as_deref(), Some(&["a".to_string()][..]));
    assert_eq!(messages[2].provider_msg_id.as_deref(), Some("msg_2"));

    let chat = storage.get_chat("chat-1").await.unwrap().unwrap();
    assert_eq!(chat.message_count, 3);
    assert_eq!(chat.total_tokens, 80);
    assert_eq!(registry.persistence_failures(), 0);
}

#[tokio::test]
async fn resume_after_restart_replays_log_in_order() {
    let storage = memory_store();
    {
        let provider = Arc::new(MockProvider::with_rounds(vec![
            MockRound::text("msg_a", "first answer"),
            MockRound::tool_call("call_1", "display_items", r#"{"ids":["x"]}"#),
            MockRound::text("msg_b", "second answer"),
        ]));
        let registry = registry_with(storage.clone(), provider);
        registry.create("chat-1", None, None, "u1", "key").await.unwrap();
        registry.chat("chat-1", "key", "one").await.unwrap();
        registry.chat("chat-1", "key", "two").await.unwrap();
        registry.shutdown().await;
    }

    let provider = Arc::new(MockProvider::with_rounds(vec![MockRound::text("msg_c", "third")]));
    let registry = registry_with(storage.clone(), provider.clone());
    let session = registry
        .resume("chat-1", None, None, "u1", "key")
        .await
        .unwrap();

    // The earlier display is queued again for reconnecting clients.
    assert_eq!(session.queue().len(), 1);
    assert_eq!(
        registry.event_at("chat-1", 0).unwrap().kind,
        ChatEventKind::Entries
    );

    let persisted = storage.list_messages("chat-1").await.unwrap();
    assert_eq!(persisted.len(), 5);

    registry.chat("chat-1", "key", "three").await.unwrap();
    let input = provider.requests().await.remove(0).input;

    let replayed_roles: Vec<Role> = input[..persisted.len()]
        .iter()
        .map(|item| match item {
            TurnItem::User { .. } => Role::User,
            _ => Role::Agent,
        })
        .collect();
    let persisted_roles: Vec<Role> = persisted.iter().map(|m| m.role).collect();
    assert_eq!(replayed_roles, persisted_roles);

    assert_eq!(input[0], TurnItem::User { text: "one".into() });
    assert!(matches!(&input[1], TurnItem::Assistant { id, text } if id == "msg_a" && text == "first answer"));
    assert_eq!(input[2], TurnItem::User { text: "two".into() });
    assert!(matches!(&input[3], TurnItem::Assistant { text, .. } if text.contains("[Displayed items: x]")));
    assert!(matches!(&input[4], TurnItem::Assistant { id, .. } if id == "msg_b"));
    assert_eq!(input.last(), Some(&TurnItem::User { text: "three".into() }));
}

#[tokio::test]
async fn resume_is_idempotent_for_live_sessions() {
    let registry = registry_with(memory_store(), Arc::new(MockProvider::new()));
    let created = registry.create("chat-1", None, None, "u1", "key").await.unwrap();
    let resumed = registry.resume("chat-1", None, None, "u1", "key").await.unwrap();
    assert!(Arc::ptr_eq(&created, &resumed));
}

#[tokio::test]
async fn resume_unknown_or_foreign_chat_is_not_found() {
    let storage = memory_store();
    let registry = registry_with(storage.clone(), Arc::new(MockProvider::new()));
    assert!(matches!(
        registry.resume("missing", None, None, "u1", "key").await,
        Err(LecternError::NotFound(_))
    ));

    registry.create("chat-1", None, None, "u1", "key").await.unwrap();
    registry.shutdown().await;
    assert!(matches!(
        registry.resume("chat-1", None, None, "u2", "key2").await,
        Err(LecternError::NotFound(_))
    ));
}

#[tokio::test]
async fn chat_with_other_key_is_rejected() {
    let registry = registry_with(memory_store(), Arc::new(MockProvider::new()));
    registry.create("chat-1", None, None, "u1", "key").await.unwrap();
    assert!(matches!(
        registry.chat("chat-1", "another-key", "hi").await,
        Err(LecternError::Auth(_))
    ));
    assert!(matches!(
        registry.chat("chat-2", "key", "hi").await,
        Err(LecternError::NotFound(_))
    ));
}

#[tokio::test]
async fn remove_purges_session_and_log() {
    let storage = memory_store();
    let registry = registry_with(storage.clone(), Arc::new(MockProvider::new()));
    registry.create("chat-1", None, None, "u1", "key").await.unwrap();
    registry.chat("chat-1", "key", "hi").await.unwrap();

    let cleared = registry.remove("chat-1").await.unwrap();
    assert_eq!(cleared, 2);
    assert!(!registry.has_session("chat-1"));
    assert!(storage.list_messages("chat-1").await.unwrap().is_empty());
    assert!(storage.get_chat("chat-1").await.unwrap().is_some());
}

/// Provider that parks each request until released.
struct GatedProvider {
    inner: MockProvider,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl PluginAdapter for GatedProvider {
    fn name(&self) -> &str {
        "gated"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, LecternError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LecternError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for GatedProvider {
    async fn stream(&self, request: ProviderRequest) -> Result<ProviderStream, LecternError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.stream(request).await
    }
}

#[tokio::test]
async fn blocking_user_terminates_all_sessions_and_silences_inflight_turns() {
    let storage = memory_store();
    let provider = Arc::new(GatedProvider {
        inner: MockProvider::new(),
        entered: Notify::new(),
        release: Notify::new(),
    });
    let registry = Arc::new(registry_with(storage.clone(), provider.clone()));
    registry.create("chat-1", None, None, "u1", "key").await.unwrap();
    registry.create("chat-2", None, None, "u1", "key").await.unwrap();
    registry.create("chat-3", None, None, "u2", "key2").await.unwrap();
    let queue = registry.session("chat-1").unwrap().queue().clone();

    let inflight = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.chat("chat-1", "key", "hello").await })
    };
    provider.entered.notified().await;

    assert_eq!(registry.terminate_for_user("u1").await, 2);
    assert!(!registry.has_session("chat-1"));
    assert!(!registry.has_session("chat-2"));
    assert!(registry.has_session("chat-3"));

    provider.release.notify_one();
    let report = tokio::time::timeout(Duration::from_secs(5), inflight)
        .await
        .expect("in-flight turn should finish")
        .expect("turn task should not panic")
        .expect("turn was admitted before termination");
    assert!(report.outcome.is_ok());
    assert!(queue.is_empty());
    assert_eq!(registry.queue_length("chat-1"), None);
    assert!(registry.event_at("chat-1", 0).is_none());
}

#[tokio::test]
async fn turn_queued_behind_a_remove_leaves_the_log_empty() {
    let storage = memory_store();
    let provider = Arc::new(GatedProvider {
        inner: MockProvider::new(),
        entered: Notify::new(),
        release: Notify::new(),
    });
    let registry = Arc::new(registry_with(storage.clone(), provider.clone()));
    registry.create("chat-1", None, None, "u1", "key").await.unwrap();

    let first = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.chat("chat-1", "key", "first").await })
    };
    provider.entered.notified().await;
    let second = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.chat("chat-1", "key", "second").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    registry.remove("chat-1").await.unwrap();
    provider.release.notify_one();
    first.await.unwrap().unwrap();

    provider.entered.notified().await;
    provider.release.notify_one();
    second.await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(storage.list_messages("chat-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn chat_locks_are_released_after_each_operation() {
    let storage = memory_store();
    let registry = registry_with(storage, Arc::new(MockProvider::new()));
    for i in 0..100 {
        let chat_id = format!("chat-{i}");
        registry.create(&chat_id, None, None, "u1", "key").await.unwrap();
        registry.remove(&chat_id).await.unwrap();
    }
    registry.create("chat-a", None, None, "u1", "key").await.unwrap();
    registry.resume("chat-a", None, None, "u1", "key").await.unwrap();
    registry.terminate_for_user("u1").await;

    assert!(registry.is_empty());
    assert_eq!(registry.lock_count(), 0);
}

/// Storage whose message writes always fail.
struct BrokenLog(JsonFileStorage);

#[async_trait]
impl PluginAdapter for BrokenLog {
    fn name(&self) -> &str {
        "broken-log"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, LecternError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), LecternError> {
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for BrokenLog {
    async fn initialize(&self) -> Result<(), LecternError> {
        self.0.initialize().await
    }
    async fn close(&self) -> Result<(), LecternError> {
        self.0.close().await
    }
    async fn upsert_user(&self, user: &User) -> Result<User, LecternError> {
        self.0.upsert_user(user).await
    }
    async fn get_user(&self, id: &str) -> Result<Option<User>, LecternError> {
        self.0.get_user(id).await
    }
    async fn list_users(&self) -> Result<Vec<User>, LecternError> {
        self.0.list_users().await
    }
    async fn list_users_page(&self, offset: u64, limit: u64) -> Result<Vec<User>, LecternError> {
        self.0.list_users_page(offset, limit).await
    }
    async fn count_users(&self) -> Result<u64, LecternError> {
        self.0.count_users().await
    }
    async fn set_user_blocked(
        &self,
        id: &str,
        blocked: bool,
        reason: Option<String>,
        until: Option<String>,
    ) -> Result<Option<User>, LecternError> {
        self.0.set_user_blocked(id, blocked, reason, until).await
    }
    async fn create_chat(&self, chat: &Chat) -> Result<Chat, LecternError> {
        self.0.create_chat(chat).await
    }
    async fn get_chat(&self, id: &str) -> Result<Option<Chat>, LecternError> {
        self.0.get_chat(id).await
    }
    async fn list_chats_for_user(&self, user_id: &str) -> Result<Vec<Chat>, LecternError> {
        self.0.list_chats_for_user(user_id).await
    }
    async fn add_chat_tokens(&self, chat_id: &str, tokens: i64) -> Result<(), LecternError> {
        self.0.add_chat_tokens(chat_id, tokens).await
    }
    async fn append_message(&self, _message: &Message) -> Result<(), LecternError> {
        Err(LecternError::storage(std::io::Error::other("disk full")))
    }
    async fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>, LecternError> {
        self.0.list_messages(chat_id).await
    }
    async fn list_user_messages(
        &self,
        chat_id: &str,
        user_id: &str,
    ) -> Result<Vec<Message>, LecternError> {
        self.0.list_user_messages(chat_id, user_id).await
    }
    async fn clear_messages(&self, chat_id: &str) -> Result<u64, LecternError> {
        self.0.clear_messages(chat_id).await
    }
    async fn get_daily_limit(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<Option<DailyLimit>, LecternError> {
        self.0.get_daily_limit(user_id, date).await
    }
    async fn create_daily_limit(&self, limit: &DailyLimit) -> Result<DailyLimit, LecternError> {
        self.0.create_daily_limit(limit).await
    }
    async fn try_increment_daily_limit(
        &self,
        user_id: &str,
        date: &str,
        messages: i64,
        tokens: i64,
    ) -> Result<Option<DailyLimit>, LecternError> {
        self.0
            .try_increment_daily_limit(user_id, date, messages, tokens)
            .await
    }
    async fn add_daily_tokens(
        &self,
        user_id: &str,
        date: &str,
        tokens: i64,
    ) -> Result<(), LecternError> {
        self.0.add_daily_tokens(user_id, date, tokens).await
    }
    async fn delete_daily_limits_before(&self, date: &str) -> Result<u64, LecternError> {
        self.0.delete_daily_limits_before(date).await
    }
}

#[tokio::test]
async fn persistence_failures_are_counted_not_surfaced() {
    let storage: Arc<dyn StorageAdapter + Send + Sync> =
        Arc::new(BrokenLog(JsonFileStorage::in_memory()));
    let registry = registry_with(storage, Arc::new(MockProvider::new()));
    registry.create("chat-1", None, None, "u1", "key").await.unwrap();

    let report = registry.chat("chat-1", "key", "hi").await.unwrap();
    assert!(report.outcome.is_ok());
    assert_eq!(
        registry.event_at("chat-1", registry.queue_length("chat-1").unwrap() - 1)
            .unwrap()
            .kind,
        ChatEventKind::Done
    );
    registry.flush("chat-1").await;
    assert_eq!(registry.persistence_failures(), 2);
}
