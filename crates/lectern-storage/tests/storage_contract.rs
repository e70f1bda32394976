// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Behavior every storage backend must share, run against both.

use std::collections::BTreeMap;

use lectern_config::model::StorageConfig;
use lectern_core::{PluginAdapter, StorageAdapter};
use lectern_core::types::{Chat, DailyLimit, Message, Role, User};
use lectern_storage::{JsonFileStorage, SqliteStorage};
use tempfile::TempDir;

async fn backends() -> (TempDir, Vec<Box<dyn StorageAdapter>>) {
    let dir = tempfile::tempdir().unwrap();
    let sqlite = SqliteStorage::new(StorageConfig {
        database_path: dir.path().join("lectern.db").display().to_string(),
        ..StorageConfig::default()
    });
    let file = JsonFileStorage::new(dir.path().join("lectern.json"));
    sqlite.initialize().await.unwrap();
    file.initialize().await.unwrap();
    (dir, vec![Box::new(sqlite), Box::new(file)])
}

fn user(id: &str, created_at: &str) -> User {
    User {
        id: id.into(),
        first_name: Some("Grace".into()),
        last_name: Some("Hopper".into()),
        username: Some(id.into()),
        is_superuser: false,
        permissions: vec!["read".into()],
        catalog_permissions: BTreeMap::from([("c1".into(), "viewer".into())]),
        blocked: false,
        blocked_reason: None,
        blocked_until: None,
        created_at: created_at.into(),
        last_seen_at: created_at.into(),
    }
}

fn chat(id: &str, user_id: &str, started_at: &str) -> Chat {
    Chat {
        id: id.into(),
        user_id: user_id.into(),
        title: None,
        started_at: started_at.into(),
        message_count: 0,
        total_tokens: 0,
    }
}

fn message(id: &str, chat_id: &str, role: Role, at: &str) -> Message {
    Message {
        id: id.into(),
        chat_id: chat_id.into(),
        user_id: "u1".into(),
        role,
        content: format!("body of {id}"),
        created_at: at.into(),
        entry_id: None,
        catalog_id: None,
        provider_msg_id: None,
        entry_ids: None,
        entry_catalogs: None,
    }
}

fn limit(user_id: &str, date: &str, messages_limit: i64, tokens_limit: i64) -> DailyLimit {
    DailyLimit {
        id: format!("{user_id}-{date}"),
        user_id: user_id.into(),
        date: date.into(),
        messages_used: 0,
        messages_limit,
        tokens_used: 0,
        tokens_limit,
        created_at: "2026-01-01T00:00:00.000Z".into(),
        updated_at: "2026-01-01T00:00:00.000Z".into(),
    }
}

#[tokio::test]
async fn create_chat_twice_returns_first_record() {
    let (_dir, stores) = backends().await;
    for store in &stores {
        let first = store
            .create_chat(&chat("c1", "u1", "2026-01-01T10:00:00.000Z"))
            .await
            .unwrap();
        let mut again = chat("c1", "u1", "2026-01-02T10:00:00.000Z");
        again.title = Some("changed".into());
        let second = store.create_chat(&again).await.unwrap();

        assert_eq!(first, second, "{}", store.name());
        assert_eq!(store.list_chats_for_user("u1").await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn history_is_timestamp_ascending() {
    let (_dir, stores) = backends().await;
    for store in &stores {
        store
            .create_chat(&chat("c1", "u1", "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        store
            .append_message(&message("m3", "c1", Role::User, "2026-01-01T00:00:03.000Z"))
            .await
            .unwrap();
        store
            .append_message(&message("m1", "c1", Role::User, "2026-01-01T00:00:01.000Z"))
            .await
            .unwrap();
        store
            .append_message(&message("m2", "c1", Role::Agent, "2026-01-01T00:00:02.000Z"))
            .await
            .unwrap();

        let ids: Vec<_> = store
            .list_messages("c1")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, ["m1", "m2", "m3"], "{}", store.name());

        let chat = store.get_chat("c1").await.unwrap().unwrap();
        assert_eq!(chat.message_count, 3);
    }
}

#[tokio::test]
async fn display_metadata_round_trips() {
    let (_dir, stores) = backends().await;
    for store in &stores {
        let mut msg = message("m1", "c1", Role::Agent, "2026-01-01T00:00:01.000Z");
        msg.provider_msg_id = Some("msg_abc".into());
        msg.entry_ids = Some(vec!["a".into(), "b".into()]);
        msg.entry_catalogs = Some(BTreeMap::from([
            ("a".into(), "c1".into()),
            ("b".into(), "c2".into()),
        ]));
        store.append_message(&msg).await.unwrap();
        assert_eq!(store.list_messages("c1").await.unwrap(), vec![msg.clone()]);
    }
}

#[tokio::test]
async fn user_messages_require_ownership_and_clear_purges() {
    let (_dir, stores) = backends().await;
    for store in &stores {
        store
            .create_chat(&chat("c1", "u1", "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        store
            .append_message(&message("m1", "c1", Role::User, "2026-01-01T00:00:01.000Z"))
            .await
            .unwrap();

        assert_eq!(store.list_user_messages("c1", "u1").await.unwrap().len(), 1);
        assert!(store.list_user_messages("c1", "intruder").await.unwrap().is_empty());

        assert_eq!(store.clear_messages("c1").await.unwrap(), 1);
        assert!(store.list_messages("c1").await.unwrap().is_empty());
        assert_eq!(store.get_chat("c1").await.unwrap().unwrap().message_count, 0);
    }
}

#[tokio::test]
async fn upsert_preserves_block_and_creation() {
    let (_dir, stores) = backends().await;
    for store in &stores {
        store
            .upsert_user(&user("u1", "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        store
            .set_user_blocked("u1", true, Some("abuse".into()), None)
            .await
            .unwrap();

        let mut refreshed = user("u1", "2026-02-01T00:00:00.000Z");
        refreshed.first_name = Some("Amazing".into());
        let stored = store.upsert_user(&refreshed).await.unwrap();

        assert!(stored.blocked, "{}", store.name());
        assert_eq!(stored.blocked_reason.as_deref(), Some("abuse"));
        assert_eq!(stored.created_at, "2026-01-01T00:00:00.000Z");
        assert_eq!(stored.last_seen_at, "2026-02-01T00:00:00.000Z");
        assert_eq!(stored.first_name.as_deref(), Some("Amazing"));

        let unblocked = store
            .set_user_blocked("u1", false, None, None)
            .await
            .unwrap()
            .unwrap();
        assert!(!unblocked.blocked);
        assert!(unblocked.blocked_reason.is_none());
        assert!(store.set_user_blocked("ghost", true, None, None).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn users_paginate_in_creation_order() {
    let (_dir, stores) = backends().await;
    for store in &stores {
        for (i, id) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            store
                .upsert_user(&user(id, &format!("2026-01-0{}T00:00:00.000Z", i + 1)))
                .await
                .unwrap();
        }
        let page: Vec<_> = store
            .list_users_page(2, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(page, ["c", "d"], "{}", store.name());
        assert_eq!(store.count_users().await.unwrap(), 5);
        assert_eq!(store.list_users().await.unwrap().len(), 5);
        let beyond = store.list_users_page(u64::MAX, u64::MAX).await.unwrap();
        assert!(beyond.is_empty(), "{}", store.name());
    }
}

#[tokio::test]
async fn increment_is_conditional_on_both_limits() {
    let (_dir, stores) = backends().await;
    for store in &stores {
        let created = store
            .create_daily_limit(&limit("u1", "2026-01-01", 3, 100))
            .await
            .unwrap();
        // Second create keeps the original row.
        let again = store
            .create_daily_limit(&limit("u1", "2026-01-01", 99, 999))
            .await
            .unwrap();
        assert_eq!(created, again);

        let row = store
            .try_increment_daily_limit("u1", "2026-01-01", 2, 40)
            .await
            .unwrap()
            .unwrap();
        assert_eq!((row.messages_used, row.tokens_used), (2, 40));

        // Would exceed messages.
        assert!(store.try_increment_daily_limit("u1", "2026-01-01", 2, 1).await.unwrap().is_none());
        // Would exceed tokens.
        assert!(store.try_increment_daily_limit("u1", "2026-01-01", 1, 61).await.unwrap().is_none());
        // Exactly reaching both limits is admitted.
        let full = store
            .try_increment_daily_limit("u1", "2026-01-01", 1, 60)
            .await
            .unwrap()
            .unwrap();
        assert_eq!((full.messages_used, full.tokens_used), (3, 100));

        store.add_daily_tokens("u1", "2026-01-01", -500).await.unwrap();
        let row = store.get_daily_limit("u1", "2026-01-01").await.unwrap().unwrap();
        assert_eq!(row.tokens_used, 0);
        assert_eq!(row.messages_used, 3);

        assert!(store.try_increment_daily_limit("u1", "2030-01-01", 1, 1).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn delete_before_removes_older_days_only() {
    let (_dir, stores) = backends().await;
    for store in &stores {
        for date in ["2026-01-01", "2026-01-02", "2026-01-03"] {
            store.create_daily_limit(&limit("u1", date, 5, 10)).await.unwrap();
        }
        assert_eq!(store.delete_daily_limits_before("2026-01-03").await.unwrap(), 2);
        assert!(store.get_daily_limit("u1", "2026-01-02").await.unwrap().is_none());
        assert!(store.get_daily_limit("u1", "2026-01-03").await.unwrap().is_some());
    }
}

#[tokio::test]
async fn chat_tokens_accumulate() {
    let (_dir, stores) = backends().await;
    for store in &stores {
        store
            .create_chat(&chat("c1", "u1", "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        store.add_chat_tokens("c1", 120).await.unwrap();
        store.add_chat_tokens("c1", 30).await.unwrap();
        assert_eq!(store.get_chat("c1").await.unwrap().unwrap().total_tokens, 150);
    }
}

#[tokio::test]
async fn chats_list_most_recent_first() {
    let (_dir, stores) = backends().await;
    for store in &stores {
        store.create_chat(&chat("old", "u1", "2026-01-01T00:00:00.000Z")).await.unwrap();
        store.create_chat(&chat("new", "u1", "2026-01-05T00:00:00.000Z")).await.unwrap();
        store.create_chat(&chat("other", "u2", "2026-01-09T00:00:00.000Z")).await.unwrap();
        let ids: Vec<_> = store
            .list_chats_for_user("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, ["new", "old"]);
    }
}
