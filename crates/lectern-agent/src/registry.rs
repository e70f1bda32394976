// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Owns every live conversation.
//!
//! The registry maps chat ids to [`LiveSession`]s. Create, resume, remove
//! and terminate take a per-chat lock so they are atomic relative to each
//! other for one chat id. Turns themselves are serialized by the session's
//! orchestrator mutex and never hold the per-chat lock, so a user can be
//! terminated while one of their turns is still streaming.
//!
//! Message logging runs on one writer task per session. Writes keep event
//! order, are never awaited by the conversation, and failures are only
//! logged and counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use lectern_core::types::{Chat, Message, Role, TokenUsage, timestamp_now};
use lectern_core::{
    ChatEvent, ChatEventKind, ConversationListener, Focus, LecternError, StorageAdapter,
};
use tokio::sync::{OwnedMutexGuard, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::orchestrator::{Capabilities, ConversationOrchestrator, OrchestratorConfig, TurnOutcome};
use crate::queue::EventQueue;
use crate::replay::{Replay, display_note, replay};

enum PersistOp {
    Append(Message),
    Tokens { chat_id: String, tokens: i64 },
    Flush(oneshot::Sender<()>),
}

fn spawn_writer(
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    failures: Arc<AtomicU64>,
    chat_id: String,
) -> mpsc::UnboundedSender<PersistOp> {
    let (tx, mut rx) = mpsc::unbounded_channel::<PersistOp>();
    tokio::spawn(async move {
        while let Some(op) = rx.recv().await {
            match op {
                PersistOp::Append(message) => {
                    if let Err(e) = storage.append_message(&message).await {
                        failures.fetch_add(1, Ordering::Relaxed);
                        error!(chat_id = %chat_id, message_id = %message.id, error = %e, "failed to persist message");
                    }
                }
                PersistOp::Tokens { chat_id, tokens } => {
                    if let Err(e) = storage.add_chat_tokens(&chat_id, tokens).await {
                        failures.fetch_add(1, Ordering::Relaxed);
                        warn!(chat_id = %chat_id, tokens, error = %e, "failed to record chat tokens");
                    }
                }
                PersistOp::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!(chat_id = %chat_id, "message writer stopped");
    });
    tx
}

fn new_message(chat_id: &str, user_id: &str, role: Role, content: String, focus: &Focus) -> Message {
    Message {
        id: uuid::Uuid::new_v4().to_string(),
        chat_id: chat_id.to_string(),
        user_id: user_id.to_string(),
        role,
        content,
        created_at: timestamp_now(),
        entry_id: focus.entry_id.clone(),
        catalog_id: focus.catalog_id.clone(),
        provider_msg_id: None,
        entry_ids: None,
        entry_catalogs: None,
    }
}

/// Queues every event for the transport and logs agent output.
struct SessionListener {
    chat_id: String,
    user_id: String,
    queue: Arc<EventQueue>,
    focus: Arc<Mutex<Focus>>,
    writer: mpsc::UnboundedSender<PersistOp>,
}

impl SessionListener {
    fn to_message(&self, event: &ChatEvent) -> Option<Message> {
        let focus = self.focus.lock().map(|f| f.clone()).unwrap_or_default();
        match event.kind {
            ChatEventKind::Message => {
                let text = event.data.as_str().unwrap_or_default().to_string();
                let mut message = new_message(&self.chat_id, &self.user_id, Role::Agent, text, &focus);
                message.provider_msg_id = event.msg_id.clone();
                Some(message)
            }
            ChatEventKind::Entries => {
                let ids = event.entry_ids();
                let catalogs = event.catalog_id.clone().unwrap_or_default();
                let note = display_note(&ids, &catalogs);
                let mut message = new_message(&self.chat_id, &self.user_id, Role::Agent, note, &focus);
                message.entry_ids = Some(ids);
                message.entry_catalogs = Some(catalogs);
                Some(message)
            }
            _ => None,
        }
    }
}

impl ConversationListener for SessionListener {
    fn on_event(&self, event: ChatEvent) {
        let message = self.to_message(&event);
        if !self.queue.push(event) {
            debug!(chat_id = %self.chat_id, "event for closed session dropped");
            return;
        }
        if let Some(message) = message
            && self.writer.send(PersistOp::Append(message)).is_err()
        {
            warn!(chat_id = %self.chat_id, "message writer gone; agent output not logged");
        }
    }
}

/// In-memory state of one conversation.
pub struct LiveSession {
    chat_id: String,
    user_id: String,
    api_key: String,
    queue: Arc<EventQueue>,
    focus: Arc<Mutex<Focus>>,
    orchestrator: tokio::sync::Mutex<ConversationOrchestrator>,
    writer: mpsc::UnboundedSender<PersistOp>,
}

impl LiveSession {
    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Exact comparison against the key the session was opened with.
    pub fn key_matches(&self, api_key: &str) -> bool {
        self.api_key == api_key
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn focus(&self) -> Focus {
        self.focus.lock().map(|f| f.clone()).unwrap_or_default()
    }

    fn persist(&self, op: PersistOp) {
        if self.writer.send(op).is_err() {
            warn!(chat_id = %self.chat_id, "message writer gone");
        }
    }

    /// Resolves once every write queued so far has been attempted.
    async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.writer.send(PersistOp::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

/// A turn that ran: its usage is known even when it failed.
#[derive(Debug)]
pub struct TurnReport {
    pub usage: TokenUsage,
    pub outcome: Result<TurnOutcome, LecternError>,
}

/// Serializes registry operations on one chat. Dropping it releases the
/// lock and forgets the map entry once nobody else holds or awaits it.
struct ChatLock<'a> {
    locks: &'a DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    chat_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ChatLock<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.chat_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

pub struct SessionRegistry {
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    caps: Capabilities,
    config: OrchestratorConfig,
    sessions: DashMap<String, Arc<LiveSession>>,
    locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    persistence_failures: Arc<AtomicU64>,
}

impl SessionRegistry {
    pub fn new(
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        caps: Capabilities,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            storage,
            caps,
            config,
            sessions: DashMap::new(),
            locks: DashMap::new(),
            persistence_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    async fn lock_chat(&self, chat_id: &str) -> ChatLock<'_> {
        let lock = self
            .locks
            .entry(chat_id.to_string())
            .or_default()
            .value()
            .clone();
        ChatLock {
            locks: &self.locks,
            chat_id: chat_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Per-chat locks currently held or awaited.
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    /// Opens a fresh conversation. Persisting the chat is idempotent; a
    /// live session already registered under `chat_id` is replaced.
    pub async fn create(
        &self,
        chat_id: &str,
        focus_entry_id: Option<String>,
        focus_catalog_id: Option<String>,
        user_id: &str,
        api_key: &str,
    ) -> Result<Arc<LiveSession>, LecternError> {
        let _guard = self.lock_chat(chat_id).await;
        let chat = self
            .storage
            .create_chat(&Chat {
                id: chat_id.to_string(),
                user_id: user_id.to_string(),
                title: None,
                started_at: timestamp_now(),
                message_count: 0,
                total_tokens: 0,
            })
            .await?;
        if chat.user_id != user_id {
            return Err(LecternError::NotFound(format!("chat {chat_id}")));
        }

        let focus = Focus::new(focus_entry_id, focus_catalog_id);
        let session = self.build_session(chat_id, user_id, api_key, focus, Replay::default());
        if let Some(previous) = self.sessions.insert(chat_id.to_string(), session.clone()) {
            previous.queue.close();
        }
        info!(chat_id, user_id, "session created");
        Ok(session)
    }

    /// Returns the live session for `chat_id`, rebuilding it from the
    /// message log when none is registered.
    pub async fn resume(
        &self,
        chat_id: &str,
        focus_entry_id: Option<String>,
        focus_catalog_id: Option<String>,
        user_id: &str,
        api_key: &str,
    ) -> Result<Arc<LiveSession>, LecternError> {
        let _guard = self.lock_chat(chat_id).await;
        if let Some(existing) = self.session(chat_id) {
            if existing.user_id != user_id {
                return Err(LecternError::NotFound(format!("chat {chat_id}")));
            }
            return Ok(existing);
        }

        let chat = self
            .storage
            .get_chat(chat_id)
            .await?
            .filter(|chat| chat.user_id == user_id)
            .ok_or_else(|| LecternError::NotFound(format!("chat {chat_id}")))?;
        self.storage.create_chat(&chat).await?;

        let messages = self.storage.list_user_messages(chat_id, user_id).await?;
        let replayed = replay(&messages);
        if let Err(e) = replayed.transcript.validate() {
            warn!(chat_id, error = %e, "replayed transcript is not well-formed");
        }
        let turns = replayed.transcript.len();
        let displays = replayed.display_events.len();

        let focus = Focus::new(focus_entry_id, focus_catalog_id);
        let session = self.build_session(chat_id, user_id, api_key, focus, replayed);
        self.sessions.insert(chat_id.to_string(), session.clone());
        info!(chat_id, user_id, messages = messages.len(), turns, displays, "session resumed");
        Ok(session)
    }

    fn build_session(
        &self,
        chat_id: &str,
        user_id: &str,
        api_key: &str,
        focus: Focus,
        replayed: Replay,
    ) -> Arc<LiveSession> {
        let queue = Arc::new(EventQueue::new());
        for event in replayed.display_events {
            queue.push(event);
        }
        let shared_focus = Arc::new(Mutex::new(focus.clone()));
        let writer = spawn_writer(
            self.storage.clone(),
            self.persistence_failures.clone(),
            chat_id.to_string(),
        );
        let listener = Arc::new(SessionListener {
            chat_id: chat_id.to_string(),
            user_id: user_id.to_string(),
            queue: queue.clone(),
            focus: shared_focus.clone(),
            writer: writer.clone(),
        });
        let orchestrator =
            ConversationOrchestrator::new(self.caps.clone(), self.config.clone(), api_key, listener)
                .with_transcript(replayed.transcript)
                .with_focus(focus);

        Arc::new(LiveSession {
            chat_id: chat_id.to_string(),
            user_id: user_id.to_string(),
            api_key: api_key.to_string(),
            queue,
            focus: shared_focus,
            orchestrator: tokio::sync::Mutex::new(orchestrator),
            writer,
        })
    }

    /// Drops the live session and purges the chat's message log. The chat
    /// record itself stays.
    pub async fn remove(&self, chat_id: &str) -> Result<u64, LecternError> {
        let _guard = self.lock_chat(chat_id).await;
        if let Some((_, session)) = self.sessions.remove(chat_id) {
            session.queue.close();
            session.flush().await;
        }
        let cleared = self.storage.clear_messages(chat_id).await?;
        info!(chat_id, cleared, "chat history removed");
        Ok(cleared)
    }

    /// Drops every live session owned by `user_id`. Turns still running on
    /// them finish against closed queues, which discard their events.
    pub async fn terminate_for_user(&self, user_id: &str) -> usize {
        let owned: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.key().clone())
            .collect();

        let mut terminated = 0;
        for chat_id in owned {
            let _guard = self.lock_chat(&chat_id).await;
            if let Some((_, session)) = self
                .sessions
                .remove_if(&chat_id, |_, session| session.user_id == user_id)
            {
                session.queue.close();
                terminated += 1;
            }
        }
        if terminated > 0 {
            info!(user_id, terminated, "sessions terminated");
        }
        terminated
    }

    /// Runs one user turn on a live session.
    ///
    /// Fails without running when the chat has no live session or the key
    /// is not the one that opened it.
    pub async fn chat(
        &self,
        chat_id: &str,
        api_key: &str,
        text: &str,
    ) -> Result<TurnReport, LecternError> {
        let session = self
            .session(chat_id)
            .ok_or_else(|| LecternError::NotFound(format!("chat {chat_id}")))?;
        if !session.key_matches(api_key) {
            return Err(LecternError::Auth("API key does not match this chat".to_string()));
        }

        let mut orchestrator = session.orchestrator.lock().await;
        let user_message = new_message(
            &session.chat_id,
            &session.user_id,
            Role::User,
            text.to_string(),
            orchestrator.focus(),
        );
        // A concurrent remove() may have purged the log while we waited.
        if !session.queue.is_closed() {
            session.persist(PersistOp::Append(user_message));
        }

        let outcome = orchestrator.chat(text).await;
        let usage = orchestrator.last_turn_usage();
        drop(orchestrator);

        if usage.total() > 0 && !session.queue.is_closed() {
            session.persist(PersistOp::Tokens {
                chat_id: session.chat_id.clone(),
                tokens: i64::from(usage.total()),
            });
        }
        Ok(TurnReport { usage, outcome })
    }

    /// Points future requests of `chat_id` at another item.
    pub async fn set_focus(
        &self,
        chat_id: &str,
        entry_id: Option<String>,
        catalog_id: Option<String>,
    ) -> Result<(), LecternError> {
        let session = self
            .session(chat_id)
            .ok_or_else(|| LecternError::NotFound(format!("chat {chat_id}")))?;
        let mut orchestrator = session.orchestrator.lock().await;
        orchestrator.set_focus(entry_id, catalog_id);
        if let Ok(mut focus) = session.focus.lock() {
            *focus = orchestrator.focus().clone();
        }
        Ok(())
    }

    pub fn session(&self, chat_id: &str) -> Option<Arc<LiveSession>> {
        self.sessions.get(chat_id).map(|entry| entry.value().clone())
    }

    pub fn has_session(&self, chat_id: &str) -> bool {
        self.sessions.contains_key(chat_id)
    }

    pub fn queue_length(&self, chat_id: &str) -> Option<usize> {
        self.session(chat_id).map(|s| s.queue.len())
    }

    pub fn event_at(&self, chat_id: &str, index: usize) -> Option<ChatEvent> {
        self.session(chat_id).and_then(|s| s.queue.get(index))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Message log writes that failed since startup.
    pub fn persistence_failures(&self) -> u64 {
        self.persistence_failures.load(Ordering::Relaxed)
    }

    /// Waits until the writes queued for `chat_id` so far have landed.
    pub async fn flush(&self, chat_id: &str) {
        if let Some(session) = self.session(chat_id) {
            session.flush().await;
        }
    }

    /// Closes every session and waits for their pending writes.
    pub async fn shutdown(&self) {
        let sessions: Vec<Arc<LiveSession>> =
            self.sessions.iter().map(|e| e.value().clone()).collect();
        self.sessions.clear();
        for session in &sessions {
            session.queue.close();
            session.flush().await;
        }
        info!(count = sessions.len(), "session registry drained");
    }
}
