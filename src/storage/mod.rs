// ABOUTME: ChatStorage orchestrator composing the hot session tier and the cold history tier
// ABOUTME: Synchronous hot writes, queued cold writes, cache-first reads, and tier failure isolation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Chat Storage
//!
//! [`ChatStorage`] is the only type platform adapters talk to. Every tier failure
//! is caught and logged here; adapter-facing operations never return an error.
//!
//! - `save_turn` appends to the hot tier before returning and queues the cold write
//! - reads go to the hot tier first and fall back to the cold tier on a miss
//! - either tier may be absent or unreachable; the engine degrades to the other

/// Per-session write locks
pub mod locks;

pub use locks::SessionLocks;

use crate::config::StorageConfig;
use crate::errors::{AppResult, StorageError, Tier};
use crate::history::{ConversationFilter, HistoryStore, MessageQuery, SqliteHistoryStore};
use crate::models::{
    ContextMessage, Conversation, History, Message, MessageRole, NewTurn, SessionKey,
};
use crate::persistence::{ColdWrite, PersistenceQueue};
use crate::session::{SessionBackend, SessionStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OnceCell, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Reachability of one tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TierStatus {
    /// No collaborator configured or it failed to initialize
    NotConfigured,
    /// Health check passed
    Healthy {
        /// Backend name
        backend: &'static str,
    },
    /// Health check failed
    Unreachable {
        /// Backend name
        backend: &'static str,
        /// Failure description
        error: String,
    },
}

impl TierStatus {
    /// True when the tier answered its health check
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy { .. })
    }
}

/// Health of both tiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageHealth {
    /// Session cache
    pub hot: TierStatus,
    /// History store
    pub cold: TierStatus,
    /// Cold writes accepted but not yet finished
    pub pending_writes: usize,
}

impl StorageHealth {
    /// True when at least one tier can serve conversation context
    #[must_use]
    pub const fn is_serving(&self) -> bool {
        self.hot.is_healthy() || self.cold.is_healthy()
    }
}

/// Two-tier conversation storage
pub struct ChatStorage {
    config: StorageConfig,
    session_store: RwLock<Option<Arc<dyn SessionStore>>>,
    history_store: RwLock<Option<Arc<dyn HistoryStore>>>,
    writer: RwLock<Option<PersistenceQueue>>,
    locks: SessionLocks,
    ready: OnceCell<()>,
    last_connect: Mutex<Instant>,
    closed: AtomicBool,
}

impl ChatStorage {
    /// Storage that builds its collaborators from `config` on first use
    #[must_use]
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            session_store: RwLock::new(None),
            history_store: RwLock::new(None),
            writer: RwLock::new(None),
            locks: SessionLocks::new(),
            ready: OnceCell::new(),
            last_connect: Mutex::new(Instant::now()),
            closed: AtomicBool::new(false),
        }
    }

    /// Storage configured from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if the environment holds an invalid setting
    pub fn from_env() -> AppResult<Self> {
        Ok(Self::new(StorageConfig::from_env()?))
    }

    /// Use this session store instead of building one from configuration
    #[must_use]
    pub fn with_session_store(self, store: Arc<dyn SessionStore>) -> Self {
        Self {
            session_store: RwLock::new(Some(store)),
            ..self
        }
    }

    /// Use this history store instead of building one from configuration
    #[must_use]
    pub fn with_history_store(self, store: Arc<dyn HistoryStore>) -> Self {
        Self {
            history_store: RwLock::new(Some(store)),
            ..self
        }
    }

    /// Connect missing collaborators, ensure the cold schema, and start the writer
    ///
    /// Idempotent. Never fails: a tier that cannot be built is logged and left
    /// absent, and the engine runs on the other tier. Later calls retry a
    /// missing tier at most once per `reconnect_interval`.
    pub async fn initialize(&self) {
        if self.closed.load(Ordering::SeqCst) {
            warn!("initialize called on closed chat storage");
            return;
        }
        self.ensure_ready().await;
    }

    async fn connect_tiers(&self) {
        *self.last_connect.lock().await = Instant::now();

        if self.session_store.read().await.is_none() {
            match SessionBackend::new(&self.config.session).await {
                Ok(backend) => {
                    let mut slot = self.session_store.write().await;
                    if slot.is_none() && !self.closed.load(Ordering::SeqCst) {
                        *slot = Some(Arc::new(backend));
                    }
                }
                Err(e) => warn!(tier = "hot", error = %e, "Session store unavailable"),
            }
        }

        if self.history_store.read().await.is_none() && self.config.history.url.is_some() {
            match SqliteHistoryStore::connect(&self.config.history).await {
                Ok(store) => {
                    let mut slot = self.history_store.write().await;
                    if slot.is_none() && !self.closed.load(Ordering::SeqCst) {
                        *slot = Some(Arc::new(store));
                    }
                }
                Err(e) => warn!(tier = "cold", error = %e, "History store unavailable"),
            }
        }

        let history = self.history_store.read().await.clone();
        if let Some(history) = history {
            if self.writer.read().await.is_none() {
                if let Err(e) = history.ensure_schema().await {
                    warn!(tier = "cold", error = %e, "Failed to ensure history schema");
                }
                let mut writer = self.writer.write().await;
                if writer.is_none() && !self.closed.load(Ordering::SeqCst) {
                    *writer = Some(PersistenceQueue::start(history, &self.config.persistence));
                }
            }
        }

        let hot = self.session_store.read().await.as_ref().map(|s| s.backend_name());
        let cold = self.history_store.read().await.as_ref().map(|s| s.backend_name());
        info!(
            hot = hot.unwrap_or("none"),
            cold = cold.unwrap_or("none"),
            "Chat storage tiers connected"
        );
    }

    /// True when every configured tier has a live collaborator
    async fn tiers_complete(&self) -> bool {
        let hot = self.session_store.read().await.is_some();
        let cold_wanted =
            self.config.history.url.is_some() || self.history_store.read().await.is_some();
        hot && (!cold_wanted || self.writer.read().await.is_some())
    }

    async fn ensure_ready(&self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        self.ready.get_or_init(|| self.connect_tiers()).await;
        if self.tiers_complete().await {
            return;
        }

        {
            // Another caller is already retrying
            let Ok(mut last) = self.last_connect.try_lock() else {
                return;
            };
            if last.elapsed() < self.config.reconnect_interval() {
                return;
            }
            *last = Instant::now();
        }
        debug!("Retrying unavailable storage tiers");
        self.connect_tiers().await;
    }

    async fn hot(&self) -> Option<Arc<dyn SessionStore>> {
        self.ensure_ready().await;
        self.session_store.read().await.clone()
    }

    async fn cold(&self) -> Option<Arc<dyn HistoryStore>> {
        self.ensure_ready().await;
        self.history_store.read().await.clone()
    }

    /// Record one turn and return its id
    ///
    /// The hot-tier append completes before this returns, so an immediate
    /// follow-up read sees the turn. The cold write is queued and its outcome is
    /// never reported here. With both tiers down this only mints a turn id.
    pub async fn save_turn(&self, turn: NewTurn) -> String {
        let turn_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let key = session_key(&turn.user_id, &turn.session_id, Some(&turn.agent_id));

        if let Some(hot) = self.hot().await {
            let _guard = self.locks.acquire(&key).await;
            if let Err(e) = hot.append_turn(&key, &turn.to_turn(&turn_id, now)).await {
                warn!(
                    tier = "hot",
                    backend = hot.backend_name(),
                    session.key = %key,
                    turn.id = %turn_id,
                    error = %e,
                    "Hot-tier append failed"
                );
            }
        }

        match self.writer.read().await.as_ref() {
            Some(writer) => writer.enqueue(ColdWrite {
                turn_id: turn_id.clone(),
                messages: turn.to_messages(&turn_id, now).to_vec(),
                update: turn.to_conversation_update(now),
            }),
            None => debug!(turn.id = %turn_id, "No cold tier, turn kept in hot tier only"),
        }

        turn_id
    }

    /// Recent messages of a session, oldest first
    ///
    /// Hot hit: the last `limit` turns flattened to `2 * limit` messages.
    /// Otherwise: the most recent `2 * limit` cold-tier messages.
    pub async fn load_conversation(
        &self,
        user_id: &str,
        session_id: &str,
        agent_id: Option<&str>,
        limit: usize,
    ) -> Vec<Message> {
        let key = session_key(user_id, session_id, agent_id);

        if let Some(hot) = self.hot().await {
            match hot.get(&key).await {
                Ok(Some(history)) if !history.is_empty() => {
                    return flatten_turns(&history, agent_id, limit);
                }
                Ok(_) => debug!(session.key = %key, "Hot-tier miss"),
                Err(e) => warn!(
                    tier = "hot",
                    session.key = %key,
                    error = %e,
                    "Hot-tier read failed, falling back to history"
                ),
            }
        }

        if let Some(cold) = self.cold().await {
            let query = MessageQuery {
                user_id: user_id.to_owned(),
                session_id: session_id.to_owned(),
                agent_id: agent_id.map(ToOwned::to_owned),
                limit: limit.saturating_mul(2),
            };
            match cold.recent_messages(&query).await {
                Ok(messages) => return messages,
                Err(e) => warn!(
                    tier = "cold",
                    session.key = %key,
                    error = %e,
                    "History read failed"
                ),
            }
        }

        Vec::new()
    }

    /// Role/content context for the next LLM call, oldest first
    ///
    /// Returns at most `2 * max_turns` messages; `None` uses the configured default.
    /// `model_hint` is only recorded in logs.
    pub async fn get_context_for_agent(
        &self,
        user_id: &str,
        session_id: &str,
        agent_id: Option<&str>,
        max_turns: Option<usize>,
        model_hint: Option<&str>,
    ) -> Vec<ContextMessage> {
        let max_turns = max_turns.unwrap_or(self.config.default_context_turns);
        let messages = self
            .load_conversation(user_id, session_id, agent_id, max_turns)
            .await;

        let keep = max_turns.saturating_mul(2);
        let skip = messages.len().saturating_sub(keep);
        let context: Vec<ContextMessage> = messages
            .into_iter()
            .skip(skip)
            .map(ContextMessage::from)
            .collect();

        debug!(
            user.id = %user_id,
            session.id = %session_id,
            agent.id = agent_id.unwrap_or_default(),
            model = model_hint.unwrap_or_default(),
            messages = context.len(),
            "Built agent context"
        );
        context
    }

    /// Delete a session from both tiers; true if either tier removed something
    ///
    /// Queued cold writes of this session are drained first so they cannot
    /// recreate it. Writes of other sessions are not waited for.
    pub async fn delete_conversation(
        &self,
        user_id: &str,
        session_id: &str,
        agent_id: Option<&str>,
    ) -> bool {
        let key = session_key(user_id, session_id, agent_id);
        let mut deleted = false;

        if let Some(hot) = self.hot().await {
            let guard = self.locks.acquire(&key).await;
            match hot.delete(&key).await {
                Ok(removed) => deleted |= removed,
                Err(e) => warn!(tier = "hot", session.key = %key, error = %e, "Hot-tier delete failed"),
            }
            drop(guard);
        }

        if let Some(cold) = self.cold().await {
            self.flush_session_writes(user_id, session_id, agent_id).await;
            match cold.delete_conversation(user_id, session_id, agent_id).await {
                Ok(removed) => deleted |= removed,
                Err(e) => warn!(tier = "cold", session.key = %key, error = %e, "History delete failed"),
            }
        }

        info!(session.key = %key, deleted, "Conversation deleted");
        deleted
    }

    /// Drop the turns of a hot-tier session, keeping the History record
    pub async fn clear_session(
        &self,
        user_id: &str,
        session_id: &str,
        agent_id: Option<&str>,
    ) -> bool {
        let key = session_key(user_id, session_id, agent_id);
        let Some(hot) = self.hot().await else {
            return false;
        };
        let _guard = self.locks.acquire(&key).await;
        hot.clear(&key).await.unwrap_or_else(|e| {
            warn!(tier = "hot", session.key = %key, error = %e, "Hot-tier clear failed");
            false
        })
    }

    /// Session ids the hot tier knows for a user under one agent
    pub async fn list_active_sessions(&self, user_id: &str, agent_id: Option<&str>) -> Vec<String> {
        let Some(hot) = self.hot().await else {
            return Vec::new();
        };
        hot.list_sessions(user_id, normalize_tenant(agent_id))
            .await
            .unwrap_or_else(|e| {
                warn!(tier = "hot", user.id = %user_id, error = %e, "Hot-tier session listing failed");
                Vec::new()
            })
    }

    /// Conversations of a user from the cold tier, most recently updated first
    pub async fn list_user_conversations(
        &self,
        user_id: &str,
        agent_id: Option<&str>,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> Vec<Conversation> {
        let Some(cold) = self.cold().await else {
            return Vec::new();
        };
        let filter = ConversationFilter {
            user_id: user_id.to_owned(),
            agent_id: agent_id.map(ToOwned::to_owned),
            limit,
            since,
        };
        cold.list_conversations(&filter).await.unwrap_or_else(|e| {
            warn!(tier = "cold", user.id = %user_id, error = %e, "Conversation listing failed");
            Vec::new()
        })
    }

    /// Most recently updated Conversation with this session id
    pub async fn get_conversation_metadata(&self, session_id: &str) -> Option<Conversation> {
        let cold = self.cold().await?;
        cold.get_conversation(session_id).await.unwrap_or_else(|e| {
            warn!(tier = "cold", session.id = %session_id, error = %e, "Conversation lookup failed");
            None
        })
    }

    /// Recompute stored message counts for a session from its message rows
    ///
    /// # Errors
    ///
    /// Returns an error if the cold tier is absent or the update fails
    pub async fn reconcile_message_count(
        &self,
        user_id: &str,
        session_id: &str,
        agent_id: Option<&str>,
    ) -> AppResult<u64> {
        let cold = self
            .cold()
            .await
            .ok_or(StorageError::Unavailable { tier: Tier::Cold })?;
        self.flush_session_writes(user_id, session_id, agent_id).await;
        let updated = cold
            .reconcile_message_count(user_id, session_id, agent_id)
            .await?;
        info!(user.id = %user_id, session.id = %session_id, updated, "Reconciled message counts");
        Ok(updated)
    }

    /// Wait until queued cold writes have finished
    pub async fn flush_pending_writes(&self) {
        if let Some(writer) = self.writer.read().await.as_ref() {
            writer.flush().await;
        }
    }

    async fn flush_session_writes(
        &self,
        user_id: &str,
        session_id: &str,
        agent_id: Option<&str>,
    ) {
        if let Some(writer) = self.writer.read().await.as_ref() {
            writer.flush_session(user_id, session_id, agent_id).await;
        }
    }

    /// Check both tiers
    pub async fn health(&self) -> StorageHealth {
        let hot = match self.hot().await {
            None => TierStatus::NotConfigured,
            Some(store) => match store.health_check().await {
                Ok(()) => TierStatus::Healthy {
                    backend: store.backend_name(),
                },
                Err(e) => TierStatus::Unreachable {
                    backend: store.backend_name(),
                    error: e.to_string(),
                },
            },
        };
        let cold = match self.cold().await {
            None => TierStatus::NotConfigured,
            Some(store) => match store.health_check().await {
                Ok(()) => TierStatus::Healthy {
                    backend: store.backend_name(),
                },
                Err(e) => TierStatus::Unreachable {
                    backend: store.backend_name(),
                    error: e.to_string(),
                },
            },
        };
        let pending_writes = self
            .writer
            .read()
            .await
            .as_ref()
            .map_or(0, |writer| writer.stats().pending);

        StorageHealth {
            hot,
            cold,
            pending_writes,
        }
    }

    /// Drain queued writes and release both tiers
    ///
    /// Idempotent, and safe on storage that was never or only partly initialized.
    /// A closed storage answers every read with empty results.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let writer = self.writer.write().await.take();
        if let Some(writer) = writer {
            writer.shutdown().await;
        }
        let history = self.history_store.write().await.take();
        if let Some(history) = history {
            history.close().await;
        }
        self.session_store.write().await.take();

        info!("Chat storage closed");
    }
}

/// Absent and empty agent ids both mean the default tenant
fn normalize_tenant(agent_id: Option<&str>) -> Option<&str> {
    agent_id.filter(|agent| !agent.is_empty())
}

fn session_key(user_id: &str, session_id: &str, agent_id: Option<&str>) -> SessionKey {
    SessionKey::new(user_id, session_id, normalize_tenant(agent_id))
}

/// Expand the last `limit` turns into user/assistant message pairs
fn flatten_turns(history: &History, agent_id: Option<&str>, limit: usize) -> Vec<Message> {
    let agent_id = agent_id.unwrap_or_default();
    history
        .recent_turns(limit)
        .iter()
        .flat_map(|turn| {
            let mut user = Message::plain(
                Message::id_for(&turn.turn_id, MessageRole::User),
                MessageRole::User,
                turn.user_message.clone(),
                turn.timestamp,
            )
            .in_session(&history.user_id, &history.session_id, agent_id);
            user.metadata.clone_from(&turn.metadata);

            let mut assistant = Message::plain(
                Message::id_for(&turn.turn_id, MessageRole::Assistant),
                MessageRole::Assistant,
                turn.assistant_response.clone(),
                turn.timestamp,
            )
            .in_session(&history.user_id, &history.session_id, agent_id);
            assistant.metadata.clone_from(&turn.metadata);
            if !turn.tools_used.is_empty() {
                assistant.metadata.insert(
                    "tools_used".to_owned(),
                    Value::from(turn.tools_used.clone()),
                );
            }

            [user, assistant]
        })
        .collect()
}
