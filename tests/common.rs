// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Quiet logging, storage builders, turn fixtures, and failing tier doubles
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
//! Shared test utilities for `chatstore`

use anyhow::Result;
use async_trait::async_trait;
use chatstore::config::{HistoryStoreConfig, PersistenceConfig, StorageConfig};
use chatstore::errors::{StorageError, StorageResult, Tier};
use chatstore::history::{
    ConversationFilter, HistoryStore, MessageQuery, SqliteHistoryStore,
};
use chatstore::models::{
    Conversation, ConversationUpdate, History, Message, Metadata, NewTurn, SessionKey, Turn,
};
use chatstore::session::{EphemeralSessionStore, SessionStore};
use chatstore::storage::ChatStorage;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;
use uuid::Uuid;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Persistence settings that retry quickly
pub fn fast_persistence() -> PersistenceConfig {
    PersistenceConfig {
        workers: 2,
        queue_capacity: 64,
        max_deferred: 64,
        max_retries: 2,
        retry_delay_ms: 1,
        max_retry_delay_ms: 5,
    }
}

/// Config with no collaborators to build; stores are injected by the caller
pub fn injected_config() -> StorageConfig {
    StorageConfig {
        history: HistoryStoreConfig::default(),
        persistence: fast_persistence(),
        ..StorageConfig::default()
    }
}

/// In-memory `SQLite` history with schema in place
pub async fn sqlite_history() -> Result<SqliteHistoryStore> {
    init_test_logging();
    let store = SqliteHistoryStore::connect(&HistoryStoreConfig::memory()).await?;
    store.ensure_schema().await?;
    Ok(store)
}

/// Ephemeral hot tier + in-memory `SQLite` cold tier, initialized
pub async fn memory_storage() -> Result<(ChatStorage, SqliteHistoryStore)> {
    let history = sqlite_history().await?;
    let storage = ChatStorage::new(injected_config())
        .with_session_store(Arc::new(EphemeralSessionStore::new()))
        .with_history_store(Arc::new(history.clone()));
    storage.initialize().await;
    Ok((storage, history))
}

/// Unique id so parallel tests never share keys
pub fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

/// Turn fixture
pub fn turn(turn_id: &str, user_id: &str) -> Turn {
    Turn {
        turn_id: turn_id.to_owned(),
        user_id: user_id.to_owned(),
        user_message: format!("question {turn_id}"),
        assistant_response: format!("answer {turn_id}"),
        tools_used: vec!["run_sql".to_owned(), "render_chart".to_owned()],
        timestamp: Utc::now(),
        metadata: Metadata::new(),
    }
}

/// `save_turn` request fixture
pub fn new_turn(user_id: &str, session_id: &str, agent_id: &str, n: usize) -> NewTurn {
    NewTurn::new(
        user_id,
        session_id,
        agent_id,
        format!("question {n}"),
        format!("answer {n}"),
    )
}

/// Session store whose backend is always unreachable
#[derive(Default)]
pub struct UnreachableSessionStore {
    pub calls: AtomicUsize,
}

impl UnreachableSessionStore {
    fn fail<T>(&self) -> StorageResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::connectivity(Tier::Hot, "connection refused"))
    }
}

#[async_trait]
impl SessionStore for UnreachableSessionStore {
    async fn create(&self, _key: &SessionKey) -> StorageResult<History> {
        self.fail()
    }

    async fn get(&self, _key: &SessionKey) -> StorageResult<Option<History>> {
        self.fail()
    }

    async fn append_turn(&self, _key: &SessionKey, _turn: &Turn) -> StorageResult<()> {
        self.fail()
    }

    async fn update_metadata(
        &self,
        _key: &SessionKey,
        _metadata: &Metadata,
    ) -> StorageResult<bool> {
        self.fail()
    }

    async fn clear(&self, _key: &SessionKey) -> StorageResult<bool> {
        self.fail()
    }

    async fn delete(&self, _key: &SessionKey) -> StorageResult<bool> {
        self.fail()
    }

    async fn list_sessions(
        &self,
        _user_id: &str,
        _tenant_id: Option<&str>,
    ) -> StorageResult<Vec<String>> {
        self.fail()
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.fail()
    }

    fn backend_name(&self) -> &'static str {
        "unreachable"
    }
}

/// History store whose backend is always unreachable
#[derive(Default)]
pub struct UnreachableHistoryStore {
    pub calls: AtomicUsize,
}

impl UnreachableHistoryStore {
    fn fail<T>(&self) -> StorageResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::connectivity(Tier::Cold, "pool timed out"))
    }
}

#[async_trait]
impl HistoryStore for UnreachableHistoryStore {
    async fn ensure_schema(&self) -> StorageResult<()> {
        self.fail()
    }

    async fn persist_turn(
        &self,
        _messages: &[Message],
        _update: &ConversationUpdate,
    ) -> StorageResult<u64> {
        self.fail()
    }

    async fn recent_messages(&self, _query: &MessageQuery) -> StorageResult<Vec<Message>> {
        self.fail()
    }

    async fn delete_conversation(
        &self,
        _user_id: &str,
        _session_id: &str,
        _agent_id: Option<&str>,
    ) -> StorageResult<bool> {
        self.fail()
    }

    async fn list_conversations(
        &self,
        _filter: &ConversationFilter,
    ) -> StorageResult<Vec<Conversation>> {
        self.fail()
    }

    async fn get_conversation(&self, _session_id: &str) -> StorageResult<Option<Conversation>> {
        self.fail()
    }

    async fn reconcile_message_count(
        &self,
        _user_id: &str,
        _session_id: &str,
        _agent_id: Option<&str>,
    ) -> StorageResult<u64> {
        self.fail()
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.fail()
    }

    async fn close(&self) {}

    fn backend_name(&self) -> &'static str {
        "unreachable"
    }
}

/// `SQLite` history whose turn writes take `delay` before reaching the database
pub struct SlowHistoryStore {
    inner: SqliteHistoryStore,
    delay: Duration,
}

impl SlowHistoryStore {
    pub const fn new(inner: SqliteHistoryStore, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl HistoryStore for SlowHistoryStore {
    async fn ensure_schema(&self) -> StorageResult<()> {
        self.inner.ensure_schema().await
    }

    async fn persist_turn(
        &self,
        messages: &[Message],
        update: &ConversationUpdate,
    ) -> StorageResult<u64> {
        tokio::time::sleep(self.delay).await;
        self.inner.persist_turn(messages, update).await
    }

    async fn recent_messages(&self, query: &MessageQuery) -> StorageResult<Vec<Message>> {
        self.inner.recent_messages(query).await
    }

    async fn delete_conversation(
        &self,
        user_id: &str,
        session_id: &str,
        agent_id: Option<&str>,
    ) -> StorageResult<bool> {
        self.inner
            .delete_conversation(user_id, session_id, agent_id)
            .await
    }

    async fn list_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> StorageResult<Vec<Conversation>> {
        self.inner.list_conversations(filter).await
    }

    async fn get_conversation(&self, session_id: &str) -> StorageResult<Option<Conversation>> {
        self.inner.get_conversation(session_id).await
    }

    async fn reconcile_message_count(
        &self,
        user_id: &str,
        session_id: &str,
        agent_id: Option<&str>,
    ) -> StorageResult<u64> {
        self.inner
            .reconcile_message_count(user_id, session_id, agent_id)
            .await
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.inner.health_check().await
    }

    async fn close(&self) {
        self.inner.close().await;
    }

    fn backend_name(&self) -> &'static str {
        "slow-sqlite"
    }
}
