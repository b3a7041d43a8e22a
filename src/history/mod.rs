// ABOUTME: Cold-tier history store capability for durable messages and conversation aggregates
// ABOUTME: Defines the HistoryStore trait and its query types; SQLite implementation lives in sqlite.rs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # History Stores
//!
//! The cold tier is the durability source of truth: one row per message and one
//! Conversation aggregate per tenancy key `(agent_id, user_id, session_id)`.

/// `SQLite` implementation via sqlx
pub mod sqlite;

pub use sqlite::SqliteHistoryStore;

use crate::errors::StorageResult;
use crate::models::{Conversation, ConversationUpdate, Message};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Message lookup for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageQuery {
    /// User identifier
    pub user_id: String,
    /// Session identifier
    pub session_id: String,
    /// Restrict to one agent; `None` matches every agent
    pub agent_id: Option<String>,
    /// Maximum number of messages, most recent kept
    pub limit: usize,
}

/// Conversation listing filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationFilter {
    /// User identifier
    pub user_id: String,
    /// Restrict to one agent; `None` matches every agent
    pub agent_id: Option<String>,
    /// Maximum number of conversations
    pub limit: usize,
    /// Only conversations updated at or after this instant
    pub since: Option<DateTime<Utc>>,
}

/// Cold-tier capability
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Create tables and secondary indexes if missing (idempotent)
    async fn ensure_schema(&self) -> StorageResult<()>;

    /// Write the messages of one turn and upsert its Conversation atomically
    ///
    /// Messages already present (same `message_id`) are skipped, and the
    /// Conversation's `message_count` grows only by the rows actually inserted.
    /// Returns that number.
    async fn persist_turn(
        &self,
        messages: &[Message],
        update: &ConversationUpdate,
    ) -> StorageResult<u64>;

    /// Most recent messages of a session, returned oldest first
    async fn recent_messages(&self, query: &MessageQuery) -> StorageResult<Vec<Message>>;

    /// Remove a session's messages and Conversation; true iff anything was removed
    async fn delete_conversation(
        &self,
        user_id: &str,
        session_id: &str,
        agent_id: Option<&str>,
    ) -> StorageResult<bool>;

    /// Conversations of a user, most recently updated first
    async fn list_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> StorageResult<Vec<Conversation>>;

    /// Most recently updated Conversation with this session id
    async fn get_conversation(&self, session_id: &str) -> StorageResult<Option<Conversation>>;

    /// Recompute `message_count` from stored messages; returns conversations updated
    async fn reconcile_message_count(
        &self,
        user_id: &str,
        session_id: &str,
        agent_id: Option<&str>,
    ) -> StorageResult<u64>;

    /// Verify the store is reachable
    async fn health_check(&self) -> StorageResult<()>;

    /// Release pooled connections
    async fn close(&self);

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}
