// ABOUTME: Hot-tier session store capability with pluggable ephemeral and Redis backends
// ABOUTME: Defines the SessionStore trait and the tenancy-aware key layout shared by backends
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Session Stores
//!
//! The hot tier keeps one [`History`] per tenancy key `(tenant_id, user_id, session_id)`.
//! Every backend implements [`SessionStore`]; callers pick one through
//! [`factory::SessionBackend`] or hand an `Arc<dyn SessionStore>` to the orchestrator.
//!
//! Remote layout:
//!
//! - `{prefix}:{tenant}:{user}:{session}` holds the History
//! - `{prefix}_sessions:{tenant}:{user}` is the set of known session ids

/// Environment-selected backend wrapper
pub mod factory;
/// In-process ephemeral store
pub mod memory;
/// Redis-backed store (field-hash and blob layouts)
pub mod redis;

pub use factory::SessionBackend;
pub use memory::EphemeralSessionStore;
pub use redis::RedisSessionStore;

use crate::constants::session::SESSION_INDEX_SUFFIX;
use crate::errors::StorageResult;
use crate::models::{History, Metadata, SessionKey, Turn};
use async_trait::async_trait;

/// Session store capability
///
/// Absence is a normal result (`Ok(None)` / `Ok(false)`), never an error.
/// Implementations return [`crate::errors::StorageError::Connectivity`] when the
/// backing store cannot be reached.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Idempotent upsert; returns the (possibly pre-existing) History
    async fn create(&self, key: &SessionKey) -> StorageResult<History>;

    /// Fetch a History; a missing or undecodable entry is `None`
    async fn get(&self, key: &SessionKey) -> StorageResult<Option<History>>;

    /// Append one turn, creating the History if needed
    async fn append_turn(&self, key: &SessionKey, turn: &Turn) -> StorageResult<()>;

    /// Merge metadata into an existing History; false when absent
    async fn update_metadata(&self, key: &SessionKey, metadata: &Metadata)
        -> StorageResult<bool>;

    /// Drop all turns of a History; true iff a record existed
    async fn clear(&self, key: &SessionKey) -> StorageResult<bool>;

    /// Remove a History and its session index entry; true iff a record existed
    async fn delete(&self, key: &SessionKey) -> StorageResult<bool>;

    /// Session ids known for a (tenant, user) pair, sorted
    async fn list_sessions(
        &self,
        user_id: &str,
        tenant_id: Option<&str>,
    ) -> StorageResult<Vec<String>>;

    /// Verify the backend is reachable
    async fn health_check(&self) -> StorageResult<()>;

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Renders tenancy keys into remote cache keys
#[derive(Debug, Clone)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    /// Key space rooted at `prefix`
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// `{prefix}:{tenant}:{user}:{session}`
    #[must_use]
    pub fn history_key(&self, key: &SessionKey) -> String {
        format!("{}:{key}", self.prefix)
    }

    /// `{prefix}_sessions:{tenant}:{user}`
    #[must_use]
    pub fn index_key(&self, user_id: &str, tenant_id: Option<&str>) -> String {
        format!(
            "{}{SESSION_INDEX_SUFFIX}:{}:{user_id}",
            self.prefix,
            crate::models::history::tenant_segment(tenant_id)
        )
    }
}
