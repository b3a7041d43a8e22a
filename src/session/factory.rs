// ABOUTME: Session store factory for configuration-based backend selection
// ABOUTME: Wraps the ephemeral and Redis stores behind one delegating enum
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{EphemeralSessionStore, RedisSessionStore, SessionStore};
use crate::config::{SessionBackendKind, SessionStoreConfig};
use crate::errors::{AppResult, StorageResult};
use crate::models::{History, Metadata, SessionKey, Turn};
use async_trait::async_trait;
use tracing::info;

/// Session store instance that delegates to the configured backend
#[derive(Clone)]
pub enum SessionBackend {
    /// In-process store
    Memory(EphemeralSessionStore),
    /// Remote Redis store
    Redis(RedisSessionStore),
}

impl SessionBackend {
    /// Build the backend named by the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the redis backend is selected and the connection fails
    pub async fn new(config: &SessionStoreConfig) -> AppResult<Self> {
        let backend = match config.backend {
            SessionBackendKind::Memory => Self::Memory(EphemeralSessionStore::new()),
            SessionBackendKind::Redis => Self::Redis(RedisSessionStore::connect(config).await?),
        };
        info!("Session store initialized: {}", backend.backend_info());
        Ok(backend)
    }

    /// Build the backend from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the connection fails
    pub async fn from_env() -> AppResult<Self> {
        Self::new(&SessionStoreConfig::from_env()?).await
    }

    /// Descriptive string for the current backend
    #[must_use]
    pub fn backend_info(&self) -> String {
        match self {
            Self::Memory(_) => "memory (process-local, no expiry)".to_owned(),
            Self::Redis(store) => format!("redis ({} layout)", store.layout()),
        }
    }

    fn inner(&self) -> &dyn SessionStore {
        match self {
            Self::Memory(store) => store,
            Self::Redis(store) => store,
        }
    }
}

#[async_trait]
impl SessionStore for SessionBackend {
    async fn create(&self, key: &SessionKey) -> StorageResult<History> {
        self.inner().create(key).await
    }

    async fn get(&self, key: &SessionKey) -> StorageResult<Option<History>> {
        self.inner().get(key).await
    }

    async fn append_turn(&self, key: &SessionKey, turn: &Turn) -> StorageResult<()> {
        self.inner().append_turn(key, turn).await
    }

    async fn update_metadata(
        &self,
        key: &SessionKey,
        metadata: &Metadata,
    ) -> StorageResult<bool> {
        self.inner().update_metadata(key, metadata).await
    }

    async fn clear(&self, key: &SessionKey) -> StorageResult<bool> {
        self.inner().clear(key).await
    }

    async fn delete(&self, key: &SessionKey) -> StorageResult<bool> {
        self.inner().delete(key).await
    }

    async fn list_sessions(
        &self,
        user_id: &str,
        tenant_id: Option<&str>,
    ) -> StorageResult<Vec<String>> {
        self.inner().list_sessions(user_id, tenant_id).await
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.inner().health_check().await
    }

    fn backend_name(&self) -> &'static str {
        self.inner().backend_name()
    }
}
