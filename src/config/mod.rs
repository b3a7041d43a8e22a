// ABOUTME: Configuration module for the two-tier conversation store
// ABOUTME: Loads hot-tier, cold-tier, and persistence settings from the environment
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Configuration for the conversation store
//!
//! - **Session**: hot-tier backend selection, Redis connection, key layout, retention
//! - **Database**: cold-tier `SQLite` location and pool sizing
//! - **Persistence**: background cold-write queue and retry backoff
//!
//! Every value has a default, so `StorageConfig::from_env()` with an empty
//! environment yields an in-memory, hot-only engine.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constants::session as session_defaults;
use crate::errors::AppResult;

/// Cold-tier database configuration
pub mod database;
/// Background persistence queue configuration
pub mod persistence;
/// Hot-tier session store configuration
pub mod session;

pub use database::{DatabaseUrl, HistoryStoreConfig};
pub use persistence::PersistenceConfig;
pub use session::{RedisConnectionConfig, SessionBackendKind, SessionStoreConfig, StorageLayout};

/// Read and parse an environment variable, falling back to `default`
pub(crate) fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Top-level configuration for [`crate::storage::ChatStorage`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Hot tier
    pub session: SessionStoreConfig,
    /// Cold tier
    pub history: HistoryStoreConfig,
    /// Cold-write queue
    pub persistence: PersistenceConfig,
    /// Turns returned by context reads when the caller passes no limit
    pub default_context_turns: usize,
    /// Minimum milliseconds between attempts to build a tier that failed to connect
    pub reconnect_interval_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            session: SessionStoreConfig::default(),
            history: HistoryStoreConfig::default(),
            persistence: PersistenceConfig::default(),
            default_context_turns: session_defaults::DEFAULT_CONTEXT_TURNS,
            reconnect_interval_ms: session_defaults::DEFAULT_RECONNECT_INTERVAL_MS,
        }
    }
}

impl StorageConfig {
    /// Load the full configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if an enumerated setting (backend, layout) has an unknown value
    pub fn from_env() -> AppResult<Self> {
        let config = Self {
            session: SessionStoreConfig::from_env()?,
            history: HistoryStoreConfig::from_env(),
            persistence: PersistenceConfig::from_env(),
            default_context_turns: env_parse(
                "CHAT_DEFAULT_CONTEXT_TURNS",
                session_defaults::DEFAULT_CONTEXT_TURNS,
            ),
            reconnect_interval_ms: env_parse(
                "CHAT_RECONNECT_INTERVAL_MS",
                session_defaults::DEFAULT_RECONNECT_INTERVAL_MS,
            ),
        };

        info!(
            session.backend = ?config.session.backend,
            session.layout = %config.session.layout,
            session.ttl_secs = config.session.ttl_secs,
            history.configured = config.history.url.is_some(),
            persistence.workers = config.persistence.workers,
            "Loaded chat storage configuration"
        );

        Ok(config)
    }

    /// In-memory hot tier and in-memory `SQLite` cold tier
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            session: SessionStoreConfig::memory(),
            history: HistoryStoreConfig::memory(),
            ..Self::default()
        }
    }

    /// Minimum wait between attempts to build a tier that failed to connect
    #[must_use]
    pub const fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}
