// ABOUTME: Hot-tier session store configuration types
// ABOUTME: Handles backend selection, Redis connections, key layout, and retention
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::env_parse;
use crate::constants::{redis, session};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which session store implementation backs the hot tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackendKind {
    /// In-process ephemeral store
    Memory,
    /// Remote Redis cache
    Redis,
}

impl FromStr for SessionBackendKind {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "ephemeral" => Ok(Self::Memory),
            "redis" | "valkey" => Ok(Self::Redis),
            other => Err(AppError::config(format!(
                "Unknown session backend '{other}' (expected memory|redis)"
            ))),
        }
    }
}

/// How a History is laid out in the remote cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageLayout {
    /// Scalar fields and the turn array as separate hash fields
    #[default]
    Hash,
    /// The whole History as one serialized value
    Blob,
}

impl FromStr for StorageLayout {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hash" | "field-hash" | "field_hash" => Ok(Self::Hash),
            "blob" | "json" => Ok(Self::Blob),
            other => Err(AppError::config(format!(
                "Unknown session layout '{other}' (expected hash|blob)"
            ))),
        }
    }
}

impl fmt::Display for StorageLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hash => f.write_str("hash"),
            Self::Blob => f.write_str("blob"),
        }
    }
}

/// Hot-tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStoreConfig {
    /// Backend implementation
    pub backend: SessionBackendKind,
    /// Redis URL (required for the redis backend)
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Cache layout for the redis backend
    #[serde(default)]
    pub layout: StorageLayout,
    /// Key prefix for History records
    pub key_prefix: String,
    /// Retention in seconds, refreshed on every write (0 disables expiry)
    pub ttl_secs: u64,
    /// Redis connection configuration
    #[serde(default)]
    pub redis_connection: RedisConnectionConfig,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackendKind::Memory,
            redis_url: None,
            layout: StorageLayout::Hash,
            key_prefix: session::DEFAULT_SESSION_KEY_PREFIX.to_owned(),
            ttl_secs: session::DEFAULT_SESSION_TTL_SECS,
            redis_connection: RedisConnectionConfig::default(),
        }
    }
}

impl SessionStoreConfig {
    /// Load session store configuration from environment
    ///
    /// The backend defaults to redis when `REDIS_URL` is set, memory otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend or layout names are unknown
    pub fn from_env() -> AppResult<Self> {
        let redis_url = env::var("REDIS_URL").ok().filter(|url| !url.trim().is_empty());
        let backend = match env::var("CHAT_SESSION_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) if redis_url.is_some() => SessionBackendKind::Redis,
            Err(_) => SessionBackendKind::Memory,
        };
        let layout = match env::var("CHAT_SESSION_LAYOUT") {
            Ok(raw) => raw.parse()?,
            Err(_) => StorageLayout::default(),
        };

        Ok(Self {
            backend,
            redis_url,
            layout,
            key_prefix: env::var("CHAT_SESSION_KEY_PREFIX")
                .ok()
                .filter(|prefix| !prefix.trim().is_empty())
                .unwrap_or_else(|| session::DEFAULT_SESSION_KEY_PREFIX.to_owned()),
            ttl_secs: env_parse("CHAT_SESSION_TTL_SECS", session::DEFAULT_SESSION_TTL_SECS),
            redis_connection: RedisConnectionConfig::from_env(),
        })
    }

    /// Retention as a duration, `None` when expiry is disabled
    #[must_use]
    pub const fn ttl(&self) -> Option<Duration> {
        if self.ttl_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.ttl_secs))
        }
    }

    /// Configuration for the in-process store
    #[must_use]
    pub fn memory() -> Self {
        Self::default()
    }

    /// Configuration for a redis store at `url`
    #[must_use]
    pub fn redis(url: impl Into<String>, layout: StorageLayout) -> Self {
        Self {
            backend: SessionBackendKind::Redis,
            redis_url: Some(url.into()),
            layout,
            ..Self::default()
        }
    }
}

/// Redis connection and retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConnectionConfig {
    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,
    /// Response/command timeout in seconds
    pub response_timeout_secs: u64,
    /// Number of reconnection retries after connection drop
    pub reconnection_retries: usize,
    /// Exponential backoff base for retry delays
    pub retry_exponent_base: u64,
    /// Maximum retry delay in milliseconds
    pub max_retry_delay_ms: u64,
    /// Number of retries for initial connection at startup
    pub initial_connection_retries: u32,
    /// Initial retry delay in milliseconds (doubles with exponential backoff)
    pub initial_retry_delay_ms: u64,
}

impl Default for RedisConnectionConfig {
    fn default() -> Self {
        Self {
            connection_timeout_secs: redis::CONNECTION_TIMEOUT_SECS,
            response_timeout_secs: redis::RESPONSE_TIMEOUT_SECS,
            reconnection_retries: redis::RECONNECTION_RETRIES,
            retry_exponent_base: redis::RETRY_EXPONENT_BASE,
            max_retry_delay_ms: redis::MAX_RETRY_DELAY_MS,
            initial_connection_retries: redis::INITIAL_CONNECTION_RETRIES,
            initial_retry_delay_ms: redis::INITIAL_RETRY_DELAY_MS,
        }
    }
}

impl RedisConnectionConfig {
    /// Load Redis connection configuration from environment
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            connection_timeout_secs: env_parse(
                "REDIS_CONNECTION_TIMEOUT_SECS",
                redis::CONNECTION_TIMEOUT_SECS,
            ),
            response_timeout_secs: env_parse(
                "REDIS_RESPONSE_TIMEOUT_SECS",
                redis::RESPONSE_TIMEOUT_SECS,
            ),
            reconnection_retries: env_parse(
                "REDIS_RECONNECTION_RETRIES",
                redis::RECONNECTION_RETRIES,
            ),
            retry_exponent_base: env_parse("REDIS_RETRY_EXPONENT_BASE", redis::RETRY_EXPONENT_BASE),
            max_retry_delay_ms: env_parse("REDIS_MAX_RETRY_DELAY_MS", redis::MAX_RETRY_DELAY_MS),
            initial_connection_retries: env_parse(
                "REDIS_INITIAL_CONNECTION_RETRIES",
                redis::INITIAL_CONNECTION_RETRIES,
            ),
            initial_retry_delay_ms: env_parse(
                "REDIS_INITIAL_RETRY_DELAY_MS",
                redis::INITIAL_RETRY_DELAY_MS,
            ),
        }
    }
}
