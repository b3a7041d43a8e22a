// ABOUTME: Background persistence queue configuration
// ABOUTME: Worker pool size, queue bound, and retry backoff for cold-tier writes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::env_parse;
use crate::constants::persistence;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cold-write queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Worker tasks draining the queue
    pub workers: usize,
    /// Bounded queue capacity
    pub queue_capacity: usize,
    /// Deferred sends allowed while the queue is full
    pub max_deferred: usize,
    /// Retries per job after the first attempt
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles per attempt)
    pub retry_delay_ms: u64,
    /// Retry delay ceiling in milliseconds
    pub max_retry_delay_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            workers: persistence::DEFAULT_WORKERS,
            queue_capacity: persistence::DEFAULT_QUEUE_CAPACITY,
            max_deferred: persistence::DEFAULT_MAX_DEFERRED,
            max_retries: persistence::DEFAULT_MAX_RETRIES,
            retry_delay_ms: persistence::DEFAULT_RETRY_DELAY_MS,
            max_retry_delay_ms: persistence::DEFAULT_MAX_RETRY_DELAY_MS,
        }
    }
}

impl PersistenceConfig {
    /// Load persistence configuration from environment
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            workers: env_parse("CHAT_PERSISTENCE_WORKERS", persistence::DEFAULT_WORKERS),
            queue_capacity: env_parse(
                "CHAT_PERSISTENCE_QUEUE_CAPACITY",
                persistence::DEFAULT_QUEUE_CAPACITY,
            ),
            max_deferred: env_parse(
                "CHAT_PERSISTENCE_MAX_DEFERRED",
                persistence::DEFAULT_MAX_DEFERRED,
            ),
            max_retries: env_parse("CHAT_PERSISTENCE_MAX_RETRIES", persistence::DEFAULT_MAX_RETRIES),
            retry_delay_ms: env_parse(
                "CHAT_PERSISTENCE_RETRY_DELAY_MS",
                persistence::DEFAULT_RETRY_DELAY_MS,
            ),
            max_retry_delay_ms: env_parse(
                "CHAT_PERSISTENCE_MAX_RETRY_DELAY_MS",
                persistence::DEFAULT_MAX_RETRY_DELAY_MS,
            ),
        }
    }

    /// Delay before retry number `attempt` (1-based), capped
    #[must_use]
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(
            self.retry_delay_ms
                .saturating_mul(factor)
                .min(self.max_retry_delay_ms),
        )
    }
}
