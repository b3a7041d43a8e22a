// ABOUTME: Redis connection defaults for the hot-tier session store
// ABOUTME: Timeouts, reconnection retries, and exponential backoff parameters
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Connection timeout in seconds
pub const CONNECTION_TIMEOUT_SECS: u64 = 5;

/// Response/command timeout in seconds
pub const RESPONSE_TIMEOUT_SECS: u64 = 3;

/// Reconnection retries after a dropped connection
pub const RECONNECTION_RETRIES: usize = 6;

/// Exponential backoff base for reconnection delays
pub const RETRY_EXPONENT_BASE: u64 = 2;

/// Maximum reconnection delay in milliseconds
pub const MAX_RETRY_DELAY_MS: u64 = 5_000;

/// Retries for the initial connection at startup
pub const INITIAL_CONNECTION_RETRIES: u32 = 3;

/// Initial retry delay in milliseconds (doubles with exponential backoff)
pub const INITIAL_RETRY_DELAY_MS: u64 = 500;
