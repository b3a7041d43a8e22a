// ABOUTME: Background persistence queue defaults for cold-tier writes
// ABOUTME: Worker count, queue capacity, and retry backoff parameters
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Number of worker tasks draining the cold-write queue
pub const DEFAULT_WORKERS: usize = 2;

/// Bounded queue capacity before sends are moved to detached tasks
pub const DEFAULT_QUEUE_CAPACITY: usize = 1_024;

/// Deferred sends allowed while the queue is full; overflow beyond this is dropped
pub const DEFAULT_MAX_DEFERRED: usize = 1_024;

/// Retries per job after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Initial retry delay in milliseconds (doubles per attempt)
pub const DEFAULT_RETRY_DELAY_MS: u64 = 200;

/// Retry delay ceiling in milliseconds
pub const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 5_000;

/// Maximum characters kept when deriving a conversation title
pub const TITLE_MAX_CHARS: usize = 60;
