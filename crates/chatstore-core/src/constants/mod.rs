// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Pure data constants for key layout, connections, persistence, and schema
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Constants module
//!
//! Constants are grouped into logical domains rather than being in a single large file.

/// Hot-tier session cache constants (key layout, TTL)
pub mod session;
/// Redis connection and retry defaults
pub mod redis;
/// Background persistence queue defaults
pub mod persistence;
/// Cold-tier table and index names
pub mod database;

/// Service identity used in structured logs
pub mod service_names {
    /// Default service name for the conversation engine
    pub const CHATSTORE: &str = "chatstore";
}
