// ABOUTME: Hot-tier session cache constants for key layout and retention
// ABOUTME: Shared by the Redis and ephemeral session stores
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Default key prefix for History records (`{prefix}:{tenant}:{user}:{session}`)
pub const DEFAULT_SESSION_KEY_PREFIX: &str = "chat_session";

/// Suffix appended to the prefix for session index sets (`{prefix}_sessions:{tenant}:{user}`)
pub const SESSION_INDEX_SUFFIX: &str = "_sessions";

/// Key segment used when a History has no owning tenant
pub const DEFAULT_TENANT_SEGMENT: &str = "default";

/// Default hot-tier retention (7 days); refreshed on every write
pub const DEFAULT_SESSION_TTL_SECS: u64 = 604_800;

/// Default number of turns handed to the agent as context
pub const DEFAULT_CONTEXT_TURNS: usize = 10;

/// Minimum interval between attempts to build a tier that failed to connect
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 30_000;

/// Hash field names used by the field-hash layout
pub mod fields {
    /// Session identifier
    pub const SESSION_ID: &str = "session_id";
    /// User identifier
    pub const USER_ID: &str = "user_id";
    /// Owning tenant (empty string when absent)
    pub const TENANT_ID: &str = "tenant_id";
    /// Serialized turn array
    pub const TURNS: &str = "turns";
    /// Serialized metadata map
    pub const METADATA: &str = "metadata";
    /// Creation timestamp (RFC 3339)
    pub const CREATED_AT: &str = "created_at";
    /// Last update timestamp (RFC 3339)
    pub const UPDATED_AT: &str = "updated_at";
}
