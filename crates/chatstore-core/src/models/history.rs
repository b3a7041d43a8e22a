// ABOUTME: Hot-tier History aggregate and the tenancy key that identifies it
// ABOUTME: A History is created on first contact and is append-only until cleared
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{Metadata, Turn};
use crate::constants::session::DEFAULT_TENANT_SEGMENT;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a History: `(tenant_id, user_id, session_id)`
///
/// Two keys that differ only in `tenant_id` address disjoint Histories. An absent
/// tenant is its own partition, rendered as `default` in storage keys. An empty
/// tenant id is the absent tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    /// Owning agent/bot identifier
    pub tenant_id: Option<String>,
    /// User identifier
    pub user_id: String,
    /// Session identifier
    pub session_id: String,
}

impl SessionKey {
    /// Build a key from borrowed parts; `Some("")` becomes `None`
    #[must_use]
    pub fn new(user_id: &str, session_id: &str, tenant_id: Option<&str>) -> Self {
        Self {
            tenant_id: tenant_id
                .filter(|tenant| !tenant.is_empty())
                .map(ToOwned::to_owned),
            user_id: user_id.to_owned(),
            session_id: session_id.to_owned(),
        }
    }

    /// Tenant segment used when rendering storage keys
    #[must_use]
    pub fn tenant_segment(&self) -> &str {
        tenant_segment(self.tenant_id.as_deref())
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.tenant_segment(),
            self.user_id,
            self.session_id
        )
    }
}

/// Tenant segment for an optional tenant id
#[must_use]
pub fn tenant_segment(tenant_id: Option<&str>) -> &str {
    match tenant_id {
        Some(tenant) if !tenant.is_empty() => tenant,
        _ => DEFAULT_TENANT_SEGMENT,
    }
}

/// Ordered turns of one session plus bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    /// Session identifier
    pub session_id: String,
    /// User identifier
    pub user_id: String,
    /// Owning agent/bot identifier
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Turns, oldest first
    #[serde(default)]
    pub turns: Vec<Turn>,
    /// Free-form session metadata
    #[serde(default)]
    pub metadata: Metadata,
    /// When the History was created
    pub created_at: DateTime<Utc>,
    /// When the last turn was appended (or the History cleared)
    pub updated_at: DateTime<Utc>,
}

impl History {
    /// Create an empty History for a key
    #[must_use]
    pub fn new(key: &SessionKey) -> Self {
        let now = Utc::now();
        Self {
            session_id: key.session_id.clone(),
            user_id: key.user_id.clone(),
            tenant_id: key.tenant_id.clone(),
            turns: Vec::new(),
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Identity key of this History
    #[must_use]
    pub fn key(&self) -> SessionKey {
        SessionKey::new(&self.user_id, &self.session_id, self.tenant_id.as_deref())
    }

    /// Append a turn and bump `updated_at`
    pub fn push_turn(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.updated_at = Utc::now();
    }

    /// Drop all turns, keeping the record itself
    pub fn clear_turns(&mut self) {
        self.turns.clear();
        self.updated_at = Utc::now();
    }

    /// The last `limit` turns, oldest first
    #[must_use]
    pub fn recent_turns(&self, limit: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(limit);
        &self.turns[start..]
    }

    /// True when no turn has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
