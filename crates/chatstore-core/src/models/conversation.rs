// ABOUTME: Cold-tier conversation aggregate, one document per tenancy key
// ABOUTME: Created lazily on first write and updated (never replaced) on later turns
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::Metadata;
use crate::constants::persistence::TITLE_MAX_CHARS;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Conversation summary document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Session identifier
    pub session_id: String,
    /// User identifier
    pub user_id: String,
    /// Owning agent/bot identifier
    pub agent_id: String,
    /// Title derived from the first user message
    pub title: String,
    /// When the first turn was persisted
    pub created_at: DateTime<Utc>,
    /// When the last turn was persisted
    pub updated_at: DateTime<Utc>,
    /// Number of persisted messages
    pub message_count: i64,
    /// Most recent user message
    pub last_user_message: Option<String>,
    /// Most recent assistant message
    pub last_assistant_message: Option<String>,
    /// Model used for the most recent turn
    pub model: Option<String>,
    /// Provider used for the most recent turn
    pub provider: Option<String>,
    /// Free-form metadata
    #[serde(default)]
    pub metadata: Metadata,
}

/// Incremental update applied to a Conversation after a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationUpdate {
    /// Session identifier
    pub session_id: String,
    /// User identifier
    pub user_id: String,
    /// Owning agent/bot identifier
    pub agent_id: String,
    /// Title used only when the Conversation is inserted
    pub title: String,
    /// Latest user message
    pub last_user_message: String,
    /// Latest assistant message
    pub last_assistant_message: String,
    /// Latest model
    pub model: Option<String>,
    /// Latest provider
    pub provider: Option<String>,
    /// Metadata used only when the Conversation is inserted
    pub metadata: Metadata,
    /// Turn timestamp; becomes `updated_at` (and `created_at` on insert)
    pub timestamp: DateTime<Utc>,
}

/// Title for a new conversation: whitespace collapsed, truncated with an ellipsis
#[must_use]
pub fn derive_title(first_user_message: &str) -> String {
    let collapsed = first_user_message
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if collapsed.is_empty() {
        return "New conversation".to_owned();
    }
    if collapsed.chars().count() <= TITLE_MAX_CHARS {
        return collapsed;
    }
    let mut title: String = collapsed.chars().take(TITLE_MAX_CHARS - 1).collect();
    title.truncate(title.trim_end().len());
    title.push('…');
    title
}
