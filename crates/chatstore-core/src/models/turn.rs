// ABOUTME: Hot-tier turn: one user message paired with one assistant response
// ABOUTME: Immutable once created; turns are appended to a History, never edited
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::Metadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One user message + assistant response pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn identifier (also the prefix of the paired message ids)
    pub turn_id: String,
    /// User who sent the message
    pub user_id: String,
    /// What the user said
    pub user_message: String,
    /// What the assistant answered
    pub assistant_response: String,
    /// Names of the tools invoked while producing the response, in call order
    #[serde(default)]
    pub tools_used: Vec<String>,
    /// When the turn was recorded
    pub timestamp: DateTime<Utc>,
    /// Free-form turn metadata
    #[serde(default)]
    pub metadata: Metadata,
}
