// ABOUTME: Cold-tier history database configuration
// ABOUTME: Parses SQLite URLs and pool sizing from the environment
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::env_parse;
use crate::constants::database;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

/// Type-safe history database location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseUrl {
    /// `SQLite` database with file path
    SQLite {
        /// Path to `SQLite` database file
        path: PathBuf,
    },
    /// In-memory `SQLite` (for testing and single-process deployments)
    Memory,
}

impl DatabaseUrl {
    /// Parse from string; anything without a `sqlite:` scheme is a file path
    #[must_use]
    pub fn parse_url(s: &str) -> Self {
        let path_str = s.strip_prefix("sqlite://").or_else(|| s.strip_prefix("sqlite:")).unwrap_or(s);
        if path_str == ":memory:" || path_str.is_empty() {
            Self::Memory
        } else {
            Self::SQLite {
                path: PathBuf::from(path_str),
            }
        }
    }

    /// Convert to connection string
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::Memory => "sqlite::memory:".into(),
        }
    }

    /// Check if this is an in-memory database
    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

impl Display for DatabaseUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.to_connection_string())
    }
}

/// Cold-tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryStoreConfig {
    /// Database location; `None` runs the engine hot-only
    pub url: Option<DatabaseUrl>,
    /// Maximum pooled connections (forced to 1 for in-memory databases)
    pub max_connections: u32,
}

impl Default for HistoryStoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: database::DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl HistoryStoreConfig {
    /// Load history store configuration from environment
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            url: env::var("CHAT_DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty())
                .map(|url| DatabaseUrl::parse_url(&url)),
            max_connections: env_parse(
                "CHAT_DATABASE_MAX_CONNECTIONS",
                database::DEFAULT_MAX_CONNECTIONS,
            ),
        }
    }

    /// In-memory `SQLite` history
    #[must_use]
    pub fn memory() -> Self {
        Self {
            url: Some(DatabaseUrl::Memory),
            ..Self::default()
        }
    }
}
