// ABOUTME: Main library entry point for the chatstore conversation persistence engine
// ABOUTME: Two-tier storage: a Redis or in-process session cache in front of a SQLite history
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # chatstore
//!
//! Conversation persistence for chat agents wired into several platforms.
//!
//! - **Hot tier**: a recency-biased session cache ([`session`]) keyed by
//!   `(agent_id, user_id, session_id)`, backed by Redis or an in-process map.
//! - **Cold tier**: a durable history store ([`history`]) holding one row per
//!   message and one Conversation summary per session.
//! - **Orchestrator**: [`storage::ChatStorage`] writes the hot tier synchronously,
//!   queues cold writes on a background worker pool ([`persistence`]), and reads
//!   cache-first with history fallback. A failing tier never fails the caller.
//!
//! ## Example
//!
//! ```rust,no_run
//! use chatstore::config::StorageConfig;
//! use chatstore::models::NewTurn;
//! use chatstore::storage::ChatStorage;
//!
//! # async fn run() -> chatstore::errors::AppResult<()> {
//! let storage = ChatStorage::new(StorageConfig::from_env()?);
//! storage.initialize().await;
//!
//! storage
//!     .save_turn(NewTurn::new("alice", "thread-1", "sales-bot", "Q3 revenue?", "$4.2M"))
//!     .await;
//! let context = storage
//!     .get_context_for_agent("alice", "thread-1", Some("sales-bot"), Some(10), None)
//!     .await;
//! assert_eq!(context.len(), 2);
//!
//! storage.close().await;
//! # Ok(())
//! # }
//! ```

/// Environment-driven configuration
pub mod config;

/// Constants re-exported from `chatstore-core`
pub mod constants;

/// Error types re-exported from `chatstore-core`
pub mod errors;

/// Cold-tier history store
pub mod history;

/// Structured logging setup
pub mod logging;

/// Data model re-exported from `chatstore-core`
pub mod models;

/// Background cold-write queue
pub mod persistence;

/// Hot-tier session stores
pub mod session;

/// Two-tier orchestrator
pub mod storage;

pub use storage::{ChatStorage, StorageHealth, TierStatus};
