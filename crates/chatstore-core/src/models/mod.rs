// ABOUTME: Conversation data model shared by the hot and cold storage tiers
// ABOUTME: Plain value types with serde serialization rules and no storage dependencies
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Data Model
//!
//! - Hot tier: [`Turn`] (one user message + one assistant response) aggregated into a
//!   [`History`] identified by a [`SessionKey`].
//! - Cold tier: [`Message`] (one document per direction) aggregated into a
//!   [`Conversation`] per tenancy key.
//! - [`NewTurn`] is the request object platform adapters hand to `save_turn`; it
//!   derives the Turn, the paired Messages, and the [`ConversationUpdate`].

/// Cold-tier conversation aggregate and its incremental update
pub mod conversation;
/// Hot-tier History aggregate and its identity key
pub mod history;
/// Cold-tier message documents and payload kinds
pub mod message;
/// `save_turn` request object
pub mod request;
/// Hot-tier turn unit
pub mod turn;

pub use conversation::{derive_title, Conversation, ConversationUpdate};
pub use history::{History, SessionKey};
pub use message::{
    AgentOutput, ContextMessage, Message, MessageRole, OutputMode, Source, ToolCall,
    ToolCallStatus,
};
pub use request::NewTurn;
pub use turn::Turn;

/// Open string-keyed metadata map carried by turns, histories, and documents
pub type Metadata = serde_json::Map<String, serde_json::Value>;
