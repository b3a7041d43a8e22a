// ABOUTME: Cold-tier schema names for conversations and messages
// ABOUTME: Table names, defaults, and the secondary index set created at initialization
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Conversation aggregate table (one row per tenancy key)
pub const CONVERSATIONS_TABLE: &str = "chat_conversations";

/// Message table (one row per message direction)
pub const MESSAGES_TABLE: &str = "chat_messages";

/// Default maximum pool connections for file-backed databases
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Secondary indexes on the conversation table: (index name, column list)
pub const CONVERSATION_INDEXES: &[(&str, &str)] = &[
    ("idx_chat_conversations_session", "session_id"),
    ("idx_chat_conversations_user", "user_id"),
    ("idx_chat_conversations_agent", "agent_id"),
    ("idx_chat_conversations_updated", "updated_at"),
];

/// Secondary indexes on the message table: (index name, column list)
pub const MESSAGE_INDEXES: &[(&str, &str)] = &[
    ("idx_chat_messages_session", "session_id"),
    ("idx_chat_messages_user", "user_id"),
    ("idx_chat_messages_message_id", "message_id"),
    ("idx_chat_messages_timestamp", "timestamp"),
    ("idx_chat_messages_session_ts", "session_id, timestamp"),
    ("idx_chat_messages_user_session_ts", "user_id, session_id, timestamp"),
];
