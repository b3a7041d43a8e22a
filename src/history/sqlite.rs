// ABOUTME: SQLite history store for chat messages and conversation aggregates
// ABOUTME: Idempotent transactional turn writes, recency queries, and tenant-scoped deletes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{ConversationFilter, HistoryStore, MessageQuery};
use crate::config::HistoryStoreConfig;
use crate::constants::database::{
    CONVERSATIONS_TABLE, CONVERSATION_INDEXES, MESSAGES_TABLE, MESSAGE_INDEXES,
};
use crate::errors::{AppError, AppResult, StorageError, StorageResult, Tier};
use crate::models::{Conversation, ConversationUpdate, Message, MessageRole, OutputMode};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};
use std::str::FromStr;
use tracing::{debug, error, info};

const MESSAGE_COLUMNS: &str = "message_id, session_id, user_id, agent_id, role, content, \
    timestamp, output, output_mode, structured_data, code, model, provider, response_time_ms, \
    tool_calls, sources, metadata";

const CONVERSATION_COLUMNS: &str = "session_id, user_id, agent_id, title, created_at, \
    updated_at, message_count, last_user_message, last_assistant_message, model, provider, \
    metadata";

/// `SQLite` history store (the cold tier)
#[derive(Clone)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    /// Open (creating if needed) the configured database
    ///
    /// In-memory databases use a single pinned connection so every query sees
    /// the same database.
    ///
    /// # Errors
    ///
    /// Returns an error if no database URL is configured or the pool cannot connect
    pub async fn connect(config: &HistoryStoreConfig) -> AppResult<Self> {
        let url = config
            .url
            .as_ref()
            .ok_or_else(|| AppError::config("CHAT_DATABASE_URL is required for the history store"))?;

        let mut options = SqliteConnectOptions::from_str(&url.to_connection_string())
            .map_err(|e| AppError::config(format!("Invalid history database URL: {e}")))?
            .create_if_missing(true);

        let pool_options = if url.is_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            options = options.journal_mode(SqliteJournalMode::Wal);
            SqlitePoolOptions::new().max_connections(config.max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| AppError::unavailable("history database", e.to_string()).with_source(e))?;

        info!(database = %url, "History store connected");
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    #[must_use]
    pub const fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Underlying pool
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn insert_message(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        message: &Message,
    ) -> StorageResult<u64> {
        let result = sqlx::query(
            r"
            INSERT OR IGNORE INTO chat_messages (
                message_id, session_id, user_id, agent_id, role, content, timestamp,
                output, output_mode, structured_data, code, model, provider, response_time_ms,
                tool_calls, sources, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ",
        )
        .bind(&message.message_id)
        .bind(&message.session_id)
        .bind(&message.user_id)
        .bind(&message.agent_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(timestamp(message.timestamp))
        .bind(encode_optional(message.output.as_ref(), "message output")?)
        .bind(message.output_mode.map(OutputMode::as_str))
        .bind(encode_optional(
            message.structured_data.as_ref(),
            "message structured data",
        )?)
        .bind(&message.code)
        .bind(&message.model)
        .bind(&message.provider)
        .bind(message.response_time_ms.and_then(|ms| i64::try_from(ms).ok()))
        .bind(encode(&message.tool_calls, "message tool calls")?)
        .bind(encode(&message.sources, "message sources")?)
        .bind(encode(&message.metadata, "message metadata")?)
        .execute(&mut **tx)
        .await
        .map_err(|e| cold_error("insert_message", e))?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn ensure_schema(&self) -> StorageResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS chat_conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                agent_id TEXT NOT NULL,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                message_count INTEGER NOT NULL DEFAULT 0,
                last_user_message TEXT,
                last_assistant_message TEXT,
                model TEXT,
                provider TEXT,
                metadata TEXT NOT NULL DEFAULT '{}',
                UNIQUE (agent_id, user_id, session_id)
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| cold_error("create_conversations_table", e))?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS chat_messages (
                message_id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                agent_id TEXT NOT NULL,
                role TEXT NOT NULL CHECK (role IN ('user', 'assistant', 'system')),
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                output TEXT,
                output_mode TEXT,
                structured_data TEXT,
                code TEXT,
                model TEXT,
                provider TEXT,
                response_time_ms INTEGER,
                tool_calls TEXT NOT NULL DEFAULT '[]',
                sources TEXT NOT NULL DEFAULT '[]',
                metadata TEXT NOT NULL DEFAULT '{}'
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| cold_error("create_messages_table", e))?;

        let indexes = CONVERSATION_INDEXES
            .iter()
            .map(|index| (CONVERSATIONS_TABLE, index))
            .chain(MESSAGE_INDEXES.iter().map(|index| (MESSAGES_TABLE, index)));
        for (table, (name, columns)) in indexes {
            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS {name} ON {table} ({columns})"
            ))
            .execute(&self.pool)
            .await
            .map_err(|e| cold_error("create_index", e))?;
        }

        debug!("History schema and indexes ensured");
        Ok(())
    }

    async fn persist_turn(
        &self,
        messages: &[Message],
        update: &ConversationUpdate,
    ) -> StorageResult<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| cold_error("begin", e))?;

        let mut inserted = 0;
        for message in messages {
            inserted += Self::insert_message(&mut tx, message).await?;
        }

        // Out-of-order retries must not move the summary backwards
        sqlx::query(
            r"
            INSERT INTO chat_conversations (
                session_id, user_id, agent_id, title, created_at, updated_at, message_count,
                last_user_message, last_assistant_message, model, provider, metadata
            )
            VALUES ($1, $2, $3, $4, $5, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (agent_id, user_id, session_id) DO UPDATE SET
                message_count = chat_conversations.message_count + excluded.message_count,
                last_user_message = CASE WHEN excluded.updated_at >= chat_conversations.updated_at
                    THEN excluded.last_user_message ELSE chat_conversations.last_user_message END,
                last_assistant_message = CASE WHEN excluded.updated_at >= chat_conversations.updated_at
                    THEN excluded.last_assistant_message ELSE chat_conversations.last_assistant_message END,
                model = CASE WHEN excluded.updated_at >= chat_conversations.updated_at
                    THEN COALESCE(excluded.model, chat_conversations.model) ELSE chat_conversations.model END,
                provider = CASE WHEN excluded.updated_at >= chat_conversations.updated_at
                    THEN COALESCE(excluded.provider, chat_conversations.provider) ELSE chat_conversations.provider END,
                updated_at = MAX(chat_conversations.updated_at, excluded.updated_at)
            ",
        )
        .bind(&update.session_id)
        .bind(&update.user_id)
        .bind(&update.agent_id)
        .bind(&update.title)
        .bind(timestamp(update.timestamp))
        .bind(i64::try_from(inserted).unwrap_or(i64::MAX))
        .bind(&update.last_user_message)
        .bind(&update.last_assistant_message)
        .bind(&update.model)
        .bind(&update.provider)
        .bind(encode(&update.metadata, "conversation metadata")?)
        .execute(&mut *tx)
        .await
        .map_err(|e| cold_error("upsert_conversation", e))?;

        tx.commit().await.map_err(|e| cold_error("commit", e))?;

        debug!(
            session.id = %update.session_id,
            user.id = %update.user_id,
            agent.id = %update.agent_id,
            inserted,
            "Persisted turn to history"
        );
        Ok(inserted)
    }

    async fn recent_messages(&self, query: &MessageQuery) -> StorageResult<Vec<Message>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {MESSAGE_COLUMNS}
            FROM chat_messages
            WHERE session_id = $1 AND user_id = $2 AND ($3 IS NULL OR agent_id = $3)
            ORDER BY timestamp DESC, rowid DESC
            LIMIT $4
            "
        ))
        .bind(&query.session_id)
        .bind(&query.user_id)
        .bind(query.agent_id.as_deref())
        .bind(i64::try_from(query.limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| cold_error("recent_messages", e))?;

        let mut messages = rows
            .iter()
            .map(row_to_message)
            .collect::<StorageResult<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }

    async fn delete_conversation(
        &self,
        user_id: &str,
        session_id: &str,
        agent_id: Option<&str>,
    ) -> StorageResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| cold_error("begin", e))?;

        let messages = sqlx::query(
            r"
            DELETE FROM chat_messages
            WHERE session_id = $1 AND user_id = $2 AND ($3 IS NULL OR agent_id = $3)
            ",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(agent_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| cold_error("delete_messages", e))?
        .rows_affected();

        let conversations = sqlx::query(
            r"
            DELETE FROM chat_conversations
            WHERE session_id = $1 AND user_id = $2 AND ($3 IS NULL OR agent_id = $3)
            ",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(agent_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| cold_error("delete_conversation", e))?
        .rows_affected();

        tx.commit().await.map_err(|e| cold_error("commit", e))?;

        Ok(messages > 0 || conversations > 0)
    }

    async fn list_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> StorageResult<Vec<Conversation>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {CONVERSATION_COLUMNS}
            FROM chat_conversations
            WHERE user_id = $1
              AND ($2 IS NULL OR agent_id = $2)
              AND ($3 IS NULL OR updated_at >= $3)
            ORDER BY updated_at DESC
            LIMIT $4
            "
        ))
        .bind(&filter.user_id)
        .bind(filter.agent_id.as_deref())
        .bind(filter.since.map(timestamp))
        .bind(i64::try_from(filter.limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| cold_error("list_conversations", e))?;

        rows.iter().map(row_to_conversation).collect()
    }

    async fn get_conversation(&self, session_id: &str) -> StorageResult<Option<Conversation>> {
        let row = sqlx::query(&format!(
            r"
            SELECT {CONVERSATION_COLUMNS}
            FROM chat_conversations
            WHERE session_id = $1
            ORDER BY updated_at DESC
            LIMIT 1
            "
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| cold_error("get_conversation", e))?;

        row.as_ref().map(row_to_conversation).transpose()
    }

    async fn reconcile_message_count(
        &self,
        user_id: &str,
        session_id: &str,
        agent_id: Option<&str>,
    ) -> StorageResult<u64> {
        let result = sqlx::query(
            r"
            UPDATE chat_conversations
            SET message_count = (
                SELECT COUNT(*) FROM chat_messages m
                WHERE m.session_id = chat_conversations.session_id
                  AND m.user_id = chat_conversations.user_id
                  AND m.agent_id = chat_conversations.agent_id
            )
            WHERE session_id = $1 AND user_id = $2 AND ($3 IS NULL OR agent_id = $3)
            ",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(agent_id)
        .execute(&self.pool)
        .await
        .map_err(|e| cold_error("reconcile_message_count", e))?;

        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| cold_error("health_check", e))?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

/// Stored timestamp representation (sortable RFC 3339, microsecond precision)
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn cold_error(operation: &'static str, e: sqlx::Error) -> StorageError {
    error!(tier = "cold", backend = "sqlite", operation, "History operation failed: {}", e);
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StorageError::connectivity_from(Tier::Cold, e),
        other => StorageError::query(Tier::Cold, format!("{operation}: {other}")),
    }
}

fn encode<T: Serialize>(value: &T, context: &'static str) -> StorageResult<String> {
    serde_json::to_string(value).map_err(|e| StorageError::serialization(context, e))
}

fn encode_optional<T: Serialize>(
    value: Option<&T>,
    context: &'static str,
) -> StorageResult<Option<String>> {
    value.map(|v| encode(v, context)).transpose()
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> StorageResult<T>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StorageError::query(Tier::Cold, format!("Failed to get {name}: {e}")))
}

fn json_column<T: DeserializeOwned>(
    row: &SqliteRow,
    name: &str,
    context: &'static str,
) -> StorageResult<Option<T>> {
    column::<Option<String>>(row, name)?
        .map(|raw| serde_json::from_str(&raw).map_err(|e| StorageError::serialization(context, e)))
        .transpose()
}

fn timestamp_column(row: &SqliteRow, name: &str) -> StorageResult<DateTime<Utc>> {
    let raw: String = column(row, name)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StorageError::query(Tier::Cold, format!("Invalid {name} '{raw}': {e}")))
}

fn row_to_message(row: &SqliteRow) -> StorageResult<Message> {
    let role_raw: String = column(row, "role")?;
    let role = MessageRole::parse(&role_raw)
        .ok_or_else(|| StorageError::query(Tier::Cold, format!("Unknown role '{role_raw}'")))?;
    let output_mode = column::<Option<String>>(row, "output_mode")?
        .as_deref()
        .and_then(OutputMode::parse);

    Ok(Message {
        message_id: column(row, "message_id")?,
        session_id: column(row, "session_id")?,
        user_id: column(row, "user_id")?,
        agent_id: column(row, "agent_id")?,
        role,
        content: column(row, "content")?,
        timestamp: timestamp_column(row, "timestamp")?,
        output: json_column(row, "output", "message output")?,
        output_mode,
        structured_data: json_column(row, "structured_data", "message structured data")?,
        code: column(row, "code")?,
        model: column(row, "model")?,
        provider: column(row, "provider")?,
        response_time_ms: column::<Option<i64>>(row, "response_time_ms")?
            .and_then(|ms| u64::try_from(ms).ok()),
        tool_calls: json_column(row, "tool_calls", "message tool calls")?.unwrap_or_default(),
        sources: json_column(row, "sources", "message sources")?.unwrap_or_default(),
        metadata: json_column(row, "metadata", "message metadata")?.unwrap_or_default(),
    })
}

fn row_to_conversation(row: &SqliteRow) -> StorageResult<Conversation> {
    Ok(Conversation {
        session_id: column(row, "session_id")?,
        user_id: column(row, "user_id")?,
        agent_id: column(row, "agent_id")?,
        title: column(row, "title")?,
        created_at: timestamp_column(row, "created_at")?,
        updated_at: timestamp_column(row, "updated_at")?,
        message_count: column(row, "message_count")?,
        last_user_message: column(row, "last_user_message")?,
        last_assistant_message: column(row, "last_assistant_message")?,
        model: column(row, "model")?,
        provider: column(row, "provider")?,
        metadata: json_column(row, "metadata", "conversation metadata")?.unwrap_or_default(),
    })
}
