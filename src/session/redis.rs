// ABOUTME: Redis session store with connection pooling, retention, and atomic turn appends
// ABOUTME: Supports a field-hash layout (Lua splice append) and a whole-record blob layout
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::{KeySpace, SessionStore};
use crate::config::{RedisConnectionConfig, SessionStoreConfig, StorageLayout};
use crate::constants::session::fields;
use crate::errors::{AppError, AppResult, StorageError, StorageResult, Tier};
use crate::models::{History, Metadata, SessionKey, Turn};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, RedisError};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Appends one turn to the `turns` field without a read/rewrite round trip.
///
/// KEYS: history, session index. ARGV: turn json, now, ttl, session, user, tenant.
const APPEND_TURN_SCRIPT: &str = r#"
local key = KEYS[1]
local index_key = KEYS[2]
local turn = ARGV[1]
local now = ARGV[2]
local ttl = tonumber(ARGV[3]) or 0
redis.call("HSETNX", key, "session_id", ARGV[4])
redis.call("HSETNX", key, "user_id", ARGV[5])
redis.call("HSETNX", key, "tenant_id", ARGV[6])
redis.call("HSETNX", key, "metadata", "{}")
redis.call("HSETNX", key, "created_at", now)
local current = redis.call("HGET", key, "turns")
if (not current) or current == "" or current == "[]" then
  current = "[" .. turn .. "]"
else
  current = string.sub(current, 1, -2) .. "," .. turn .. "]"
end
redis.call("HSET", key, "turns", current, "updated_at", now)
redis.call("SADD", index_key, ARGV[4])
if ttl > 0 then
  redis.call("EXPIRE", key, ttl)
  redis.call("EXPIRE", index_key, ttl)
end
return string.len(current)
"#;

/// Resets `turns` on an existing record. KEYS: history. ARGV: now.
const CLEAR_TURNS_SCRIPT: &str = r#"
if redis.call("EXISTS", KEYS[1]) == 0 then
  return 0
end
redis.call("HSET", KEYS[1], "turns", "[]", "updated_at", ARGV[1])
return 1
"#;

/// Redis-backed session store (the hot tier)
///
/// Uses a `ConnectionManager` for automatic reconnection; clones share the
/// underlying multiplexed connection.
#[derive(Clone)]
pub struct RedisSessionStore {
    manager: ConnectionManager,
    keys: KeySpace,
    layout: StorageLayout,
    ttl_secs: u64,
}

impl RedisSessionStore {
    /// Connect to Redis using the session store configuration
    ///
    /// # Errors
    ///
    /// Returns an error if no Redis URL is configured or the connection cannot be
    /// established within the configured retries
    pub async fn connect(config: &SessionStoreConfig) -> AppResult<Self> {
        let redis_url = config
            .redis_url
            .as_ref()
            .ok_or_else(|| AppError::config("REDIS_URL is required for the redis session backend"))?;

        let conn_config = &config.redis_connection;

        info!(
            layout = %config.layout,
            ttl_secs = config.ttl_secs,
            "Connecting session store to Redis (timeout={}s, response_timeout={}s, retries={})",
            conn_config.connection_timeout_secs,
            conn_config.response_timeout_secs,
            conn_config.initial_connection_retries
        );

        let client = redis::Client::open(redis_url.as_str())
            .map_err(|e| AppError::config(format!("Invalid Redis URL: {e}")))?;

        let manager = Self::connect_with_retry(&client, conn_config).await?;

        info!("Session store connected to Redis");

        Ok(Self {
            manager,
            keys: KeySpace::new(config.key_prefix.clone()),
            layout: config.layout,
            ttl_secs: config.ttl_secs,
        })
    }

    /// Connect to Redis with exponential backoff retry on failure
    async fn connect_with_retry(
        client: &redis::Client,
        conn_config: &RedisConnectionConfig,
    ) -> AppResult<ConnectionManager> {
        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(Duration::from_secs(conn_config.connection_timeout_secs))
            .set_response_timeout(Duration::from_secs(conn_config.response_timeout_secs))
            .set_number_of_retries(conn_config.reconnection_retries)
            .set_exponent_base(conn_config.retry_exponent_base)
            .set_max_delay(conn_config.max_retry_delay_ms);

        let max_retries = conn_config.initial_connection_retries;
        let mut delay_ms = conn_config.initial_retry_delay_ms;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            match ConnectionManager::new_with_config(client.clone(), manager_config.clone()).await {
                Ok(manager) => {
                    if attempt > 0 {
                        info!("Redis connection established after {} retries", attempt);
                    }
                    return Ok(manager);
                }
                Err(e) => {
                    if attempt < max_retries {
                        warn!(
                            "Redis connection attempt {}/{} failed, retrying in {}ms: {}",
                            attempt + 1,
                            max_retries + 1,
                            delay_ms,
                            e
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        delay_ms = (delay_ms * 2).min(conn_config.max_retry_delay_ms);
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(AppError::unavailable(
            "redis",
            format!(
                "connection failed after {} attempts: {}",
                max_retries + 1,
                last_error.map_or_else(|| "unknown error".to_owned(), |e| e.to_string())
            ),
        ))
    }

    /// Storage layout in use
    #[must_use]
    pub const fn layout(&self) -> StorageLayout {
        self.layout
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }

    async fn append_hash(&self, key: &SessionKey, turn: &Turn) -> StorageResult<()> {
        let turn_json = serde_json::to_string(turn)
            .map_err(|e| StorageError::serialization("session turn", e))?;
        let history_key = self.keys.history_key(key);
        let index_key = self.keys.index_key(&key.user_id, key.tenant_id.as_deref());

        let mut conn = self.conn();
        let turns_len: i64 = redis::cmd("EVAL")
            .arg(APPEND_TURN_SCRIPT)
            .arg(2)
            .arg(&history_key)
            .arg(&index_key)
            .arg(&turn_json)
            .arg(timestamp(Utc::now()))
            .arg(self.ttl_secs)
            .arg(&key.session_id)
            .arg(&key.user_id)
            .arg(key.tenant_id.as_deref().unwrap_or_default())
            .query_async(&mut conn)
            .await
            .map_err(|e| hot_error("append_turn", e))?;

        debug!(
            session.key = %key,
            turn.id = %turn.turn_id,
            turns.bytes = turns_len,
            "Appended turn to hash session"
        );
        Ok(())
    }

    async fn append_blob(&self, key: &SessionKey, turn: &Turn) -> StorageResult<()> {
        let mut history = match self.get_blob(key).await? {
            Some(history) => history,
            None => History::new(key),
        };
        history.push_turn(turn.clone());
        self.write_blob(key, &history).await
    }

    async fn write_blob(&self, key: &SessionKey, history: &History) -> StorageResult<()> {
        let encoded = serde_json::to_string(history)
            .map_err(|e| StorageError::serialization("session history", e))?;
        let history_key = self.keys.history_key(key);
        let index_key = self.keys.index_key(&key.user_id, key.tenant_id.as_deref());

        let mut pipe = redis::pipe();
        pipe.atomic();
        if self.ttl_secs > 0 {
            pipe.cmd("SET")
                .arg(&history_key)
                .arg(&encoded)
                .arg("EX")
                .arg(self.ttl_secs)
                .ignore();
        } else {
            pipe.cmd("SET").arg(&history_key).arg(&encoded).ignore();
        }
        pipe.cmd("SADD").arg(&index_key).arg(&key.session_id).ignore();
        if self.ttl_secs > 0 {
            pipe.cmd("EXPIRE").arg(&index_key).arg(self.ttl_secs).ignore();
        }

        let mut conn = self.conn();
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| hot_error("write_blob", e))
    }

    async fn get_hash(&self, key: &SessionKey) -> StorageResult<Option<History>> {
        let mut conn = self.conn();
        let stored: HashMap<String, String> = conn
            .hgetall(self.keys.history_key(key))
            .await
            .map_err(|e| hot_error("get", e))?;

        if stored.is_empty() {
            return Ok(None);
        }
        soft_miss(key, decode_hash(key, &stored))
    }

    async fn get_blob(&self, key: &SessionKey) -> StorageResult<Option<History>> {
        let mut conn = self.conn();
        let stored: Option<String> = conn
            .get(self.keys.history_key(key))
            .await
            .map_err(|e| hot_error("get", e))?;

        match stored {
            Some(raw) => soft_miss(
                key,
                serde_json::from_str::<History>(&raw)
                    .map_err(|e| StorageError::serialization("session history", e)),
            ),
            None => Ok(None),
        }
    }

    async fn create_hash(&self, key: &SessionKey) -> StorageResult<()> {
        let history_key = self.keys.history_key(key);
        let index_key = self.keys.index_key(&key.user_id, key.tenant_id.as_deref());
        let now = timestamp(Utc::now());

        let mut pipe = redis::pipe();
        pipe.atomic();
        for (field, value) in [
            (fields::SESSION_ID, key.session_id.as_str()),
            (fields::USER_ID, key.user_id.as_str()),
            (fields::TENANT_ID, key.tenant_id.as_deref().unwrap_or_default()),
            (fields::TURNS, "[]"),
            (fields::METADATA, "{}"),
            (fields::CREATED_AT, now.as_str()),
            (fields::UPDATED_AT, now.as_str()),
        ] {
            pipe.cmd("HSETNX").arg(&history_key).arg(field).arg(value).ignore();
        }
        pipe.cmd("SADD").arg(&index_key).arg(&key.session_id).ignore();
        if self.ttl_secs > 0 {
            pipe.cmd("EXPIRE").arg(&history_key).arg(self.ttl_secs).ignore();
            pipe.cmd("EXPIRE").arg(&index_key).arg(self.ttl_secs).ignore();
        }

        let mut conn = self.conn();
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| hot_error("create", e))
    }

    async fn create_blob(&self, key: &SessionKey) -> StorageResult<()> {
        let encoded = serde_json::to_string(&History::new(key))
            .map_err(|e| StorageError::serialization("session history", e))?;
        let history_key = self.keys.history_key(key);
        let index_key = self.keys.index_key(&key.user_id, key.tenant_id.as_deref());

        let mut pipe = redis::pipe();
        pipe.atomic();
        let set = pipe.cmd("SET").arg(&history_key).arg(&encoded).arg("NX");
        if self.ttl_secs > 0 {
            set.arg("EX").arg(self.ttl_secs);
        }
        set.ignore();
        pipe.cmd("SADD").arg(&index_key).arg(&key.session_id).ignore();
        if self.ttl_secs > 0 {
            pipe.cmd("EXPIRE").arg(&index_key).arg(self.ttl_secs).ignore();
        }

        let mut conn = self.conn();
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| hot_error("create", e))
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(&self, key: &SessionKey) -> StorageResult<History> {
        match self.layout {
            StorageLayout::Hash => self.create_hash(key).await?,
            StorageLayout::Blob => self.create_blob(key).await?,
        }
        Ok(self.get(key).await?.unwrap_or_else(|| History::new(key)))
    }

    async fn get(&self, key: &SessionKey) -> StorageResult<Option<History>> {
        match self.layout {
            StorageLayout::Hash => self.get_hash(key).await,
            StorageLayout::Blob => self.get_blob(key).await,
        }
    }

    async fn append_turn(&self, key: &SessionKey, turn: &Turn) -> StorageResult<()> {
        match self.layout {
            StorageLayout::Hash => self.append_hash(key, turn).await,
            StorageLayout::Blob => self.append_blob(key, turn).await,
        }
    }

    async fn update_metadata(
        &self,
        key: &SessionKey,
        metadata: &Metadata,
    ) -> StorageResult<bool> {
        let Some(mut history) = self.get(key).await? else {
            return Ok(false);
        };
        for (field, value) in metadata {
            history.metadata.insert(field.clone(), value.clone());
        }
        history.updated_at = Utc::now();

        match self.layout {
            StorageLayout::Hash => {
                let encoded = serde_json::to_string(&history.metadata)
                    .map_err(|e| StorageError::serialization("session metadata", e))?;
                let mut conn = self.conn();
                let () = conn
                    .hset_multiple(
                        self.keys.history_key(key),
                        &[
                            (fields::METADATA, encoded),
                            (fields::UPDATED_AT, timestamp(history.updated_at)),
                        ],
                    )
                    .await
                    .map_err(|e| hot_error("update_metadata", e))?;
            }
            StorageLayout::Blob => self.write_blob(key, &history).await?,
        }
        Ok(true)
    }

    async fn clear(&self, key: &SessionKey) -> StorageResult<bool> {
        match self.layout {
            StorageLayout::Hash => {
                let mut conn = self.conn();
                let cleared: i64 = redis::cmd("EVAL")
                    .arg(CLEAR_TURNS_SCRIPT)
                    .arg(1)
                    .arg(self.keys.history_key(key))
                    .arg(timestamp(Utc::now()))
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| hot_error("clear", e))?;
                Ok(cleared == 1)
            }
            StorageLayout::Blob => {
                let mut conn = self.conn();
                let exists: bool = conn
                    .exists(self.keys.history_key(key))
                    .await
                    .map_err(|e| hot_error("clear", e))?;
                if !exists {
                    return Ok(false);
                }
                let mut history = self.get_blob(key).await?.unwrap_or_else(|| History::new(key));
                history.clear_turns();
                self.write_blob(key, &history).await?;
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &SessionKey) -> StorageResult<bool> {
        let mut conn = self.conn();
        let (deleted, _unindexed): (i64, i64) = redis::pipe()
            .atomic()
            .del(self.keys.history_key(key))
            .srem(
                self.keys.index_key(&key.user_id, key.tenant_id.as_deref()),
                &key.session_id,
            )
            .query_async(&mut conn)
            .await
            .map_err(|e| hot_error("delete", e))?;
        Ok(deleted > 0)
    }

    async fn list_sessions(
        &self,
        user_id: &str,
        tenant_id: Option<&str>,
    ) -> StorageResult<Vec<String>> {
        let mut conn = self.conn();
        let mut ids: Vec<String> = conn
            .smembers(self.keys.index_key(user_id, tenant_id))
            .await
            .map_err(|e| hot_error("list_sessions", e))?;
        ids.sort_unstable();
        Ok(ids)
    }

    async fn health_check(&self) -> StorageResult<()> {
        let mut conn = self.conn();
        let response: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| hot_error("health_check", e))?;

        if response == "PONG" {
            Ok(())
        } else {
            Err(StorageError::query(
                Tier::Hot,
                format!("unexpected PING response '{response}'"),
            ))
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

/// Stored timestamp representation (sortable RFC 3339, microsecond precision)
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn hot_error(operation: &'static str, e: RedisError) -> StorageError {
    error!(tier = "hot", backend = "redis", operation, "Redis operation failed: {}", e);
    if e.is_io_error() || e.is_timeout() || e.is_connection_dropped() || e.is_connection_refusal() {
        StorageError::connectivity_from(Tier::Hot, e)
    } else {
        StorageError::query(Tier::Hot, format!("{operation}: {e}"))
    }
}

/// Degrade an undecodable entry to a miss
fn soft_miss(key: &SessionKey, decoded: StorageResult<History>) -> StorageResult<Option<History>> {
    match decoded {
        Ok(history) => Ok(Some(history)),
        Err(e) if e.is_soft_miss() => {
            warn!(session.key = %key, error = %e, "Discarding undecodable session entry");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn decode_field<T: serde::de::DeserializeOwned>(
    stored: &HashMap<String, String>,
    field: &str,
    default: &str,
    context: &'static str,
) -> StorageResult<T> {
    let raw = stored.get(field).map_or(default, String::as_str);
    serde_json::from_str(raw).map_err(|e| StorageError::serialization(context, e))
}

fn decode_timestamp(
    stored: &HashMap<String, String>,
    field: &str,
) -> StorageResult<DateTime<Utc>> {
    let raw = stored.get(field).cloned().unwrap_or_default();
    serde_json::from_value(Value::String(raw))
        .map_err(|e| StorageError::serialization("session timestamp", e))
}

/// Rebuild a History from its hash fields
fn decode_hash(key: &SessionKey, stored: &HashMap<String, String>) -> StorageResult<History> {
    Ok(History {
        session_id: key.session_id.clone(),
        user_id: key.user_id.clone(),
        tenant_id: key.tenant_id.clone(),
        turns: decode_field(stored, fields::TURNS, "[]", "session turns")?,
        metadata: decode_field(stored, fields::METADATA, "{}", "session metadata")?,
        created_at: decode_timestamp(stored, fields::CREATED_AT)?,
        updated_at: decode_timestamp(stored, fields::UPDATED_AT)?,
    })
}
