// ABOUTME: In-process ephemeral session store for tests and single-process deployments
// ABOUTME: Nested (tenant, user) -> session -> History map owned by the store, no TTL
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::SessionStore;
use crate::errors::StorageResult;
use crate::models::{History, Metadata, SessionKey, Turn};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Partition of the store owned by one (tenant, user) pair
type Partition = (Option<String>, String);

/// Ephemeral session store
///
/// Lives as long as the value does. Clones share the same map, so a store can be
/// handed to several components of one process. Entries never expire.
#[derive(Clone, Default)]
pub struct EphemeralSessionStore {
    sessions: Arc<RwLock<HashMap<Partition, HashMap<String, History>>>>,
}

impl EphemeralSessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of Histories across all partitions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.values().map(HashMap::len).sum()
    }

    /// True when no History is stored
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn partition(key: &SessionKey) -> Partition {
        Self::partition_of(&key.user_id, key.tenant_id.as_deref())
    }

    /// Empty and absent tenants share the default partition, as in Redis keys
    fn partition_of(user_id: &str, tenant_id: Option<&str>) -> Partition {
        let tenant = tenant_id.filter(|tenant| !tenant.is_empty());
        (tenant.map(ToOwned::to_owned), user_id.to_owned())
    }
}

#[async_trait]
impl SessionStore for EphemeralSessionStore {
    async fn create(&self, key: &SessionKey) -> StorageResult<History> {
        let mut sessions = self.sessions.write().await;
        let history = sessions
            .entry(Self::partition(key))
            .or_default()
            .entry(key.session_id.clone())
            .or_insert_with(|| History::new(key));
        Ok(history.clone())
    }

    async fn get(&self, key: &SessionKey) -> StorageResult<Option<History>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(&Self::partition(key))
            .and_then(|by_session| by_session.get(&key.session_id))
            .cloned())
    }

    async fn append_turn(&self, key: &SessionKey, turn: &Turn) -> StorageResult<()> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(Self::partition(key))
            .or_default()
            .entry(key.session_id.clone())
            .or_insert_with(|| History::new(key))
            .push_turn(turn.clone());
        Ok(())
    }

    async fn update_metadata(
        &self,
        key: &SessionKey,
        metadata: &Metadata,
    ) -> StorageResult<bool> {
        let mut sessions = self.sessions.write().await;
        let Some(history) = sessions
            .get_mut(&Self::partition(key))
            .and_then(|by_session| by_session.get_mut(&key.session_id))
        else {
            return Ok(false);
        };

        for (field, value) in metadata {
            history.metadata.insert(field.clone(), value.clone());
        }
        history.updated_at = Utc::now();
        Ok(true)
    }

    async fn clear(&self, key: &SessionKey) -> StorageResult<bool> {
        let mut sessions = self.sessions.write().await;
        match sessions
            .get_mut(&Self::partition(key))
            .and_then(|by_session| by_session.get_mut(&key.session_id))
        {
            Some(history) => {
                history.clear_turns();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, key: &SessionKey) -> StorageResult<bool> {
        let mut sessions = self.sessions.write().await;
        let partition = Self::partition(key);
        let Some(by_session) = sessions.get_mut(&partition) else {
            return Ok(false);
        };

        let removed = by_session.remove(&key.session_id).is_some();
        if by_session.is_empty() {
            sessions.remove(&partition);
        }
        Ok(removed)
    }

    async fn list_sessions(
        &self,
        user_id: &str,
        tenant_id: Option<&str>,
    ) -> StorageResult<Vec<String>> {
        let sessions = self.sessions.read().await;
        let partition = Self::partition_of(user_id, tenant_id);
        let mut ids: Vec<String> = sessions
            .get(&partition)
            .map(|by_session| by_session.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn turn(id: &str) -> Turn {
        Turn {
            turn_id: id.to_owned(),
            user_id: "alice".to_owned(),
            user_message: "hi".to_owned(),
            assistant_response: "hello".to_owned(),
            tools_used: Vec::new(),
            timestamp: Utc::now(),
            metadata: Metadata::new(),
        }
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let store = EphemeralSessionStore::new();
        let key = SessionKey::new("alice", "s1", Some("sales"));

        store.append_turn(&key, &turn("t1")).await.unwrap();
        let history = store.create(&key).await.unwrap();

        assert_eq!(history.turns.len(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_metadata_requires_existing_history() {
        let store = EphemeralSessionStore::new();
        let key = SessionKey::new("alice", "s1", None);
        let mut metadata = Metadata::new();
        metadata.insert("channel".to_owned(), json!("slack"));

        assert!(!store.update_metadata(&key, &metadata).await.unwrap());
        store.create(&key).await.unwrap();
        assert!(store.update_metadata(&key, &metadata).await.unwrap());

        let history = store.get(&key).await.unwrap().unwrap();
        assert_eq!(history.metadata["channel"], "slack");
    }

    #[tokio::test]
    async fn test_delete_prunes_empty_partition() {
        let store = EphemeralSessionStore::new();
        let key = SessionKey::new("alice", "s1", None);
        store.create(&key).await.unwrap();

        assert!(store.delete(&key).await.unwrap());
        assert!(!store.delete(&key).await.unwrap());
        assert!(store.is_empty().await);
        assert!(store.sessions.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_tenant_shares_default_partition() {
        let store = EphemeralSessionStore::new();
        let blank = SessionKey {
            tenant_id: Some(String::new()),
            user_id: "alice".to_owned(),
            session_id: "s1".to_owned(),
        };
        store.create(&blank).await.unwrap();

        assert!(store
            .get(&SessionKey::new("alice", "s1", None))
            .await
            .unwrap()
            .is_some());
        assert_eq!(store.list_sessions("alice", Some("")).await.unwrap(), ["s1"]);
        assert_eq!(store.list_sessions("alice", None).await.unwrap(), ["s1"]);
    }
}
