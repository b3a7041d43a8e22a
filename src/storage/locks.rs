// ABOUTME: Per-session async write locks for the hot-tier append path
// ABOUTME: Serializes concurrent save_turn calls that target the same tenancy key
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::models::SessionKey;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock table keyed by tenancy key
///
/// Only writers take these locks; reads stay lock-free. An entry lives only
/// while some writer holds or waits on it, so the table stays as small as the
/// number of sessions being written right now.
#[derive(Default)]
pub struct SessionLocks {
    locks: DashMap<SessionKey, Arc<Mutex<()>>>,
}

/// Exclusive write access to one session
///
/// Dropping the guard unlocks the session and removes its table entry when no
/// other writer is waiting.
pub struct SessionGuard<'a> {
    table: &'a DashMap<SessionKey, Arc<Mutex<()>>>,
    key: SessionKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.table
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl SessionLocks {
    /// Create an empty lock table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive write access to one session
    pub async fn acquire(&self, key: &SessionKey) -> SessionGuard<'_> {
        let lock = Arc::clone(self.locks.entry(key.clone()).or_default().value());
        let guard = lock.lock_owned().await;
        SessionGuard {
            table: &self.locks,
            key: key.clone(),
            guard: Some(guard),
        }
    }

    /// Number of sessions with a writer holding or waiting on the lock
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// True when no session is locked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(SessionLocks::new());
        let key = SessionKey::new("alice", "s1", Some("sales"));

        let guard = locks.acquire(&key).await;
        let contender = {
            let locks = Arc::clone(&locks);
            let key = key.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&key).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());
        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_other_tenant_is_independent() {
        let locks = SessionLocks::new();
        let _sales = locks.acquire(&SessionKey::new("alice", "s1", Some("sales"))).await;
        let _support = locks
            .acquire(&SessionKey::new("alice", "s1", Some("support")))
            .await;

        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_released_entries_are_removed() {
        let locks = SessionLocks::new();
        let held = locks.acquire(&SessionKey::new("alice", "s1", None)).await;
        for i in 0..100 {
            drop(locks.acquire(&SessionKey::new("alice", &format!("s{}", i + 2), None)).await);
        }

        assert_eq!(locks.len(), 1);
        drop(held);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_entry_survives_while_a_waiter_remains() {
        let locks = Arc::new(SessionLocks::new());
        let key = SessionKey::new("alice", "s1", Some("sales"));

        let first = locks.acquire(&key).await;
        let waiter = {
            let locks = Arc::clone(&locks);
            let key = key.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&key).await;
                tokio::time::sleep(Duration::from_millis(10)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        assert_eq!(locks.len(), 1);
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }
}
