// ABOUTME: Bounded background queue that writes turns to the cold tier off the request path
// ABOUTME: Worker pool with per-job exponential backoff; terminal failures are only logged
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Cold-write queue
//!
//! `save_turn` hands each turn to [`PersistenceQueue::enqueue`] and returns without
//! waiting. Jobs run on spawned worker tasks, so dropping the request that
//! produced a job never cancels it. A job that still fails after
//! `max_retries` retries is logged at `error` and dropped.

use crate::config::PersistenceConfig;
use crate::history::HistoryStore;
use crate::models::{ConversationUpdate, Message, SessionKey};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// One turn's worth of cold-tier writes
#[derive(Debug, Clone)]
pub struct ColdWrite {
    /// Turn the messages belong to
    pub turn_id: String,
    /// User then assistant message
    pub messages: Vec<Message>,
    /// Conversation upsert
    pub update: ConversationUpdate,
}

impl ColdWrite {
    /// Tenancy key the job writes under
    #[must_use]
    pub fn session_key(&self) -> SessionKey {
        SessionKey::new(
            &self.update.user_id,
            &self.update.session_id,
            Some(&self.update.agent_id),
        )
    }
}

/// Counters since the queue started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Jobs written successfully (possibly after retries)
    pub completed: u64,
    /// Jobs abandoned after exhausting retries
    pub failed: u64,
    /// Jobs accepted but not yet finished
    pub pending: usize,
}

#[derive(Default)]
struct Tracker {
    pending: AtomicUsize,
    deferred: AtomicUsize,
    by_session: DashMap<SessionKey, usize>,
    completed: AtomicU64,
    failed: AtomicU64,
    idle: Notify,
}

impl Tracker {
    fn begin(&self, key: &SessionKey) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        *self.by_session.entry(key.clone()).or_default() += 1;
    }

    fn finish(&self, key: &SessionKey, succeeded: bool) {
        if succeeded {
            self.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(mut count) = self.by_session.get_mut(key) {
            *count = count.saturating_sub(1);
        }
        self.by_session.remove_if(key, |_, count| *count == 0);
        self.pending.fetch_sub(1, Ordering::SeqCst);
        self.idle.notify_waiters();
    }

    /// Wait until no accepted job satisfies `busy`
    async fn wait_until_clear(&self, busy: impl Fn(&SessionKey) -> bool) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.by_session.iter().any(|entry| busy(entry.key())) {
                return;
            }
            notified.await;
        }
    }
}

/// Bounded queue feeding a pool of cold-write workers
pub struct PersistenceQueue {
    sender: mpsc::Sender<ColdWrite>,
    workers: Vec<JoinHandle<()>>,
    tracker: Arc<Tracker>,
    max_deferred: usize,
}

impl PersistenceQueue {
    /// Spawn the worker pool
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(store: Arc<dyn HistoryStore>, config: &PersistenceConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let tracker = Arc::new(Tracker::default());

        let workers = (0..config.workers.max(1))
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    Arc::clone(&receiver),
                    Arc::clone(&store),
                    config.clone(),
                    Arc::clone(&tracker),
                ))
            })
            .collect::<Vec<_>>();

        info!(
            workers = workers.len(),
            queue_capacity = config.queue_capacity,
            backend = store.backend_name(),
            "Persistence queue started"
        );

        Self {
            sender,
            workers,
            tracker,
            max_deferred: config.max_deferred,
        }
    }

    /// Schedule a job without waiting for it to run
    ///
    /// A full queue hands the job to a deferred send. Once `max_deferred` sends
    /// are outstanding, further overflow is dropped and counted as failed.
    pub fn enqueue(&self, job: ColdWrite) {
        let key = job.session_key();
        self.tracker.begin(&key);
        match self.sender.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) => {
                if self.tracker.deferred.fetch_add(1, Ordering::SeqCst) >= self.max_deferred {
                    self.tracker.deferred.fetch_sub(1, Ordering::SeqCst);
                    error!(
                        turn.id = %job.turn_id,
                        session.key = %key,
                        max_deferred = self.max_deferred,
                        "Persistence queue overloaded, cold write dropped"
                    );
                    self.tracker.finish(&key, false);
                    return;
                }
                warn!(turn.id = %job.turn_id, "Persistence queue full, deferring cold write");
                let sender = self.sender.clone();
                let tracker = Arc::clone(&self.tracker);
                tokio::spawn(async move {
                    let sent = sender.send(job).await;
                    tracker.deferred.fetch_sub(1, Ordering::SeqCst);
                    if let Err(rejected) = sent {
                        error!(
                            turn.id = %rejected.0.turn_id,
                            "Persistence queue closed, cold write dropped"
                        );
                        tracker.finish(&key, false);
                    }
                });
            }
            Err(TrySendError::Closed(job)) => {
                error!(turn.id = %job.turn_id, "Persistence queue closed, cold write dropped");
                self.tracker.finish(&key, false);
            }
        }
    }

    /// Wait until every accepted job has finished (written or abandoned)
    pub async fn flush(&self) {
        self.tracker.wait_until_clear(|_| true).await;
    }

    /// Wait until the accepted jobs of one session have finished
    ///
    /// Jobs of other sessions are not waited for. `None` for the agent covers
    /// every agent of the session.
    pub async fn flush_session(
        &self,
        user_id: &str,
        session_id: &str,
        agent_id: Option<&str>,
    ) {
        let tenant = agent_id.filter(|agent| !agent.is_empty());
        self.tracker
            .wait_until_clear(|key| {
                key.user_id == user_id
                    && key.session_id == session_id
                    && (agent_id.is_none() || key.tenant_id.as_deref() == tenant)
            })
            .await;
    }

    /// Current counters
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            completed: self.tracker.completed.load(Ordering::Relaxed),
            failed: self.tracker.failed.load(Ordering::Relaxed),
            pending: self.tracker.pending.load(Ordering::SeqCst),
        }
    }

    /// Stop accepting jobs, drain the queue, and wait for the workers
    pub async fn shutdown(self) {
        let Self {
            sender, workers, ..
        } = self;
        drop(sender);

        for worker in workers {
            if let Err(e) = worker.await {
                error!("Persistence worker terminated abnormally: {}", e);
            }
        }
        info!("Persistence queue drained");
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<ColdWrite>>>,
    store: Arc<dyn HistoryStore>,
    config: PersistenceConfig,
    tracker: Arc<Tracker>,
) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(job) = next else {
            break;
        };
        let succeeded = write_with_retry(store.as_ref(), &config, &job).await;
        tracker.finish(&job.session_key(), succeeded);
    }
    debug!(worker_id, "Persistence worker stopped");
}

async fn write_with_retry(
    store: &dyn HistoryStore,
    config: &PersistenceConfig,
    job: &ColdWrite,
) -> bool {
    let mut attempt = 0;
    loop {
        match store.persist_turn(&job.messages, &job.update).await {
            Ok(inserted) => {
                debug!(
                    turn.id = %job.turn_id,
                    session.id = %job.update.session_id,
                    inserted,
                    attempts = attempt + 1,
                    "Cold write completed"
                );
                return true;
            }
            Err(e) if !e.is_soft_miss() && attempt < config.max_retries => {
                attempt += 1;
                let delay = config.retry_delay(attempt);
                warn!(
                    turn.id = %job.turn_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Cold write failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(
                    tier = "cold",
                    turn.id = %job.turn_id,
                    user.id = %job.update.user_id,
                    session.id = %job.update.session_id,
                    agent.id = %job.update.agent_id,
                    attempts = attempt + 1,
                    error = %e,
                    "Cold write abandoned"
                );
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{StorageError, StorageResult, Tier};
    use crate::history::{ConversationFilter, MessageQuery};
    use crate::models::{Conversation, NewTurn};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Fails the first `failures` writes, then succeeds
    ///
    /// Writes for `held_session` wait for a permit on `gate`.
    struct FlakyStore {
        failures: AtomicUsize,
        writes: AtomicUsize,
        held_session: Option<&'static str>,
        gate: Semaphore,
    }

    impl FlakyStore {
        fn new(failures: usize) -> Self {
            Self {
                failures: AtomicUsize::new(failures),
                writes: AtomicUsize::new(0),
                held_session: None,
                gate: Semaphore::new(0),
            }
        }

        fn holding(session_id: &'static str) -> Self {
            Self {
                held_session: Some(session_id),
                ..Self::new(0)
            }
        }
    }

    #[async_trait]
    impl HistoryStore for FlakyStore {
        async fn ensure_schema(&self) -> StorageResult<()> {
            Ok(())
        }

        async fn persist_turn(
            &self,
            messages: &[Message],
            update: &ConversationUpdate,
        ) -> StorageResult<u64> {
            if self.held_session == Some(update.session_id.as_str()) {
                self.gate.acquire().await.unwrap().forget();
            }
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(StorageError::connectivity(Tier::Cold, "database is locked"));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(messages.len() as u64)
        }

        async fn recent_messages(&self, _query: &MessageQuery) -> StorageResult<Vec<Message>> {
            Ok(Vec::new())
        }

        async fn delete_conversation(
            &self,
            _user_id: &str,
            _session_id: &str,
            _agent_id: Option<&str>,
        ) -> StorageResult<bool> {
            Ok(false)
        }

        async fn list_conversations(
            &self,
            _filter: &ConversationFilter,
        ) -> StorageResult<Vec<Conversation>> {
            Ok(Vec::new())
        }

        async fn get_conversation(&self, _session_id: &str) -> StorageResult<Option<Conversation>> {
            Ok(None)
        }

        async fn reconcile_message_count(
            &self,
            _user_id: &str,
            _session_id: &str,
            _agent_id: Option<&str>,
        ) -> StorageResult<u64> {
            Ok(0)
        }

        async fn health_check(&self) -> StorageResult<()> {
            Ok(())
        }

        async fn close(&self) {}

        fn backend_name(&self) -> &'static str {
            "flaky"
        }
    }

    fn job(turn_id: &str) -> ColdWrite {
        job_in("s1", turn_id)
    }

    fn job_in(session_id: &str, turn_id: &str) -> ColdWrite {
        let turn = NewTurn::new("alice", session_id, "sales", "hi", "hello");
        let now = Utc::now();
        ColdWrite {
            turn_id: turn_id.to_owned(),
            messages: turn.to_messages(turn_id, now).to_vec(),
            update: turn.to_conversation_update(now),
        }
    }

    fn fast_config(max_retries: u32) -> PersistenceConfig {
        PersistenceConfig {
            workers: 2,
            queue_capacity: 1,
            max_deferred: 32,
            max_retries,
            retry_delay_ms: 1,
            max_retry_delay_ms: 4,
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let store = Arc::new(FlakyStore::new(2));
        let queue = PersistenceQueue::start(store.clone(), &fast_config(3));

        queue.enqueue(job("t1"));
        queue.flush().await;

        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        assert_eq!(queue.stats().completed, 1);
        assert_eq!(queue.stats().failed, 0);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_exhausted_retries_are_contained() {
        let store = Arc::new(FlakyStore::new(usize::MAX));
        let queue = PersistenceQueue::start(store.clone(), &fast_config(1));

        queue.enqueue(job("t1"));
        queue.flush().await;

        let stats = queue.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pending, 0);
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_full_queue_defers_instead_of_dropping() {
        let store = Arc::new(FlakyStore::new(0));
        let queue = PersistenceQueue::start(store.clone(), &fast_config(0));

        for i in 0..20 {
            queue.enqueue(job(&format!("t{i}")));
        }
        queue.flush().await;

        assert_eq!(store.writes.load(Ordering::SeqCst), 20);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_overflow_beyond_deferred_cap_is_dropped() {
        let store = Arc::new(FlakyStore::new(0));
        let config = PersistenceConfig {
            max_deferred: 1,
            ..fast_config(0)
        };
        let queue = PersistenceQueue::start(store.clone(), &config);

        // Workers have not run yet: one job fills the channel, one is deferred
        for i in 0..10 {
            queue.enqueue(job(&format!("t{i}")));
        }
        assert_eq!(queue.stats().failed, 8);

        queue.flush().await;
        assert_eq!(store.writes.load(Ordering::SeqCst), 2);
        assert_eq!(queue.stats().completed, 2);
        assert_eq!(queue.stats().pending, 0);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_flush_session_ignores_other_sessions() {
        let store = Arc::new(FlakyStore::holding("busy"));
        let queue = PersistenceQueue::start(store.clone(), &fast_config(0));

        queue.enqueue(job_in("busy", "t1"));
        queue.enqueue(job_in("quiet", "t2"));

        tokio::time::timeout(
            Duration::from_secs(1),
            queue.flush_session("alice", "quiet", Some("sales")),
        )
        .await
        .unwrap();
        assert!(tokio::time::timeout(
            Duration::from_millis(50),
            queue.flush_session("alice", "busy", None),
        )
        .await
        .is_err());
        assert_eq!(queue.stats().pending, 1);

        store.gate.add_permits(1);
        queue.flush_session("alice", "busy", Some("sales")).await;
        assert_eq!(store.writes.load(Ordering::SeqCst), 2);
        queue.shutdown().await;
    }
}
