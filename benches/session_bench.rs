// ABOUTME: Criterion benchmarks for the hot-tier save and context read paths
// ABOUTME: Measures ephemeral session appends, history reads, and full ChatStorage round trips
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Criterion benchmarks for conversation storage.
//!
//! Uses the ephemeral session store so results measure engine overhead rather
//! than network latency.

#![allow(
    clippy::missing_docs_in_private_items,
    clippy::unwrap_used,
    missing_docs
)]

use chatstore::config::StorageConfig;
use chatstore::models::{Metadata, NewTurn, SessionKey, Turn};
use chatstore::session::{EphemeralSessionStore, SessionStore};
use chatstore::ChatStorage;
use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use tokio::runtime::Runtime;

/// History lengths read back in the context benchmark
const HISTORY_TURNS: [usize; 3] = [10, 100, 1_000];

fn make_turn(index: usize) -> Turn {
    Turn {
        turn_id: format!("turn-{index}"),
        user_id: "bench-user".to_owned(),
        user_message: "What was revenue by region last quarter?".to_owned(),
        assistant_response: "x".repeat(500),
        tools_used: vec!["run_sql".to_owned()],
        timestamp: Utc::now(),
        metadata: Metadata::new(),
    }
}

/// Benchmark appending turns to ephemeral sessions
fn bench_session_append(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("session_append");
    let store = EphemeralSessionStore::new();
    let turn = make_turn(0);

    group.throughput(Throughput::Elements(1));
    group.bench_function("memory", |b| {
        let mut session_index = 0_usize;
        b.iter(|| {
            // Fresh session every 50 appends so History growth stays bounded
            let key = SessionKey::new(
                "bench-user",
                &format!("session-{}", session_index / 50),
                Some("bench-agent"),
            );
            session_index = session_index.wrapping_add(1);
            rt.block_on(async { store.append_turn(black_box(&key), black_box(&turn)).await })
        });
    });

    group.finish();
}

/// Benchmark reading a session back as agent context
fn bench_context_read(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("context_read");

    for turns in HISTORY_TURNS {
        let store = Arc::new(EphemeralSessionStore::new());
        let storage = ChatStorage::new(StorageConfig::default()).with_session_store(store.clone());
        let key = SessionKey::new("bench-user", "session", Some("bench-agent"));
        rt.block_on(async {
            for i in 0..turns {
                let _ = store.append_turn(&key, &make_turn(i)).await;
            }
            storage.initialize().await;
        });

        group.bench_with_input(BenchmarkId::new("memory", turns), &turns, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    storage
                        .get_context_for_agent(
                            black_box("bench-user"),
                            black_box("session"),
                            Some("bench-agent"),
                            Some(10),
                            None,
                        )
                        .await
                })
            });
        });
    }

    group.finish();
}

/// Benchmark the full save path with both tiers in memory
fn bench_save_turn(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("save_turn");
    let storage = ChatStorage::new(StorageConfig::in_memory());
    rt.block_on(storage.initialize());

    group.throughput(Throughput::Elements(1));
    group.bench_function("memory_and_sqlite", |b| {
        let mut index = 0_usize;
        b.iter(|| {
            let session = format!("session-{}", index / 50);
            index = index.wrapping_add(1);
            rt.block_on(async {
                storage
                    .save_turn(NewTurn::new(
                        "bench-user",
                        session,
                        "bench-agent",
                        "What was revenue by region last quarter?",
                        "Revenue grew in every region.",
                    ))
                    .await
            })
        });
    });

    rt.block_on(async {
        storage.flush_pending_writes().await;
        storage.close().await;
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_session_append,
    bench_context_read,
    bench_save_turn,
);
criterion_main!(benches);
