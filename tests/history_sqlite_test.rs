// ABOUTME: Integration tests for the SQLite history store
// ABOUTME: Covers ordering, limits, tenancy filters, listing, deletion, and count reconciliation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use anyhow::Result;
use chatstore::history::{ConversationFilter, HistoryStore, MessageQuery, SqliteHistoryStore};
use chatstore::models::{
    AgentOutput, MessageRole, Metadata, NewTurn, OutputMode, Source, ToolCall,
};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde_json::json;

async fn persist(
    store: &SqliteHistoryStore,
    turn: &NewTurn,
    turn_id: &str,
    at: DateTime<Utc>,
) -> Result<u64> {
    let messages = turn.to_messages(turn_id, at);
    Ok(store
        .persist_turn(&messages, &turn.to_conversation_update(at))
        .await?)
}

fn query(user_id: &str, session_id: &str, agent_id: Option<&str>, limit: usize) -> MessageQuery {
    MessageQuery {
        user_id: user_id.to_owned(),
        session_id: session_id.to_owned(),
        agent_id: agent_id.map(ToOwned::to_owned),
        limit,
    }
}

fn filter(user_id: &str, agent_id: Option<&str>, limit: usize) -> ConversationFilter {
    ConversationFilter {
        user_id: user_id.to_owned(),
        agent_id: agent_id.map(ToOwned::to_owned),
        limit,
        since: None,
    }
}

#[tokio::test]
async fn test_recent_messages_oldest_first_with_limit() -> Result<()> {
    let store = common::sqlite_history().await?;
    let start = Utc::now() - Duration::minutes(10);

    for i in 0..4 {
        let turn = NewTurn::new("alice", "s1", "sales", format!("q{i}"), format!("a{i}"));
        persist(&store, &turn, &format!("t{i}"), start + Duration::seconds(i)).await?;
    }

    let all = store.recent_messages(&query("alice", "s1", Some("sales"), 100)).await?;
    let contents: Vec<&str> = all.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["q0", "a0", "q1", "a1", "q2", "a2", "q3", "a3"]);

    let recent = store.recent_messages(&query("alice", "s1", Some("sales"), 3)).await?;
    let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["a2", "q3", "a3"]);
    Ok(())
}

#[tokio::test]
async fn test_same_timestamp_keeps_user_before_assistant() -> Result<()> {
    let store = common::sqlite_history().await?;
    let turn = NewTurn::new("alice", "s1", "sales", "hi", "hello");
    persist(&store, &turn, "t1", Utc::now()).await?;

    let messages = store.recent_messages(&query("alice", "s1", None, 10)).await?;

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[0].message_id, "t1_user");
    assert_eq!(messages[1].role, MessageRole::Assistant);
    assert_eq!(messages[1].turn_id(), Some("t1"));
    Ok(())
}

#[tokio::test]
async fn test_agent_filter_and_dual_tenant() -> Result<()> {
    let store = common::sqlite_history().await?;
    let now = Utc::now();

    persist(&store, &NewTurn::new("alice", "s1", "sales", "sq", "sa"), "t1", now).await?;
    persist(
        &store,
        &NewTurn::new("alice", "s1", "support", "pq", "pa"),
        "t2",
        now + Duration::seconds(1),
    )
    .await?;

    let sales = store.recent_messages(&query("alice", "s1", Some("sales"), 10)).await?;
    assert_eq!(sales.len(), 2);
    assert!(sales.iter().all(|m| m.agent_id == "sales"));

    let both = store.recent_messages(&query("alice", "s1", None, 10)).await?;
    assert_eq!(both.len(), 4);

    let conversations = store.list_conversations(&filter("alice", None, 10)).await?;
    assert_eq!(conversations.len(), 2);
    assert_eq!(conversations[0].agent_id, "support");

    let bob = store.recent_messages(&query("bob", "s1", None, 10)).await?;
    assert!(bob.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_conversation_summary_tracks_latest_turn() -> Result<()> {
    let store = common::sqlite_history().await?;
    let start = Utc::now() - Duration::minutes(1);

    let first = NewTurn::new("alice", "s1", "sales", "  How did   Q3 revenue look? ", "Up 12%")
        .with_model("gpt-4o", "openai");
    persist(&store, &first, "t1", start).await?;
    let second = NewTurn::new("alice", "s1", "sales", "And Q4?", "Flat");
    persist(&store, &second, "t2", start + Duration::seconds(5)).await?;

    let conversation = store.get_conversation("s1").await?.unwrap();
    assert_eq!(conversation.title, "How did Q3 revenue look?");
    assert_eq!(conversation.message_count, 4);
    assert_eq!(conversation.last_user_message.as_deref(), Some("And Q4?"));
    assert_eq!(conversation.last_assistant_message.as_deref(), Some("Flat"));
    assert_eq!(conversation.model.as_deref(), Some("gpt-4o"));
    assert!(conversation.updated_at > conversation.created_at);
    Ok(())
}

#[tokio::test]
async fn test_late_retry_does_not_rewind_summary() -> Result<()> {
    let store = common::sqlite_history().await?;
    let start = Utc::now() - Duration::minutes(1);

    let newer = NewTurn::new("alice", "s1", "sales", "newer", "newer answer");
    persist(&store, &newer, "t2", start + Duration::seconds(10)).await?;
    let older = NewTurn::new("alice", "s1", "sales", "older", "older answer");
    persist(&store, &older, "t1", start).await?;

    let conversation = store.get_conversation("s1").await?.unwrap();
    assert_eq!(conversation.last_user_message.as_deref(), Some("newer"));
    assert_eq!(conversation.message_count, 4);

    let messages = store.recent_messages(&query("alice", "s1", None, 10)).await?;
    assert_eq!(messages[0].content, "older");
    Ok(())
}

#[tokio::test]
async fn test_list_conversations_since_and_limit() -> Result<()> {
    let store = common::sqlite_history().await?;
    let now = Utc::now();

    for (i, session) in ["old", "mid", "new"].iter().enumerate() {
        let at = now - Duration::days(2) + Duration::days(i64::try_from(i)?);
        persist(&store, &NewTurn::new("alice", *session, "sales", "q", "a"), session, at).await?;
    }

    let recent = store
        .list_conversations(&ConversationFilter {
            since: Some(now - Duration::hours(30)),
            ..filter("alice", Some("sales"), 10)
        })
        .await?;
    let sessions: Vec<&str> = recent.iter().map(|c| c.session_id.as_str()).collect();
    assert_eq!(sessions, ["new", "mid"]);

    let limited = store.list_conversations(&filter("alice", Some("sales"), 1)).await?;
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].session_id, "new");

    assert!(store
        .list_conversations(&filter("alice", Some("support"), 10))
        .await?
        .is_empty());
    Ok(())
}

#[tokio::test]
async fn test_assistant_payload_round_trips() -> Result<()> {
    let store = common::sqlite_history().await?;
    let mut metadata = Metadata::new();
    metadata.insert("channel".to_owned(), json!("slack"));

    let turn = NewTurn::new("alice", "s1", "sales", "top customers?", "Here they are")
        .with_tool_calls(vec![ToolCall::success("run_sql", json!({"query": "SELECT 1"}))])
        .with_sources(vec![Source {
            content: "crm export".to_owned(),
            metadata: Metadata::new(),
        }])
        .with_output(AgentOutput::Tabular {
            columns: vec!["name".to_owned(), "revenue".to_owned()],
            rows: vec![vec![json!("Acme"), json!(1200)]],
        })
        .with_structured_data(json!({"chart": "bar"}))
        .with_code("SELECT name, revenue FROM customers")
        .with_model("claude", "anthropic")
        .with_response_time_ms(840)
        .with_metadata(metadata);
    let expected = turn.to_messages("t1", Utc::now().trunc_subsecs(6));
    store
        .persist_turn(&expected, &turn.to_conversation_update(expected[0].timestamp))
        .await?;

    let messages = store.recent_messages(&query("alice", "s1", Some("sales"), 2)).await?;

    assert_eq!(messages[1].output_mode, Some(OutputMode::Tabular));
    assert_eq!(messages[1].tool_calls[0].name, "run_sql");
    assert_eq!(messages[1].response_time_ms, Some(840));
    assert_eq!(messages[0].metadata["channel"], "slack");
    assert_eq!(messages[1].timestamp, expected[1].timestamp);
    assert_eq!(messages.as_slice(), expected.as_slice());
    Ok(())
}

#[tokio::test]
async fn test_delete_conversation_reports_existence() -> Result<()> {
    let store = common::sqlite_history().await?;
    persist(&store, &NewTurn::new("alice", "s1", "sales", "q", "a"), "t1", Utc::now()).await?;
    persist(&store, &NewTurn::new("alice", "s2", "sales", "q", "a"), "t2", Utc::now()).await?;

    assert!(!store.delete_conversation("alice", "s1", Some("support")).await?);
    assert!(store.delete_conversation("alice", "s1", Some("sales")).await?);
    assert!(!store.delete_conversation("alice", "s1", Some("sales")).await?);

    assert!(store.recent_messages(&query("alice", "s1", None, 10)).await?.is_empty());
    assert!(store.get_conversation("s1").await?.is_none());
    assert!(store.get_conversation("s2").await?.is_some());
    Ok(())
}

#[tokio::test]
async fn test_reconcile_repairs_drifted_count() -> Result<()> {
    let store = common::sqlite_history().await?;
    persist(&store, &NewTurn::new("alice", "s1", "sales", "q", "a"), "t1", Utc::now()).await?;

    sqlx::query("UPDATE chat_conversations SET message_count = 99")
        .execute(store.pool())
        .await?;

    let updated = store.reconcile_message_count("alice", "s1", Some("sales")).await?;

    assert_eq!(updated, 1);
    assert_eq!(store.get_conversation("s1").await?.unwrap().message_count, 2);
    Ok(())
}

#[tokio::test]
async fn test_health_check_and_close() -> Result<()> {
    let store = common::sqlite_history().await?;
    store.health_check().await?;
    assert_eq!(store.backend_name(), "sqlite");

    store.close().await;

    let err = store.health_check().await.unwrap_err();
    assert!(err.is_connectivity());
    Ok(())
}
