//! Tests for engine module

use super::*;
use crate::error::Error;
use crate::http::{RetryConfig, ScriptedTransport};
use crate::queries::StaticTemplates;
use crate::types::LogLevel;
use chrono::TimeZone;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::time::Duration;
use test_case::test_case;

const ORDERS_QUERY: &str = "query { orders(updated_from: $updated_from) { data(first: 100, after: $cursor) { edges { node { id updated_at } } pageInfo { endCursor hasNextPage } } } }";
const VENDORS_QUERY: &str = "query { vendors { data(first: 100, after: $cursor) { edges { node { id } } pageInfo { endCursor hasNextPage } } } }";
const SHIPMENTS_QUERY: &str = "query { shipments(date_from: $date_from, date_to: $date_to) { data(first: 100, after: $cursor) { edges { node { id created_date } } } } }";
const HISTORY_QUERY: &str = "query { order_history(order_id: $order_id) { data(first: 100, after: $cursor) { edges { node { id } } } } }";
const PICKS_QUERY: &str = "query { picks_per_day(date_from: $date_from, date_to: $date_to) { data(first: 100, after: $cursor) { edges { node { id } } } } }";

fn page(key: &str, nodes: Vec<Value>, cursor: Option<&str>, has_next: bool) -> Value {
    let edges: Vec<Value> = nodes.into_iter().map(|n| json!({"node": n})).collect();
    json!({
        "data": {
            key: {
                "data": {
                    "edges": edges,
                    "pageInfo": {"endCursor": cursor, "hasNextPage": has_next}
                }
            }
        }
    })
}

fn templates() -> Arc<StaticTemplates> {
    Arc::new(
        StaticTemplates::new()
            .with_template("orders", ORDERS_QUERY)
            .with_template("vendors", VENDORS_QUERY)
            .with_template("shipments", SHIPMENTS_QUERY)
            .with_template("order_history", HISTORY_QUERY)
            .with_template("line_item_pick", PICKS_QUERY),
    )
}

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
}

fn engine(transport: &Arc<ScriptedTransport>) -> SyncEngine {
    SyncEngine::new(transport.clone(), templates(), StateManager::in_memory()).with_now(fixed_now())
}

fn vendors() -> StreamDefinition {
    StreamDefinition::new("vendors", PaginationMode::CursorOnly)
}

fn orders() -> StreamDefinition {
    StreamDefinition::new("orders", PaginationMode::IncrementalTimestamp)
        .with_replication_key("updated_at")
}

fn shipments() -> StreamDefinition {
    StreamDefinition::new("shipments", PaginationMode::DateRange)
        .with_replication_key("created_date")
}

fn order_history() -> StreamDefinition {
    StreamDefinition::new(
        "order_history",
        PaginationMode::ChildContext {
            parent_stream: "orders".to_string(),
            parent_key: "id".to_string(),
        },
    )
}

fn start_date() -> Option<DateTime<Utc>> {
    Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
}

/// Run a stream, collecting every emitted message
async fn collect(
    engine: &mut SyncEngine,
    stream: &StreamDefinition,
    parent_id: Option<&str>,
) -> (Result<StreamRun>, Vec<Message>) {
    let mut messages = Vec::new();
    let result = engine
        .sync_stream(stream, parent_id, &mut |m: Message| {
            messages.push(m);
            Ok(())
        })
        .await;
    (result, messages)
}

fn records(messages: &[Message]) -> Vec<Value> {
    messages.iter().filter_map(Message::as_record).cloned().collect()
}

fn state_count(messages: &[Message]) -> usize {
    messages.iter().filter(|m| m.is_state()).count()
}

// ============================================================================
// Message Tests
// ============================================================================

#[test]
fn test_message_kinds() {
    let msg = Message::record("orders", json!({"id": 1}), fixed_now());
    assert!(msg.is_record());
    assert!(!msg.is_state());
    assert!(!msg.is_log());

    let msg = Message::state(json!({"bookmarks": {}}));
    assert!(msg.is_state());
    assert!(msg.as_record().is_none());

    for msg in [Message::info("a"), Message::warn("b"), Message::error("c")] {
        assert!(msg.is_log());
    }
}

#[test]
fn test_message_json_lines() {
    let line = Message::record("orders", json!({"id": 1}), fixed_now())
        .to_json_line()
        .unwrap();
    assert_eq!(
        line,
        r#"{"type":"RECORD","stream":"orders","record":{"id":1},"time_extracted":"2024-03-10T12:00:00.000000Z"}"#
    );

    let line = Message::state(json!({"bookmarks": {}})).to_json_line().unwrap();
    assert_eq!(line, r#"{"type":"STATE","value":{"bookmarks":{}}}"#);

    let line = Message::log(LogLevel::Warn, "careful").to_json_line().unwrap();
    assert_eq!(line, r#"{"type":"LOG","level":"WARN","message":"careful"}"#);
}

// ============================================================================
// SyncConfig / SyncStats Tests
// ============================================================================

#[test]
fn test_sync_config_default() {
    let config = SyncConfig::default();
    assert!(config.start_date.is_none());
    assert!(config.emit_state_per_page);
    assert!(config.fail_fast);
}

#[test]
fn test_sync_config_builder() {
    let config = SyncConfig::new()
        .with_start_date(start_date())
        .with_state_per_page(false)
        .with_fail_fast(false);

    assert_eq!(config.start_date, start_date());
    assert!(!config.emit_state_per_page);
    assert!(!config.fail_fast);
}

#[test]
fn test_sync_stats() {
    let mut stats = SyncStats::new();
    stats.add_records(10);
    stats.add_records(5);
    stats.add_page();
    stats.add_stream();
    stats.add_error();
    stats.set_duration(1500);

    assert_eq!(stats.records_synced, 15);
    assert_eq!(stats.pages_fetched, 1);
    assert_eq!(stats.streams_synced, 1);
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.duration_ms, 1500);
}

// ============================================================================
// Pagination Loop Tests
// ============================================================================

#[tokio::test]
async fn test_first_page_record_and_cursor_follow_up() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .with_json(json!({"data":{"vendors":{"data":{"edges":[{"node":{"id":1}}],"pageInfo":{"endCursor":"abc","hasNextPage":true}}}}}))
            .with_json(page("vendors", vec![json!({"id": 2})], Some("def"), false)),
    );
    let mut engine = engine(&transport);

    let (result, messages) = collect(&mut engine, &vendors(), None).await;
    let run = result.unwrap();

    assert_eq!(run, StreamRun { pages: 2, records: 2 });
    assert_eq!(records(&messages), vec![json!({"id": 1}), json!({"id": 2})]);

    let queries = transport.queries();
    assert_eq!(queries.len(), 2);
    assert!(queries[0].contains("data(first: 100)"));
    assert!(!queries[0].contains("after"));
    assert!(queries[1].contains(r#"data(first: 100, after: "abc")"#));
}

#[test_case(1; "single page")]
#[test_case(3; "three pages")]
#[test_case(6; "six pages")]
#[tokio::test]
async fn test_issues_exactly_one_request_per_page(pages: usize) {
    let transport = ScriptedTransport::new();
    for i in 1..=pages {
        let cursor = format!("c{i}");
        transport.push(Ok(crate::http::TransportResponse::ok(
            page("vendors", vec![json!({"id": i})], Some(&cursor), i < pages).to_string(),
        )));
    }
    let transport = Arc::new(transport);
    let mut engine = engine(&transport);

    let (result, messages) = collect(&mut engine, &vendors(), None).await;

    assert_eq!(result.unwrap().pages, pages);
    assert_eq!(transport.request_count(), pages);
    assert_eq!(records(&messages).len(), pages);
    assert_eq!(engine.stats().pages_fetched, pages);
}

#[tokio::test]
async fn test_empty_data_is_an_empty_page() {
    let transport = Arc::new(ScriptedTransport::new().with_json(json!({"data": {}})));
    let mut engine = engine(&transport);

    let (result, messages) = collect(&mut engine, &vendors(), None).await;

    assert_eq!(result.unwrap(), StreamRun { pages: 1, records: 0 });
    assert_eq!(transport.request_count(), 1);
    assert!(records(&messages).is_empty());
    assert_eq!(state_count(&messages), 1);
}

#[tokio::test]
async fn test_envelope_alias() {
    let stream = StreamDefinition::new("line_item_pick", PaginationMode::DateRange)
        .with_envelope_key("picks_per_day");
    let transport = Arc::new(
        ScriptedTransport::new().with_json(page("picks_per_day", vec![json!({"id": "p1"})], None, false)),
    );
    let mut engine =
        engine(&transport).with_config(SyncConfig::new().with_start_date(start_date()));

    let (result, messages) = collect(&mut engine, &stream, None).await;

    result.unwrap();
    assert_eq!(records(&messages), vec![json!({"id": "p1"})]);
    assert!(transport.queries()[0].contains("picks_per_day("));
}

#[tokio::test]
async fn test_missing_template_fails_before_sending() {
    let transport = Arc::new(ScriptedTransport::new());
    let mut engine = engine(&transport);
    let stream = StreamDefinition::new("returns", PaginationMode::CursorOnly);

    let (result, _) = collect(&mut engine, &stream, None).await;

    assert!(matches!(result, Err(Error::TemplateNotFound { .. })));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_consumer_error_stops_the_run() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .with_json(page("vendors", vec![json!({"id": 1})], Some("abc"), true))
            .with_json(page("vendors", vec![json!({"id": 2})], None, false)),
    );
    let mut engine = engine(&transport);

    let result = engine
        .sync_stream(&vendors(), None, &mut |_: Message| Err(Error::Other("stdout closed".into())))
        .await;

    assert!(result.unwrap_err().to_string().contains("stdout closed"));
    assert_eq!(transport.request_count(), 1);
}

// ============================================================================
// Parameter Resolution Tests
// ============================================================================

#[tokio::test]
async fn test_date_range_without_start_fails_before_any_request() {
    let transport = Arc::new(ScriptedTransport::new());
    let mut engine = engine(&transport);

    let (result, messages) = collect(&mut engine, &shipments(), None).await;

    assert!(matches!(result, Err(Error::Config { .. })));
    assert_eq!(transport.request_count(), 0);
    assert!(messages.is_empty());
}

#[tokio::test]
async fn test_incremental_without_start_fails_before_any_request() {
    let transport = Arc::new(ScriptedTransport::new());
    let mut engine = engine(&transport);

    let (result, _) = collect(&mut engine, &orders(), None).await;

    assert!(matches!(result, Err(Error::Config { .. })));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_date_range_window() {
    let transport = Arc::new(
        ScriptedTransport::new().with_json(page("shipments", vec![], None, false)),
    );
    let mut engine =
        engine(&transport).with_config(SyncConfig::new().with_start_date(start_date()));

    let (result, _) = collect(&mut engine, &shipments(), None).await;
    result.unwrap();

    let query = &transport.queries()[0];
    assert!(query.contains(r#"shipments(date_from: "2024-01-01", date_to: "2024-03-11")"#));
}

#[tokio::test]
async fn test_date_range_starts_at_later_bookmark() {
    let state = StateManager::from_json(
        r#"{"bookmarks": {"shipments": {"replication_key": "created_date",
            "replication_key_value": "2024-02-15T08:30:00"}}}"#,
    )
    .unwrap();
    let transport = Arc::new(
        ScriptedTransport::new().with_json(page("shipments", vec![], None, false)),
    );
    let mut engine = SyncEngine::new(transport.clone(), templates(), state)
        .with_now(fixed_now())
        .with_config(SyncConfig::new().with_start_date(start_date()));

    let params = engine.initial_parameters(&shipments(), None).await;
    assert_eq!(
        params.date_window.unwrap().from,
        chrono::NaiveDate::from_ymd_opt(2024, 2, 15).unwrap()
    );

    let (result, _) = collect(&mut engine, &shipments(), None).await;
    result.unwrap();
    assert!(transport.queries()[0].contains(r#"date_from: "2024-02-15""#));
}

#[tokio::test]
async fn test_child_parameters_bind_parent_id() {
    let transport = Arc::new(ScriptedTransport::new());
    let engine = engine(&transport);

    let params = engine.initial_parameters(&order_history(), Some("T3JkZXI6MQ==")).await;
    assert_eq!(params.parent_id.as_deref(), Some("T3JkZXI6MQ=="));

    let params = engine.initial_parameters(&vendors(), Some("ignored")).await;
    assert_eq!(params, PaginationParameters::new());
}

// ============================================================================
// Bookmark and State Tests
// ============================================================================

#[tokio::test]
async fn test_bookmark_advances_and_state_emitted_per_page() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .with_json(page(
                "orders",
                vec![
                    json!({"id": "a", "updated_at": "2024-02-01T00:00:00+00:00"}),
                    json!({"id": "b", "updated_at": "2024-02-03T00:00:00+00:00"}),
                ],
                Some("abc"),
                true,
            ))
            .with_json(page(
                "orders",
                vec![json!({"id": "c", "updated_at": "2024-02-02T00:00:00+00:00"})],
                None,
                false,
            )),
    );
    let mut engine =
        engine(&transport).with_config(SyncConfig::new().with_start_date(start_date()));

    let (result, messages) = collect(&mut engine, &orders(), None).await;
    result.unwrap();

    assert!(transport.queries()[0].contains(r#"orders(updated_from: "2024-01-01T00:00:00Z")"#));

    // One checkpoint after the first page, one at the end
    assert_eq!(state_count(&messages), 2);
    let Message::State { value } = &messages[2] else {
        panic!("expected a checkpoint after page one, got {:?}", messages[2]);
    };
    assert_eq!(
        value["bookmarks"]["orders"]["replication_key_value"],
        json!("2024-02-03T00:00:00+00:00")
    );

    // A later record on page two never moves the bookmark backwards
    assert_eq!(
        engine.state().bookmark("orders").await,
        Some("2024-02-03T00:00:00+00:00".to_string())
    );
}

#[tokio::test]
async fn test_state_only_at_end_when_page_checkpoints_disabled() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .with_json(page("vendors", vec![json!({"id": 1})], Some("abc"), true))
            .with_json(page("vendors", vec![json!({"id": 2})], None, false)),
    );
    let mut engine =
        engine(&transport).with_config(SyncConfig::new().with_state_per_page(false));

    let (result, messages) = collect(&mut engine, &vendors(), None).await;
    result.unwrap();

    assert_eq!(state_count(&messages), 1);
    assert!(messages.last().unwrap().is_state());
}

#[tokio::test]
async fn test_bookmark_feeds_next_run() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .with_json(page(
                "orders",
                vec![json!({"id": "a", "updated_at": "2024-02-02T10:00:00Z"})],
                None,
                false,
            ))
            .with_json(page("orders", vec![], None, false)),
    );
    let mut engine =
        engine(&transport).with_config(SyncConfig::new().with_start_date(start_date()));

    collect(&mut engine, &orders(), None).await.0.unwrap();
    collect(&mut engine, &orders(), None).await.0.unwrap();

    let queries = transport.queries();
    assert!(queries[1].contains(r#"orders(updated_from: "2024-02-02T10:00:00Z")"#));
}

// ============================================================================
// Child Stream Tests
// ============================================================================

#[tokio::test]
async fn test_child_stream_runs_once_per_parent_skipping_completed() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .with_json(page("order_history", vec![json!({"id": "h1"})], None, false))
            .with_json(page("order_history", vec![json!({"id": "h3"})], None, false)),
    );
    let mut engine = engine(&transport);
    engine.state().mark_parent_completed("order_history", "o2").await;

    let parents = vec![
        ParentContext::new("orders", "o1"),
        ParentContext::new("orders", "o2"),
        ParentContext::new("orders", "o3"),
    ];
    let mut messages = Vec::new();
    let run = engine
        .sync_child_stream(&order_history(), &parents, &mut |m: Message| {
            messages.push(m);
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(run, StreamRun { pages: 2, records: 2 });
    let queries = transport.queries();
    assert_eq!(queries.len(), 2);
    assert!(queries[0].contains(r#"order_history(order_id: "o1")"#));
    assert!(queries[1].contains(r#"order_history(order_id: "o3")"#));

    assert_eq!(engine.stats().parents_synced, 2);
    assert_eq!(engine.stats().parents_skipped, 1);
    assert!(!engine.state().is_parent_completed("order_history", "o2").await);
    assert!(messages.last().unwrap().is_state());
}

#[tokio::test]
async fn test_child_stream_fail_fast_keeps_progress() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .with_json(page("order_history", vec![json!({"id": "h1"})], None, false))
            .with_error(Error::auth("token revoked")),
    );
    let mut engine = engine(&transport);

    let parents = vec![
        ParentContext::new("orders", "o1"),
        ParentContext::new("orders", "o2"),
    ];
    let result = engine
        .sync_child_stream(&order_history(), &parents, &mut |_: Message| Ok(()))
        .await;

    assert!(matches!(result, Err(Error::Auth { .. })));
    assert!(engine.state().is_parent_completed("order_history", "o1").await);
    assert!(!engine.state().is_parent_completed("order_history", "o2").await);
}

#[tokio::test]
async fn test_child_stream_continues_past_failure_without_fail_fast() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .with_error(Error::auth("token revoked"))
            .with_json(page("order_history", vec![json!({"id": "h2"})], None, false)),
    );
    let mut engine = engine(&transport).with_config(SyncConfig::new().with_fail_fast(false));

    let parents = vec![
        ParentContext::new("orders", "o1"),
        ParentContext::new("orders", "o2"),
    ];
    let mut messages = Vec::new();
    let result = engine
        .sync_child_stream(&order_history(), &parents, &mut |m: Message| {
            messages.push(m);
            Ok(())
        })
        .await;

    let err = result.unwrap_err();
    assert!(matches!(
        err,
        Error::ParentsFailed { failed: 1, total: 2, .. }
    ));
    assert_eq!(messages.iter().filter(|m| m.is_record()).count(), 1);
    assert_eq!(engine.stats().errors, 1);
    assert!(messages.iter().any(|m| matches!(
        m,
        Message::Log { level: LogLevel::Error, message } if message.contains("o1")
    )));

    // The failed parent stays pending for the next run
    assert!(engine.state().is_parent_completed("order_history", "o2").await);
    assert_eq!(
        engine.state().pending_parents("order_history").await,
        vec!["o1".to_string(), "o2".to_string()]
    );
    let last_state = messages.iter().rev().find(|m| m.is_state()).unwrap();
    assert_eq!(
        last_state,
        &Message::state(json!({"bookmarks": {"order_history": {
            "completed_parents": ["o2"],
            "pending_parents": ["o1", "o2"]
        }}}))
    );
}

#[tokio::test]
async fn test_parent_ids_recorded_before_parent_checkpoint() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .with_json(page(
                "orders",
                vec![json!({"id": "o1", "updated_at": "2024-02-02T00:00:00Z"})],
                Some("c1"),
                true,
            ))
            .with_json(page(
                "orders",
                vec![json!({"id": "o2", "updated_at": "2024-02-01T00:00:00Z"})],
                None,
                false,
            )),
    );
    let mut engine =
        engine(&transport).with_config(SyncConfig::new().with_start_date(start_date()));

    let mut routers = vec![ParentRouter::for_child(&order_history()).unwrap()];
    let mut states = Vec::new();
    engine
        .sync_parent_stream(&orders(), &mut routers, &mut |m: Message| {
            if let Message::State { value } = m {
                states.push(value);
            }
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(routers[0].len(), 2);
    assert_eq!(states.len(), 2);
    assert_eq!(
        states[0]["bookmarks"]["order_history"]["pending_parents"],
        json!(["o1"])
    );
    assert_eq!(
        states[1]["bookmarks"]["order_history"]["pending_parents"],
        json!(["o1", "o2"])
    );
    assert_eq!(
        states[1]["bookmarks"]["orders"]["replication_key_value"],
        json!("2024-02-02T00:00:00Z")
    );
}

#[tokio::test]
async fn test_failed_parent_replayed_after_bookmark_moved_past_it() {
    let transport = Arc::new(
        ScriptedTransport::new()
            // First run: two parents, the child fails on o2
            .with_json(page(
                "orders",
                vec![
                    json!({"id": "o1", "updated_at": "2024-02-02T00:00:00Z"}),
                    json!({"id": "o2", "updated_at": "2024-02-01T00:00:00Z"}),
                ],
                None,
                false,
            ))
            .with_json(page("order_history", vec![json!({"id": "h1"})], None, false))
            .with_error(Error::auth("token revoked"))
            // Second run: no parent changed since the bookmark
            .with_json(page("orders", vec![], None, false))
            .with_json(page("order_history", vec![json!({"id": "h2"})], None, false)),
    );
    let mut engine = engine(&transport).with_config(
        SyncConfig::new()
            .with_start_date(start_date())
            .with_fail_fast(false),
    );
    let history = order_history();

    let mut routers = vec![ParentRouter::for_child(&history).unwrap()];
    engine
        .sync_parent_stream(&orders(), &mut routers, &mut |_: Message| Ok(()))
        .await
        .unwrap();
    let parents = routers.remove(0).into_contexts();
    let first = engine
        .sync_child_stream(&history, &parents, &mut |_: Message| Ok(()))
        .await;
    assert!(matches!(first, Err(Error::ParentsFailed { failed: 1, .. })));

    let mut routers = vec![ParentRouter::for_child(&history).unwrap()];
    engine
        .sync_parent_stream(&orders(), &mut routers, &mut |_: Message| Ok(()))
        .await
        .unwrap();
    assert!(routers[0].is_empty());
    let mut records = Vec::new();
    let second = engine
        .sync_child_stream(&history, &[], &mut |m: Message| {
            if let Some(record) = m.as_record() {
                records.push(record.clone());
            }
            Ok(())
        })
        .await
        .unwrap();

    let queries = transport.queries();
    assert!(queries[3].contains(r#"orders(updated_from: "2024-02-02T00:00:00Z")"#));
    assert!(queries[4].contains(r#"order_history(order_id: "o2")"#));
    assert_eq!(queries.len(), 5);
    assert_eq!(second.records, 1);
    assert_eq!(records, vec![json!({"id": "h2"})]);
    assert!(engine.state().pending_parents("order_history").await.is_empty());
    assert!(!engine.state().is_parent_completed("order_history", "o1").await);
}

// ============================================================================
// Retry Integration Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_generic_errors_exhaust_retries() {
    let boom = json!({"errors": [{"code": 99, "message": "Boom"}]});
    let transport = Arc::new(ScriptedTransport::new().repeat_json(&boom, 5));
    let mut engine = engine(&transport);

    let started = tokio::time::Instant::now();
    let (result, messages) = collect(&mut engine, &vendors(), None).await;

    let err = result.unwrap_err();
    assert!(matches!(err, Error::RetriesExhausted { attempts: 5, .. }));
    assert!(err.to_string().contains("Boom"));
    assert_eq!(transport.request_count(), 5);
    assert_eq!(started.elapsed(), Duration::from_secs(20));
    assert!(messages.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_then_success_mid_stream() {
    let throttled = json!({"errors": [{
        "code": 30,
        "message": "Rate limited",
        "extensions": {"time_remaining": "10 seconds"}
    }]});
    let transport = Arc::new(
        ScriptedTransport::new()
            .with_json(page("vendors", vec![json!({"id": 1})], Some("abc"), true))
            .with_json(throttled)
            .with_json(page("vendors", vec![json!({"id": 2})], None, false)),
    );
    let mut engine = engine(&transport)
        .with_retry_policy(RetryPolicy::new(RetryConfig::default()));

    let started = tokio::time::Instant::now();
    let (result, messages) = collect(&mut engine, &vendors(), None).await;

    assert_eq!(result.unwrap().records, 2);
    assert_eq!(started.elapsed(), Duration::from_secs(11));
    assert_eq!(records(&messages).len(), 2);

    // The retried request resends the same cursor
    let queries = transport.queries();
    assert_eq!(queries[1], queries[2]);
}
