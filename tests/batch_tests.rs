//! Batch Processing Tests
//!
//! Covers empty and malformed batches, notification-only batches, id
//! correlation, and isolation between batch elements.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::{RecordingObserver, calculator, calculator_with, call, call_raw};
use jsonrpc_bind::prelude::*;
use serde_json::{Value, json};

#[tokio::test]
async fn test_empty_batch_is_single_invalid_request() {
    let response = call_raw(&calculator(), "[]").await.unwrap();
    assert!(response.is_object(), "expected a single response, got {}", response);
    assert_eq!(response["error"]["code"], INVALID_REQUEST);
    assert_eq!(response["id"], Value::Null);
}

#[tokio::test]
async fn test_invalid_elements_answered_individually() {
    let response = call_raw(&calculator(), "[1, 2, 3]").await.unwrap();
    let replies = response.as_array().unwrap();
    assert_eq!(replies.len(), 3);
    for reply in replies {
        assert_eq!(reply["error"]["code"], INVALID_REQUEST);
        assert_eq!(reply["id"], Value::Null);
    }
}

#[tokio::test]
async fn test_mixed_batch() {
    let response = call(
        &calculator(),
        json!([
            {"jsonrpc": "2.0", "method": "add", "params": [1, 2], "id": "1"},
            {"jsonrpc": "2.0", "method": "note", "params": ["hi"]},
            {"jsonrpc": "2.0", "method": "subtract", "params": [42, 23], "id": "2"},
            {"foo": "boo"},
            {"jsonrpc": "2.0", "method": "foo.get", "params": {"name": "myself"}, "id": "5"},
            {"jsonrpc": "2.0", "method": "echo3", "params": [7, 8], "id": "9"}
        ]),
    )
    .await;

    let replies = response.as_array().unwrap();
    assert_eq!(replies.len(), 5);

    let by_id = |id: &str| {
        replies
            .iter()
            .find(|r| r["id"] == id)
            .unwrap_or_else(|| panic!("no reply for id {}", id))
    };
    assert_eq!(by_id("1")["result"], 3);
    assert_eq!(by_id("2")["result"], 19);
    assert_eq!(by_id("5")["error"]["code"], METHOD_NOT_FOUND);
    assert_eq!(by_id("9")["result"], json!([7, 8, 0]));

    let invalid: Vec<&Value> = replies.iter().filter(|r| r["id"].is_null()).collect();
    assert_eq!(invalid.len(), 1);
    assert_eq!(invalid[0]["error"]["code"], INVALID_REQUEST);
}

#[tokio::test]
async fn test_replies_keep_input_order() {
    let response = call(
        &calculator(),
        json!([
            {"jsonrpc": "2.0", "method": "add", "params": [1, 1], "id": 1},
            {"jsonrpc": "2.0", "method": "nope", "id": 2},
            {"jsonrpc": "2.0", "method": "add", "params": [2, 2], "id": 3}
        ]),
    )
    .await;
    let ids: Vec<&Value> = response.as_array().unwrap().iter().map(|r| &r["id"]).collect();
    assert_eq!(ids, vec![&json!(1), &json!(2), &json!(3)]);
}

#[tokio::test]
async fn test_all_notification_batch_produces_nothing() {
    let observer = RecordingObserver::default();
    let dispatcher = calculator_with(JsonRpcDispatcher::builder().observer(observer.clone()));

    let out = call_raw(
        &dispatcher,
        r#"[
            {"jsonrpc": "2.0", "method": "note", "params": ["a"]},
            {"jsonrpc": "2.0", "method": "missing"}
        ]"#,
    )
    .await;
    assert!(out.is_none());
    assert_eq!(observer.failures(), vec![("missing".to_string(), METHOD_NOT_FOUND)]);
}

#[tokio::test]
async fn test_n_notifications_m_requests_yield_m_responses() {
    let dispatcher = calculator();
    for (notifications, requests) in [(0usize, 1usize), (3, 2), (5, 0), (1, 7)] {
        let mut batch = Vec::new();
        for i in 0..notifications {
            batch.push(json!({"jsonrpc": "2.0", "method": "note", "params": [format!("n{}", i)]}));
        }
        for i in 0..requests {
            batch.push(json!({"jsonrpc": "2.0", "method": "add", "params": [i, 1], "id": i}));
        }

        let out = call_raw(&dispatcher, &Value::Array(batch).to_string()).await;
        if requests == 0 {
            assert!(out.is_none());
            continue;
        }
        let replies = out.unwrap();
        let replies = replies.as_array().unwrap();
        assert_eq!(replies.len(), requests);
        let ids: HashSet<i64> = replies.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids.len(), requests);
    }
}

#[tokio::test]
async fn test_failing_element_does_not_affect_siblings() {
    let dispatcher = JsonRpcDispatcher::builder()
        .method(
            MethodTarget::builder("explode"),
            handler_fn(|_args: BoundArguments, _ctx: CallContext| async move {
                if true {
                    panic!("element failure");
                }
                Ok::<_, MethodError>(0)
            }),
        )
        .method(
            MethodTarget::builder("ok"),
            handler_fn(|_args: BoundArguments, _ctx: CallContext| async move {
                Ok::<_, MethodError>("fine")
            }),
        )
        .build()
        .unwrap();

    let response = call(
        &dispatcher,
        json!([
            {"jsonrpc": "2.0", "method": "explode", "id": 1},
            {"jsonrpc": "2.0", "method": "ok", "id": 2}
        ]),
    )
    .await;
    let replies = response.as_array().unwrap();
    assert_eq!(replies[0]["error"]["data"]["reason"], "panic");
    assert_eq!(replies[1]["result"], "fine");
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_per_element() {
    let dispatcher = calculator_with(JsonRpcDispatcher::builder().call_timeout(Duration::from_millis(200)));
    let response = call(
        &dispatcher,
        json!([
            {"jsonrpc": "2.0", "method": "sleep", "params": [10_000], "id": "slow"},
            {"jsonrpc": "2.0", "method": "sleep", "params": [5], "id": "fast"}
        ]),
    )
    .await;
    let replies = response.as_array().unwrap();
    assert_eq!(replies[0]["error"]["data"]["reason"], "timeout");
    assert_eq!(replies[1]["result"], 5);
}

#[tokio::test]
async fn test_cancelling_one_element_leaves_siblings_running() {
    let (started_tx, started_rx) = tokio::sync::oneshot::channel::<CancellationHandle>();
    let started_tx = std::sync::Mutex::new(Some(started_tx));
    let started_tx = std::sync::Arc::new(started_tx);

    let dispatcher = JsonRpcDispatcher::builder()
        .method(MethodTarget::builder("wait"), {
            let started_tx = started_tx.clone();
            handler_fn(move |_args: BoundArguments, ctx: CallContext| {
                let started_tx = started_tx.clone();
                async move {
                    if let Some(tx) = started_tx.lock().unwrap().take() {
                        let _ = tx.send(ctx.cancellation().clone());
                    }
                    ctx.cancellation().cancelled().await;
                    Ok::<_, MethodError>("cancelled")
                }
            })
        })
        .method(
            MethodTarget::builder("slow_ok"),
            handler_fn(|_args: BoundArguments, _ctx: CallContext| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, MethodError>("done")
            }),
        )
        .build()
        .unwrap();

    // Cancel the first element's own handle as soon as it starts.
    let canceller = tokio::spawn(async move {
        if let Ok(handle) = started_rx.await {
            handle.cancel();
        }
    });

    let response = call(
        &dispatcher,
        json!([
            {"jsonrpc": "2.0", "method": "wait", "id": 1},
            {"jsonrpc": "2.0", "method": "slow_ok", "id": 2}
        ]),
    )
    .await;
    canceller.await.unwrap();

    let replies = response.as_array().unwrap();
    assert_eq!(replies[0]["error"]["data"]["reason"], "cancelled");
    assert_eq!(replies[1]["result"], "done");
}

#[tokio::test]
async fn test_batch_size_limit() {
    let dispatcher = calculator_with(JsonRpcDispatcher::builder().max_batch_size(2));
    let within = call(
        &dispatcher,
        json!([
            {"jsonrpc": "2.0", "method": "add", "params": [1, 1], "id": 1},
            {"jsonrpc": "2.0", "method": "add", "params": [2, 2], "id": 2}
        ]),
    )
    .await;
    assert_eq!(within.as_array().unwrap().len(), 2);

    let over = call(
        &dispatcher,
        json!([
            {"jsonrpc": "2.0", "method": "add", "params": [1, 1], "id": 1},
            {"jsonrpc": "2.0", "method": "add", "params": [2, 2], "id": 2},
            {"jsonrpc": "2.0", "method": "add", "params": [3, 3], "id": 3}
        ]),
    )
    .await;
    assert_eq!(over["error"]["code"], INVALID_REQUEST);
}
