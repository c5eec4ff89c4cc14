// SPDX-License-Identifier: MIT OR Apache-2.0

mod common;

use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::sync::mpsc;
use xo_api_rs::error::ErrorCode;
use xo_api_rs::{CallOptions, ClientConfig, ErrorKind, RetryMode, XoClient, XoError};

use common::{StubXo, ADMIN_USER};

#[tokio::test]
async fn test_sign_in_with_token() {
    let stub = StubXo::start().await;
    let client = stub.client().await;

    assert_eq!(stub.connections(), 1);
    assert_eq!(stub.sign_ins(), 1);
    let params = &stub.rpc_calls("session.signIn")[0];
    assert_eq!(params, &json!({"token": common::GOOD_TOKEN}));
    assert!(!client.jsonrpc().is_closed());
}

#[tokio::test]
async fn test_bad_credentials_fail_with_auth() {
    let stub = StubXo::start().await;
    let config = ClientConfig::builder(stub.url())
        .user_password(ADMIN_USER, "wrong")
        .build()
        .unwrap();

    let err = XoClient::connect(config).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);
    assert!(stub.rpc_calls("token.create").is_empty());
}

#[tokio::test]
async fn test_call_round_trip() {
    let stub = StubXo::start().await;
    let client = stub.client().await;

    let echoed: Value = client
        .jsonrpc()
        .call("test.echo", json!({"a": [1, 2, 3]}))
        .await
        .unwrap();
    assert_eq!(echoed, json!({"a": [1, 2, 3]}));
}

#[tokio::test]
async fn test_concurrent_calls_are_correlated_by_id() {
    let stub = StubXo::start().await;
    let client = stub.client().await;

    // The slow call is answered after the fast ones
    let slow = {
        let rpc = client.jsonrpc().clone();
        tokio::spawn(async move { rpc.call::<_, Value>("test.slow", json!({"ms": 300})).await })
    };
    let mut fast = Vec::new();
    for i in 0..8 {
        let rpc = client.jsonrpc().clone();
        fast.push(tokio::spawn(async move {
            rpc.call::<_, Value>("test.echo", json!({ "n": i })).await
        }));
    }
    for (i, handle) in fast.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap().unwrap(), json!({ "n": i }));
    }
    assert_eq!(slow.await.unwrap().unwrap(), json!("done"));
}

#[tokio::test]
async fn test_server_error_keeps_code_shape() {
    let stub = StubXo::start().await;
    let client = stub.client().await;

    let err = client
        .jsonrpc()
        .call::<_, Value>("test.error", json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    match err {
        XoError::Rpc { code, message, data } => {
            assert_eq!(code, ErrorCode::Text("E_CUSTOM".into()));
            assert_eq!(message, "boom");
            assert_eq!(data, Some(json!({"x": 1})));
        }
        other => panic!("unexpected error {other:?}"),
    }

    let err = client
        .jsonrpc()
        .call::<_, Value>("no.such.method", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        XoError::Rpc {
            code: ErrorCode::Number(-32601),
            ..
        }
    ));
}

#[tokio::test]
async fn test_call_deadline() {
    let stub = StubXo::start().await;
    let client = stub.client().await;

    let opts = CallOptions::new().with_timeout(Duration::from_millis(200));
    let started = Instant::now();
    let err = client
        .jsonrpc()
        .call_with::<_, Value>(&opts, "test.slow", json!({"ms": 3000}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_configured_call_timeout_caps_caller_deadline() {
    let stub = StubXo::start().await;
    let config = stub
        .builder()
        .call_timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let client = XoClient::connect(config).await.unwrap();

    let opts = CallOptions::new().with_timeout(Duration::from_secs(30));
    let err = client
        .jsonrpc()
        .call_with::<_, Value>(&opts, "test.slow", json!({"ms": 3000}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn test_reconnects_after_socket_loss() {
    let stub = StubXo::start().await;
    stub.set_objects(vec![json!({"id": "a", "type": "pool", "name_label": "lab-1"})]);
    stub.drop_once("xo.getAllObjects", Duration::from_secs(1));
    let config = stub
        .builder()
        .retry_mode(RetryMode::Backoff)
        .retry_max_time(Duration::from_secs(5))
        .build()
        .unwrap();
    let client = XoClient::connect(config).await.unwrap();

    let opts = CallOptions::new().with_timeout(Duration::from_secs(10));
    let started = Instant::now();
    let objects: Value = tokio::time::timeout(
        Duration::from_secs(15),
        client
            .jsonrpc()
            .call_with(&opts, "xo.getAllObjects", json!({"filter": {"type": "pool"}})),
    )
    .await
    .expect("call hung")
    .unwrap();

    assert!(objects.get("a").is_some());
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(stub.connections(), 2);
    assert_eq!(stub.sign_ins(), 2);
    assert_eq!(stub.rpc_calls("xo.getAllObjects").len(), 2);
    assert_eq!(client.jsonrpc().reconnect_count(), 1);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_reconnect() -> anyhow::Result<()> {
    let stub = StubXo::start().await;
    stub.drop_once("test.slow", Duration::from_millis(200));
    let config = stub
        .builder()
        .retry_mode(RetryMode::Backoff)
        .retry_max_time(Duration::from_secs(5))
        .build()?;
    let client = XoClient::connect(config).await?;

    let mut calls = Vec::new();
    for _ in 0..4 {
        let rpc = client.jsonrpc().clone();
        calls.push(tokio::spawn(async move {
            rpc.call::<_, Value>("test.slow", json!({"ms": 500})).await
        }));
    }
    for call in calls {
        assert_eq!(call.await??, json!("done"));
    }

    assert_eq!(client.jsonrpc().reconnect_count(), 1);
    assert_eq!(stub.connections(), 2);
    assert_eq!(stub.sign_ins(), 2);
    Ok(())
}

#[tokio::test]
async fn test_rpc_retries_stop_at_budget() -> anyhow::Result<()> {
    let stub = StubXo::start().await;
    stub.drop_every("test.echo");
    let budget = Duration::from_secs(1);
    let config = stub
        .builder()
        .retry_mode(RetryMode::Backoff)
        .retry_max_time(budget)
        .build()?;
    let client = XoClient::connect(config).await?;

    let started = Instant::now();
    let err = client
        .jsonrpc()
        .call::<_, Value>("test.echo", json!({}))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err.kind(), ErrorKind::Transport);
    // The last attempt is a dial, a sign-in and a dropped call on loopback
    assert!(elapsed < budget + Duration::from_millis(500), "took {elapsed:?}");
    assert!(stub.rpc_calls("test.echo").len() >= 2);
    Ok(())
}

#[tokio::test]
async fn test_socket_loss_without_retry_is_transport_error() {
    let stub = StubXo::start().await;
    stub.drop_once("test.echo", Duration::from_millis(100));
    let client = stub.client().await;

    let err = client
        .jsonrpc()
        .call::<_, Value>("test.echo", json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);

    // The next call dials again
    let echoed: Value = client
        .jsonrpc()
        .call("test.echo", json!({"again": true}))
        .await
        .unwrap();
    assert_eq!(echoed, json!({"again": true}));
    assert_eq!(stub.sign_ins(), 2);
}

#[tokio::test]
async fn test_close_cancels_pending_and_later_calls() {
    let stub = StubXo::start().await;
    let client = stub.client().await;

    let pending = {
        let rpc = client.jsonrpc().clone();
        tokio::spawn(async move { rpc.call::<_, Value>("test.slow", json!({"ms": 3000})).await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;
    client.close().await;

    let err = pending.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);

    let err = client
        .jsonrpc()
        .call::<_, Value>("test.echo", json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(client.jsonrpc().is_closed());
}

#[tokio::test]
async fn test_notifications_reach_hook() {
    let stub = StubXo::start().await;
    let client = stub.client().await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    client.jsonrpc().on_notification(move |n| {
        let _ = tx.send(n);
    });

    let acked: bool = client.jsonrpc().call("test.notify", json!({})).await.unwrap();
    assert!(acked);

    let note = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(note.method, "task.progress");
    assert_eq!(note.params["progress"], 50);
}
