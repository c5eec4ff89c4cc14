// SPDX-License-Identifier: MIT OR Apache-2.0

mod common;

use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use xo_api_rs::resources::{DiskFormat, VmExportFormat};
use xo_api_rs::rest::{Params, RestPath};
use xo_api_rs::{CallOptions, ErrorKind, RetryMode, TaskStatus, XoClient};

use common::{Reply, StubXo, ADMIN_PASSWORD, ADMIN_USER, GOOD_TOKEN, MINTED_TOKEN};

#[tokio::test]
async fn test_no_retry_mode_sends_exactly_one_request() {
    let stub = StubXo::start().await;
    stub.script("GET", "/rest/v0/vms/vm-1", [Reply::text(500, "kaboom")]);
    let client = stub.client().await;

    let err = client
        .rest()
        .get::<Value>(&RestPath::object("vms", "vm-1"), &Params::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(err.status(), Some(500));
    assert!(err.to_string().contains("kaboom"));
    assert_eq!(stub.hits("GET", "/rest/v0/vms/vm-1").len(), 1);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let stub = StubXo::start().await;
    let config = stub
        .builder()
        .retry_mode(RetryMode::Backoff)
        .retry_max_time(Duration::from_secs(3))
        .build()
        .unwrap();
    let client = XoClient::connect(config).await.unwrap();

    let err = client.vm().get("missing").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(stub.hits("GET", "/rest/v0/vms/missing").len(), 1);
}

#[tokio::test]
async fn test_backoff_retries_503_until_success() {
    let stub = StubXo::start().await;
    stub.script(
        "GET",
        "/rest/v0/pools/x",
        [
            Reply::text(503, "busy"),
            Reply::text(503, "busy"),
            Reply::text(503, "busy"),
            Reply::ok(json!({"id": "x"})),
        ],
    );
    let config = stub
        .builder()
        .retry_mode(RetryMode::Backoff)
        .retry_max_time(Duration::from_secs(3))
        .build()
        .unwrap();
    let client = XoClient::connect(config).await.unwrap();

    let started = Instant::now();
    let body: Value = client
        .rest()
        .get(&RestPath::object("pools", "x"), &Params::new())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(body, json!({"id": "x"}));
    assert_eq!(stub.hits("GET", "/rest/v0/pools/x").len(), 4);
    // Budget plus the duration of the final attempt
    assert!(elapsed < Duration::from_millis(3_800), "took {elapsed:?}");
}

#[tokio::test]
async fn test_token_cookie_on_every_request() {
    let stub = StubXo::start().await;
    stub.script("GET", "/rest/v0/hosts", [Reply::ok(json!([]))]);
    let client = stub.client().await;

    let hosts = client.host().list(&Params::new().limit(5)).await.unwrap();
    assert!(hosts.is_empty());

    let hits = stub.hits("GET", "/rest/v0/hosts");
    assert_eq!(hits.len(), 1);
    assert_eq!(
        hits[0].cookie.as_deref(),
        Some(format!("authenticationToken={GOOD_TOKEN}").as_str())
    );
    let query = hits[0].query.as_deref().unwrap();
    assert!(query.contains("limit=5"));
    assert!(query.contains("fields="));
}

#[tokio::test]
async fn test_password_sign_in_mints_rest_token() {
    let stub = StubXo::start().await;
    stub.script("GET", "/rest/v0/pools", [Reply::ok(json!([]))]);
    let config = xo_api_rs::ClientConfig::builder(stub.url())
        .user_password(ADMIN_USER, ADMIN_PASSWORD)
        .build()
        .unwrap();
    let client = XoClient::connect(config).await.unwrap();

    client.pool().list(&Params::new()).await.unwrap();
    assert_eq!(stub.rpc_calls("token.create").len(), 1);
    let hits = stub.hits("GET", "/rest/v0/pools");
    assert_eq!(
        hits[0].cookie.as_deref(),
        Some(format!("authenticationToken={MINTED_TOKEN}").as_str())
    );
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let stub = StubXo::start().await;
    stub.script(
        "POST",
        "/rest/v0/vms/vm-1/actions/start",
        [Reply::ok(json!({"status": "success", "id": "t1"}))],
    );
    let client = stub.client().await;

    let task = client.vm().start("vm-1").await.unwrap();
    assert_eq!(task.status, TaskStatus::Success);
    let hits = stub.hits("POST", "/rest/v0/vms/vm-1/actions/start");
    assert_eq!(hits[0].json(), json!({}));
}

#[tokio::test]
async fn test_caller_timeout_is_reported() {
    let stub = StubXo::start().await;
    stub.script(
        "GET",
        "/rest/v0/srs/sr-1",
        [Reply::ok(json!({"id": "sr-1"})).delayed(Duration::from_secs(5))],
    );
    let client = stub.client().await;

    let opts = CallOptions::new().with_timeout(Duration::from_millis(200));
    let err = client
        .rest()
        .get_with::<Value>(&opts, &RestPath::object("srs", "sr-1"), &Params::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn test_cancel_aborts_request() {
    let stub = StubXo::start().await;
    stub.script(
        "GET",
        "/rest/v0/srs/sr-1",
        [Reply::ok(json!({"id": "sr-1"})).delayed(Duration::from_secs(5))],
    );
    let client = stub.client().await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let opts = CallOptions::new().with_cancel(cancel);
    let err = client
        .rest()
        .get_with::<Value>(&opts, &RestPath::object("srs", "sr-1"), &Params::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_export_streams_into_sink() {
    let stub = StubXo::start().await;
    let payload: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
    stub.script("GET", "/rest/v0/vms/vm-1.xva", [Reply::bytes(&payload)]);
    let client = stub.client().await;

    let mut sink: Vec<u8> = Vec::new();
    let written = client
        .vm()
        .export("vm-1", VmExportFormat::Xva, true, &mut sink)
        .await
        .unwrap();

    assert_eq!(written, payload.len() as u64);
    assert_eq!(sink, payload);
    let hits = stub.hits("GET", "/rest/v0/vms/vm-1.xva");
    assert_eq!(hits[0].query.as_deref(), Some("compress=zstd"));
}

#[tokio::test]
async fn test_import_streams_known_length() {
    const NEW_VDI: &str = "0f5c3a8e-9a7b-4c1d-8e2f-3b4a5c6d7e8f";
    let stub = StubXo::start().await;
    stub.script("PUT", "/rest/v0/srs/sr-1/vdis", [Reply::text(200, NEW_VDI)]);
    let client = stub.client().await;

    let data = vec![7u8; 4096];
    let task = client
        .vdi()
        .import(
            "sr-1",
            "data disk",
            DiskFormat::Raw,
            std::io::Cursor::new(data.clone()),
            data.len() as u64,
        )
        .await
        .unwrap();

    assert_eq!(task.status, TaskStatus::Success);
    assert_eq!(task.result_id().unwrap().to_string(), NEW_VDI);

    let hits = stub.hits("PUT", "/rest/v0/srs/sr-1/vdis");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].content_length, Some(4096));
    assert_eq!(hits[0].body.as_ref(), data.as_slice());
    assert_eq!(
        hits[0].query.as_deref(),
        Some("name_label=data+disk&format=raw")
    );
}
