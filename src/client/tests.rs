// SPDX-License-Identifier: MIT OR Apache-2.0

use super::*;
use crate::error::ErrorKind;
use std::time::Duration;
use tokio::net::TcpListener;

async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn test_connect_refused_is_transport_error() {
    let port = unused_port().await;
    let config = ClientConfig::builder(format!("http://127.0.0.1:{port}"))
        .token("t")
        .build()
        .unwrap();

    let err = XoClient::connect(config).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_connect_insecure_tls_to_closed_port() {
    let port = unused_port().await;
    let config = ClientConfig::builder(format!("https://127.0.0.1:{port}"))
        .token("t")
        .insecure(true)
        .build()
        .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), XoClient::connect(config)).await;
    // Must fail fast, not hang
    let err = result.expect("connect hung").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[test]
fn test_call_options_default_has_no_deadline() {
    let opts = CallOptions::default();
    assert!(opts.timeout.is_none());
    assert!(!opts.is_cancelled());
}
