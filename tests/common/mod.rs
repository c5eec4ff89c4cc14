// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process stub XO server: scripted REST routes plus a JSON-RPC WebSocket
//! at `/api/`.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use xo_api_rs::config::ClientConfigBuilder;
use xo_api_rs::{ClientConfig, XoClient};

pub const GOOD_TOKEN: &str = "good-token";
pub const MINTED_TOKEN: &str = "minted-token";
pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASSWORD: &str = "secret";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("xo_api=debug")
        .try_init();
}

/// One scripted REST reply.
#[derive(Clone, Debug)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Bytes,
    pub delay: Option<Duration>,
}

impl Reply {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: Bytes::from(body.to_string()),
            delay: None,
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::json(200, body)
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: Bytes::from(body.to_string()),
            delay: None,
        }
    }

    pub fn bytes(body: &[u8]) -> Self {
        Self {
            status: 200,
            content_type: "application/octet-stream",
            body: Bytes::copy_from_slice(body),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// A REST request as the stub saw it.
#[derive(Clone, Debug)]
pub struct Hit {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub cookie: Option<String>,
    pub content_length: Option<u64>,
    pub body: Bytes,
}

impl Hit {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

#[derive(Default)]
pub struct StubState {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    hits: Mutex<Vec<Hit>>,
    rpc_calls: Mutex<Vec<(String, Value)>>,
    objects: Mutex<Vec<Value>>,
    tags: Mutex<HashMap<String, BTreeSet<String>>>,
    /// Close the socket this long after the named method arrives, once.
    drop_once: Mutex<Option<(String, Duration)>>,
    /// Close the socket as soon as the named method arrives, every time.
    drop_every: Mutex<Option<String>>,
    pub connections: AtomicUsize,
    pub sign_ins: AtomicUsize,
}

pub struct StubXo {
    pub addr: SocketAddr,
    pub state: Arc<StubState>,
    handle: JoinHandle<()>,
}

impl Drop for StubXo {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl StubXo {
    pub async fn start() -> Self {
        init_tracing();
        let state = Arc::new(StubState::default());
        let app = Router::new()
            .route("/api/", get(upgrade))
            .fallback(rest)
            .with_state(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn builder(&self) -> ClientConfigBuilder {
        ClientConfig::builder(self.url()).token(GOOD_TOKEN)
    }

    pub async fn client(&self) -> XoClient {
        XoClient::connect(self.builder().build().unwrap())
            .await
            .unwrap()
    }

    /// Queue replies for `METHOD /path`. The last reply repeats forever.
    pub fn script(&self, method: &str, path: &str, replies: impl IntoIterator<Item = Reply>) {
        self.state
            .routes
            .lock()
            .unwrap()
            .entry(format!("{method} {path}"))
            .or_default()
            .extend(replies);
    }

    pub fn hits(&self, method: &str, path: &str) -> Vec<Hit> {
        self.state
            .hits
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.method == method && h.path == path)
            .cloned()
            .collect()
    }

    pub fn rpc_calls(&self, method: &str) -> Vec<Value> {
        self.state
            .rpc_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn set_objects(&self, objects: Vec<Value>) {
        *self.state.objects.lock().unwrap() = objects;
    }

    pub fn set_tags(&self, id: &str, tags: &[&str]) {
        self.state
            .tags
            .lock()
            .unwrap()
            .insert(id.to_string(), tags.iter().map(|t| (*t).to_string()).collect());
    }

    pub fn tags_of(&self, id: &str) -> BTreeSet<String> {
        self.state
            .tags
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn drop_once(&self, method: &str, after: Duration) {
        *self.state.drop_once.lock().unwrap() = Some((method.to_string(), after));
    }

    pub fn drop_every(&self, method: &str) {
        *self.state.drop_every.lock().unwrap() = Some(method.to_string());
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn sign_ins(&self) -> usize {
        self.state.sign_ins.load(Ordering::SeqCst)
    }
}

async fn rest(
    State(state): State<Arc<StubState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let header_str = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    state.hits.lock().unwrap().push(Hit {
        method: method.to_string(),
        path: path.clone(),
        query: uri.query().map(str::to_string),
        cookie: header_str(header::COOKIE),
        content_length: header_str(header::CONTENT_LENGTH).and_then(|v| v.parse().ok()),
        body,
    });

    let reply = {
        let mut routes = state.routes.lock().unwrap();
        routes.get_mut(&format!("{method} {path}")).and_then(|queue| {
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        })
    };
    let Some(reply) = reply else {
        return (StatusCode::NOT_FOUND, "no such route").into_response();
    };
    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }
    (
        StatusCode::from_u16(reply.status).unwrap(),
        [(header::CONTENT_TYPE, reply.content_type)],
        reply.body,
    )
        .into_response()
}

async fn upgrade(State(state): State<Arc<StubState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session(socket, state))
}

async fn session(socket: WebSocket, state: Arc<StubState>) {
    state.connections.fetch_add(1, Ordering::SeqCst);
    let (mut sink, mut source) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Option<String>>();

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match frame {
                Some(text) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let signed_in = Arc::new(std::sync::atomic::AtomicBool::new(false));
    while let Some(Ok(message)) = source.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let Ok(request) = serde_json::from_str::<Value>(text.as_str()) else {
            continue;
        };
        let id = request["id"].clone();
        let method = request["method"].as_str().unwrap_or_default().to_string();
        let params = request["params"].clone();
        state
            .rpc_calls
            .lock()
            .unwrap()
            .push((method.clone(), params.clone()));

        let dropping = {
            let mut slot = state.drop_once.lock().unwrap();
            match slot.as_ref() {
                Some((m, after)) if *m == method => {
                    let after = *after;
                    *slot = None;
                    Some(after)
                }
                _ => None,
            }
        };
        let dropping = dropping.or_else(|| {
            let every = state.drop_every.lock().unwrap();
            let matched = every.as_deref() == Some(method.as_str());
            matched.then_some(Duration::ZERO)
        });
        if let Some(after) = dropping {
            let tx = tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                let _ = tx.send(None);
            });
            continue;
        }

        let state = Arc::clone(&state);
        let tx = tx.clone();
        let signed_in = Arc::clone(&signed_in);
        tokio::spawn(async move {
            let outcome = dispatch(&state, &signed_in, &method, &params, &tx).await;
            let frame = match outcome {
                Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
                Err(error) => json!({"jsonrpc": "2.0", "id": id, "error": error}),
            };
            let _ = tx.send(Some(frame.to_string()));
        });
    }
    drop(tx);
    let _ = writer.await;
}

async fn dispatch(
    state: &StubState,
    signed_in: &std::sync::atomic::AtomicBool,
    method: &str,
    params: &Value,
    tx: &mpsc::UnboundedSender<Option<String>>,
) -> Result<Value, Value> {
    if method == "session.signIn" {
        let by_token = params["token"].as_str() == Some(GOOD_TOKEN)
            || params["token"].as_str() == Some(MINTED_TOKEN);
        let by_password = params["email"].as_str() == Some(ADMIN_USER)
            && params["password"].as_str() == Some(ADMIN_PASSWORD);
        if by_token || by_password {
            state.sign_ins.fetch_add(1, Ordering::SeqCst);
            signed_in.store(true, Ordering::SeqCst);
            return Ok(json!({"id": "user-1", "email": ADMIN_USER}));
        }
        return Err(json!({"code": 3, "message": "invalid credentials"}));
    }
    if !signed_in.load(Ordering::SeqCst) {
        return Err(json!({"code": 2, "message": "not authenticated"}));
    }

    match method {
        "token.create" => Ok(json!(MINTED_TOKEN)),
        // Unfiltered on purpose: the real server does not guarantee typing either.
        "xo.getAllObjects" => {
            let objects = state.objects.lock().unwrap().clone();
            let map: serde_json::Map<String, Value> = objects
                .into_iter()
                .map(|o| (o["id"].as_str().unwrap_or_default().to_string(), o))
                .collect();
            Ok(Value::Object(map))
        }
        "tag.add" | "tag.remove" => {
            let id = params["id"].as_str().unwrap_or_default().to_string();
            let tag = params["tag"].as_str().unwrap_or_default().to_string();
            let mut tags = state.tags.lock().unwrap();
            let set = tags.entry(id).or_default();
            if method == "tag.add" {
                set.insert(tag);
            } else {
                set.remove(&tag);
            }
            Ok(json!(true))
        }
        "network.create" => Ok(json!("6b1d3a52-1c4e-4a43-9f66-2b8c2f0f6a11")),
        "test.echo" => Ok(params.clone()),
        "test.slow" => {
            let ms = params["ms"].as_u64().unwrap_or(1000);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(json!("done"))
        }
        "test.error" => Err(json!({"code": "E_CUSTOM", "message": "boom", "data": {"x": 1}})),
        "test.notify" => {
            let note = json!({
                "jsonrpc": "2.0",
                "method": "task.progress",
                "params": {"id": "task-7", "progress": 50}
            });
            let _ = tx.send(Some(note.to_string()));
            Ok(json!(true))
        }
        _ => Err(json!({"code": -32601, "message": format!("method not found: {method}")})),
    }
}
