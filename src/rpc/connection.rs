// SPDX-License-Identifier: MIT OR Apache-2.0

//! One WebSocket connection: a writer task fed by a queue, a reader task that
//! routes responses to pending calls by id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::Connector;
use tracing::{debug, trace, warn};
use url::Url;

use super::protocol::{Frame, Inbound, Notification, Request};
use crate::error::{Result, XoError};

pub(crate) type NotificationHook = Arc<dyn Fn(Notification) + Send + Sync>;
pub(crate) type HookSlot = Arc<RwLock<Option<NotificationHook>>>;

type Reply = oneshot::Sender<Result<Value>>;

struct Shared {
    pending: Mutex<HashMap<u64, Reply>>,
    closed: AtomicBool,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, HashMap<u64, Reply>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the connection dead and fail every outstanding call.
    fn drain(&self, make_err: impl Fn() -> XoError) {
        self.closed.store(true, Ordering::SeqCst);
        let drained: Vec<Reply> = self.pending().drain().map(|(_, tx)| tx).collect();
        if !drained.is_empty() {
            debug!(target: "xo_api::rpc", count = drained.len(), "failing pending calls");
        }
        for tx in drained {
            let _ = tx.send(Err(make_err()));
        }
    }
}

/// Removes a pending slot when the call finishes or its future is dropped.
struct PendingGuard<'a> {
    shared: &'a Shared,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.shared.pending().remove(&self.id);
    }
}

pub(crate) struct Connection {
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedSender<Message>,
    reader: JoinHandle<()>,
}

impl Connection {
    pub async fn open(url: &Url, connector: Option<Connector>, hook: HookSlot) -> Result<Self> {
        debug!(target: "xo_api::rpc", %url, "opening WebSocket");
        let (stream, _response) =
            tokio_tungstenite::connect_async_tls_with_config(url.as_str(), None, false, connector)
                .await?;
        let (mut sink, mut source) = stream.split();

        let shared = Arc::new(Shared {
            pending: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        });

        let (outbound, mut queue) = mpsc::unbounded_channel::<Message>();
        tokio::spawn(async move {
            while let Some(msg) = queue.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = sink.send(msg).await {
                    debug!(target: "xo_api::rpc", error = %e, "WebSocket write failed");
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader_shared = Arc::clone(&shared);
        let reader = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text.as_str().to_owned(),
                    Ok(Message::Binary(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        debug!(target: "xo_api::rpc", error = %e, "WebSocket read failed");
                        break;
                    }
                };
                dispatch(&reader_shared, &hook, &text);
            }
            if !reader_shared.closed.load(Ordering::SeqCst) {
                warn!(target: "xo_api::rpc", "WebSocket connection lost");
            }
            reader_shared.drain(|| XoError::Transport("WebSocket connection lost".into()));
        });

        Ok(Self {
            shared,
            outbound,
            reader,
        })
    }

    pub fn is_alive(&self) -> bool {
        !self.shared.closed.load(Ordering::SeqCst)
    }

    /// Send one request and wait for its response.
    pub async fn call(&self, id: u64, method: &str, params: &Value) -> Result<Value> {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.shared.pending();
            if self.shared.closed.load(Ordering::SeqCst) {
                return Err(XoError::Transport("WebSocket connection is closed".into()));
            }
            pending.insert(id, tx);
        }
        let _guard = PendingGuard {
            shared: &self.shared,
            id,
        };

        let text = serde_json::to_string(&Request::new(id, method, params))?;
        trace!(target: "xo_api::rpc", id, method, "sending call");
        self.outbound
            .send(Message::text(text))
            .map_err(|_| XoError::Transport("WebSocket writer stopped".into()))?;

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(XoError::Transport("WebSocket connection lost".into())),
        }
    }

    /// Close the socket; outstanding calls fail as cancelled.
    pub fn close(&self) {
        self.shared.drain(|| XoError::Cancelled);
        let _ = self.outbound.send(Message::Close(None));
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // The writer drains its queue and exits once `outbound` is dropped.
        self.reader.abort();
    }
}

fn dispatch(shared: &Shared, hook: &HookSlot, text: &str) {
    let inbound: Inbound = match serde_json::from_str(text) {
        Ok(inbound) => inbound,
        Err(e) => {
            debug!(target: "xo_api::rpc", error = %e, "dropping undecodable frame");
            return;
        }
    };
    match inbound.classify() {
        Frame::Response { id, outcome } => {
            let slot = shared.pending().remove(&id);
            match slot {
                Some(tx) => {
                    let _ = tx.send(outcome.map_err(XoError::from));
                }
                None => trace!(target: "xo_api::rpc", id, "response for unknown call"),
            }
        }
        Frame::Notification(notification) => {
            let hook = hook
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            if let Some(hook) = hook {
                hook(notification);
            }
        }
        Frame::Ignored => {}
    }
}
