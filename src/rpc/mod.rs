// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON-RPC over WebSocket.
//!
//! [`RpcClient`] owns the session's socket, signs in on connect and after
//! every reconnect, and correlates responses to calls by request id. A lost
//! socket fails the calls in flight with a transport error; the next call
//! reconnects and signs in again before it is sent.

mod connection;
mod protocol;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio_tungstenite::Connector;
use tracing::{debug, info, warn};

use crate::client::CallOptions;
use crate::config::{ClientConfig, Credentials};
use crate::error::{Result, XoError};
use crate::rest::SharedToken;
use crate::runtime::{RequestLogger, RetryChannel, RetryConfig};

use connection::{Connection, HookSlot};

pub use protocol::Notification;

struct Inner {
    config: ClientConfig,
    connector: Option<Connector>,
    conn: Mutex<Option<Arc<Connection>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    reconnects: AtomicU64,
    hook: HookSlot,
    token: SharedToken,
    retry: RetryConfig,
    logger: Arc<RequestLogger>,
}

/// Authenticated JSON-RPC session.
///
/// Cheap to clone; clones share the socket.
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("url", &self.inner.config.rpc_url().as_str())
            .field("closed", &self.inner.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl RpcClient {
    /// Dial the server and sign in.
    ///
    /// With user/password credentials a REST token is minted over the fresh
    /// session and stored in `token`.
    ///
    /// # Errors
    ///
    /// Fails with an auth error when the server rejects the credentials, and
    /// with a transport error when the socket cannot be opened.
    pub(crate) async fn connect(
        config: ClientConfig,
        connector: Option<Connector>,
        token: SharedToken,
        logger: Arc<RequestLogger>,
    ) -> Result<Self> {
        let retry = RetryConfig::from_mode(config.retry_mode(), config.retry_max_time());
        let client = Self {
            inner: Arc::new(Inner {
                config,
                connector,
                conn: Mutex::new(None),
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
                reconnects: AtomicU64::new(0),
                hook: Arc::new(RwLock::new(None)),
                token,
                retry,
                logger,
            }),
        };

        let conn = client.dial().await?;
        match client.inner.config.credentials() {
            Credentials::Token(t) => {
                *client.inner.token.write().await = Some(t.clone());
            }
            Credentials::Password { .. } => {
                let minted = conn.call(client.next_id(), "token.create", &json!({})).await;
                let minted = match minted {
                    Ok(Value::String(t)) if !t.is_empty() => t,
                    Ok(other) => {
                        conn.close();
                        return Err(XoError::Auth(format!(
                            "token.create returned no token: {other}"
                        )));
                    }
                    Err(e) => {
                        conn.close();
                        return Err(e);
                    }
                };
                *client.inner.token.write().await = Some(minted);
            }
        }
        *client.inner.conn.lock().await = Some(conn);
        info!(target: "xo_api::rpc", url = %client.inner.config.rpc_url(), "connected");
        Ok(client)
    }

    /// Call `method` and decode its result.
    pub async fn call<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        self.call_with(&CallOptions::default(), method, params).await
    }

    /// Call `method` under a caller deadline and cancellation token.
    ///
    /// The effective deadline is the smaller of the caller's and the
    /// configured call timeout, and spans every retry.
    pub async fn call_with<P, R>(&self, opts: &CallOptions, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params)?;
        let span = self.inner.logger.start("rpc", method);
        self.inner.logger.log_params(&span, &params);

        let send = || {
            let params = &params;
            async move {
                let conn = self.connection().await?;
                debug!(target: "xo_api::rpc", method, "calling");
                conn.call(self.next_id(), method, params).await
            }
        };
        let attempts = async {
            if opts.single_attempt {
                send().await
            } else {
                self.inner.retry.execute_on(RetryChannel::Rpc, send).await
            }
        };
        let result = opts
            .run(Some(self.inner.config.call_timeout()), attempts)
            .await;

        match result {
            Ok(value) => {
                self.inner.logger.finish_success(span);
                Ok(serde_json::from_value(value)?)
            }
            Err(e) => {
                self.inner.logger.finish_error(span, &e);
                Err(e)
            }
        }
    }

    /// Register a handler for server-pushed messages.
    ///
    /// The handler runs on the reader task and must not block.
    pub fn on_notification<F>(&self, hook: F)
    where
        F: Fn(Notification) + Send + Sync + 'static,
    {
        *self
            .inner
            .hook
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(hook));
    }

    /// Number of reconnects performed since connect.
    #[must_use]
    pub fn reconnect_count(&self) -> u64 {
        self.inner.reconnects.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Close the socket. Calls in flight and every later call fail as cancelled.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(conn) = self.inner.conn.lock().await.take() {
            conn.close();
        }
        info!(target: "xo_api::rpc", "session closed");
    }

    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// The live connection, reconnecting and signing in again if it was lost.
    ///
    /// Holding the lock across the dial makes concurrent callers wait for one
    /// reconnect instead of starting their own.
    async fn connection(&self) -> Result<Arc<Connection>> {
        let mut slot = self.inner.conn.lock().await;
        if self.is_closed() {
            return Err(XoError::Cancelled);
        }
        if let Some(conn) = slot.as_ref() {
            if conn.is_alive() {
                return Ok(Arc::clone(conn));
            }
        }

        warn!(target: "xo_api::rpc", "reconnecting");
        *slot = None;
        let conn = self.dial().await?;
        self.inner.reconnects.fetch_add(1, Ordering::SeqCst);
        *slot = Some(Arc::clone(&conn));
        Ok(conn)
    }

    async fn dial(&self) -> Result<Arc<Connection>> {
        let conn = Connection::open(
            &self.inner.config.rpc_url(),
            self.inner.connector.clone(),
            Arc::clone(&self.inner.hook),
        )
        .await?;
        let conn = Arc::new(conn);
        if let Err(e) = self.sign_in(&conn).await {
            conn.close();
            return Err(e);
        }
        Ok(conn)
    }

    async fn sign_in(&self, conn: &Connection) -> Result<()> {
        let params = match self.inner.config.credentials() {
            Credentials::Token(token) => json!({ "token": token }),
            Credentials::Password { user, password } => {
                json!({ "email": user, "password": password })
            }
        };
        let span = self.inner.logger.start("rpc", "session.signIn");
        self.inner.logger.log_params(&span, &params);

        match conn.call(self.next_id(), "session.signIn", &params).await {
            Ok(_user) => {
                self.inner.logger.finish_success(span);
                info!(target: "xo_api::rpc", "signed in");
                Ok(())
            }
            Err(XoError::Rpc { message, .. }) => {
                let err = XoError::Auth(message);
                self.inner.logger.finish_error(span, &err);
                Err(err)
            }
            Err(e) => {
                self.inner.logger.finish_error(span, &e);
                Err(e)
            }
        }
    }
}
