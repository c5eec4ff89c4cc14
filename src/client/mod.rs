// SPDX-License-Identifier: MIT OR Apache-2.0

//! The XO client: one session over two transports.
//!
//! [`XoClient::connect`] opens the JSON-RPC WebSocket, signs in, and builds
//! the REST client on the same credentials and TLS policy. Per-resource
//! services are borrowed from the client and never outlive it.
//!
//! ```no_run
//! use xo_api_rs::{ClientConfig, XoClient};
//! use xo_api_rs::resources::CreateVmRequest;
//!
//! # async fn demo() -> xo_api_rs::Result<()> {
//! let config = ClientConfig::builder("https://xoa.example.com")
//!     .token("my-token")
//!     .build()?;
//! let client = XoClient::connect(config).await?;
//!
//! let task = client
//!     .pool()
//!     .create_vm("pool-uuid", &CreateVmRequest::new("vm1", "template-uuid"))
//!     .await?;
//! println!("created {:?}", task.result_id());
//! client.close().await;
//! # Ok(())
//! # }
//! ```

mod options;
mod tls;

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_tungstenite::Connector;
use tracing::info;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::lookup::LookupService;
use crate::resources::{
    BackupService, HostService, NetworkService, PoolService, RestoreService, ScheduleService,
    SnapshotService, SrService, TagService, VdiService, VmService,
};
use crate::rest::RestClient;
use crate::rpc::RpcClient;
use crate::runtime::RequestLogger;
use crate::tasks::TaskService;

pub use options::CallOptions;

/// A signed-in XO session.
///
/// Cheap to clone; clones share the socket, the HTTP pool and the token.
#[derive(Clone, Debug)]
pub struct XoClient {
    config: ClientConfig,
    rest: RestClient,
    rpc: RpcClient,
    tasks: TaskService,
    logger: Arc<RequestLogger>,
}

impl XoClient {
    /// Connect and sign in.
    ///
    /// # Errors
    ///
    /// `kind=auth` when the server rejects the credentials, `kind=transport`
    /// when it cannot be reached, `kind=config` when TLS cannot be set up.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let tls = tls::client_tls_config(&config)?;
        let http = tls::http_client(tls.clone())?;
        let connector = if config.is_tls() {
            Some(Connector::Rustls(Arc::new(tls)))
        } else {
            None
        };

        let token = Arc::new(RwLock::new(None));
        let logger = Arc::new(RequestLogger::with_config(config.logging().clone()));

        let rpc = RpcClient::connect(
            config.clone(),
            connector,
            Arc::clone(&token),
            Arc::clone(&logger),
        )
        .await?;
        let rest = RestClient::new(&config, http, token, Arc::clone(&logger));
        let tasks = TaskService::new(rest.clone());

        info!(target: "xo_api::rest", base = %rest.base(), "session ready");
        Ok(Self {
            config,
            rest,
            rpc,
            tasks,
            logger,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Request logger shared by both transports.
    #[must_use]
    pub fn logger(&self) -> &RequestLogger {
        &self.logger
    }

    /// The REST transport.
    #[must_use]
    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// The legacy JSON-RPC transport.
    #[must_use]
    pub fn jsonrpc(&self) -> &RpcClient {
        &self.rpc
    }

    /// The task engine.
    #[must_use]
    pub fn task(&self) -> &TaskService {
        &self.tasks
    }

    #[must_use]
    pub fn lookup(&self) -> LookupService<'_> {
        LookupService::new(&self.rpc)
    }

    #[must_use]
    pub fn vm(&self) -> VmService<'_> {
        VmService::new(self)
    }

    #[must_use]
    pub fn pool(&self) -> PoolService<'_> {
        PoolService::new(self)
    }

    #[must_use]
    pub fn host(&self) -> HostService<'_> {
        HostService::new(self)
    }

    #[must_use]
    pub fn network(&self) -> NetworkService<'_> {
        NetworkService::new(self)
    }

    #[must_use]
    pub fn vdi(&self) -> VdiService<'_> {
        VdiService::new(self)
    }

    #[must_use]
    pub fn sr(&self) -> SrService<'_> {
        SrService::new(self)
    }

    #[must_use]
    pub fn snapshot(&self) -> SnapshotService<'_> {
        SnapshotService::new(self)
    }

    #[must_use]
    pub fn restore(&self) -> RestoreService<'_> {
        RestoreService::new(self)
    }

    #[must_use]
    pub fn backup(&self) -> BackupService<'_> {
        BackupService::new(self)
    }

    #[must_use]
    pub fn schedule(&self) -> ScheduleService<'_> {
        ScheduleService::new(self)
    }

    #[must_use]
    pub fn tags(&self) -> TagService<'_> {
        TagService::new(self)
    }

    /// Close the WebSocket. Calls still in flight fail with `kind=cancelled`.
    pub async fn close(&self) {
        self.rpc.close().await;
        info!(target: "xo_api::rpc", "session closed");
    }
}

#[cfg(test)]
mod tests;
