// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-resource services and the payload types they exchange.
//!
//! Every service borrows the [`XoClient`](crate::XoClient) it came from and
//! only uses its REST transport, its JSON-RPC transport and its task engine.
//! Parameters are validated before anything is sent.

mod backup;
mod host;
mod network;
mod pool;
mod restore;
mod schedule;
mod snapshot;
mod sr;
mod tags;
mod vdi;
mod vm;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::client::{CallOptions, XoClient};
use crate::error::{Result, XoError};
use crate::rest::{Params, RestPath};
use crate::tasks::Task;

pub use backup::{BackupJob, BackupService, CreateBackupJob};
pub use host::{Host, HostService};
pub use network::{Bond, CreateNetworkRequest, Network, NetworkService, Pif, MAX_VLAN};
pub use pool::{Pool, PoolAction, PoolService};
pub use restore::{BackupIndex, RestoreService, VmBackup};
pub use schedule::{CreateSchedule, Schedule, ScheduleService, ScheduleUpdate};
pub use snapshot::{Snapshot, SnapshotService};
pub use sr::{Sr, SrService};
pub use tags::TagService;
pub use vdi::{DiskFormat, Vdi, VdiService};
pub use vm::{
    CreateVmRequest, NewDisk, NewVif, Vm, VmAction, VmCpus, VmExportFormat, VmMemory, VmService,
    VmTemplate,
};

#[allow(clippy::result_large_err)]
pub(crate) fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(XoError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

pub(crate) async fn get_object<T: DeserializeOwned>(
    client: &XoClient,
    opts: &CallOptions,
    collection: &str,
    id: &str,
) -> Result<T> {
    require("id", id)?;
    client
        .rest()
        .get_with(opts, &RestPath::object(collection, id), &Params::new())
        .await
}

/// List a collection, asking for `default_fields` when the caller named none.
pub(crate) async fn list_objects<T: DeserializeOwned>(
    client: &XoClient,
    opts: &CallOptions,
    collection: &str,
    params: &Params,
    default_fields: &[&str],
) -> Result<Vec<T>> {
    let params = if params.contains("fields") {
        params.clone()
    } else {
        params.clone().fields(default_fields.iter().copied())
    };
    client
        .rest()
        .get_with(opts, &RestPath::collection(collection), &params)
        .await
}

/// POST to an action endpoint and wait for the resulting task.
pub(crate) async fn run_action<B: Serialize + ?Sized>(
    client: &XoClient,
    opts: &CallOptions,
    path: &RestPath,
    body: &B,
) -> Result<Task> {
    let envelope: Value = client.rest().post_with(opts, path, body).await?;
    client
        .task()
        .handle_task_response_with(opts, envelope, true)
        .await
}
