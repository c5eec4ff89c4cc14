// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{get_object, list_objects, require, run_action};
use crate::client::{CallOptions, XoClient};
use crate::error::Result;
use crate::rest::{Params, RestPath};
use crate::tasks::Task;

const COLLECTION: &str = "vm-snapshots";

const DEFAULT_FIELDS: &[&str] = &[
    "id",
    "name_label",
    "name_description",
    "$snapshot_of",
    "snapshot_time",
    "$poolId",
    "tags",
];

/// A VM snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name_label: String,
    #[serde(default)]
    pub name_description: String,
    /// The VM this snapshot was taken from.
    #[serde(rename = "$snapshot_of", default)]
    pub snapshot_of: String,
    /// Seconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_time: Option<i64>,
    #[serde(rename = "$poolId", default)]
    pub pool_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct SnapshotService<'a> {
    client: &'a XoClient,
}

impl<'a> SnapshotService<'a> {
    pub(crate) fn new(client: &'a XoClient) -> Self {
        Self { client }
    }

    /// Snapshot `vm_id` and wait; the task result carries the snapshot UUID.
    pub async fn create(&self, vm_id: &str, name_label: &str) -> Result<Task> {
        require("vm", vm_id)?;
        require("name_label", name_label)?;
        let path = RestPath::object("vms", vm_id)
            .actions_group()
            .action("snapshot");
        run_action(
            self.client,
            &CallOptions::default(),
            &path,
            &json!({ "name_label": name_label }),
        )
        .await
    }

    pub async fn get(&self, id: &str) -> Result<Snapshot> {
        get_object(self.client, &CallOptions::default(), COLLECTION, id).await
    }

    pub async fn list(&self, params: &Params) -> Result<Vec<Snapshot>> {
        list_objects(self.client, &CallOptions::default(), COLLECTION, params, DEFAULT_FIELDS)
            .await
    }

    /// Snapshots of one VM.
    pub async fn list_for_vm(&self, vm_id: &str) -> Result<Vec<Snapshot>> {
        require("vm", vm_id)?;
        self.list(&Params::new().filter("$snapshot_of", vm_id)).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        require("id", id)?;
        let _: Value = self
            .client
            .rest()
            .delete(&RestPath::object(COLLECTION, id), &Params::new())
            .await?;
        Ok(())
    }

    /// Revert the snapshot's VM to it.
    pub async fn revert(&self, id: &str) -> Result<()> {
        require("snapshot", id)?;
        let _: Value = self
            .client
            .jsonrpc()
            .call("vm.revert", json!({ "snapshot": id }))
            .await?;
        Ok(())
    }
}
