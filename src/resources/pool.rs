// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{get_object, list_objects, require, run_action, CreateNetworkRequest, CreateVmRequest};
use crate::client::{CallOptions, XoClient};
use crate::codec::ResourceId;
use crate::error::{Result, XoError};
use crate::lookup::{field_matches, id_decides, tags_contained, XoObject};
use crate::rest::{Params, RestPath};
use crate::tasks::Task;

const DEFAULT_FIELDS: &[&str] = &[
    "id",
    "type",
    "name_label",
    "name_description",
    "master",
    "default_SR",
    "tags",
];

/// A resource pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name_label: String,
    #[serde(default)]
    pub name_description: String,
    /// Host acting as pool master.
    #[serde(default)]
    pub master: String,
    #[serde(rename = "default_SR", default)]
    pub default_sr: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl XoObject for Pool {
    const KIND: &'static str = "pool";

    fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, candidate: &Self) -> bool {
        if let Some(decided) = id_decides(&self.id, &candidate.id) {
            return decided;
        }
        field_matches(&self.name_label, &candidate.name_label)
            && field_matches(&self.master, &candidate.master)
            && tags_contained(&self.tags, &candidate.tags)
    }
}

/// Pool-wide actions under `/pools/<id>/actions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolAction {
    EmergencyShutdown,
    RollingReboot,
    RollingUpdate,
}

impl PoolAction {
    #[must_use]
    pub fn verb(self) -> &'static str {
        match self {
            PoolAction::EmergencyShutdown => "emergency_shutdown",
            PoolAction::RollingReboot => "rolling_reboot",
            PoolAction::RollingUpdate => "rolling_update",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PoolService<'a> {
    client: &'a XoClient,
}

impl<'a> PoolService<'a> {
    pub(crate) fn new(client: &'a XoClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &str) -> Result<Pool> {
        get_object(self.client, &CallOptions::default(), "pools", id).await
    }

    pub async fn list(&self, params: &Params) -> Result<Vec<Pool>> {
        list_objects(self.client, &CallOptions::default(), "pools", params, DEFAULT_FIELDS).await
    }

    /// Create a VM on `pool_id` and wait for the task.
    ///
    /// The returned task carries the new VM's UUID in `result.id`.
    pub async fn create_vm(&self, pool_id: &str, request: &CreateVmRequest) -> Result<Task> {
        self.create_vm_with(&CallOptions::default(), pool_id, request)
            .await
    }

    pub async fn create_vm_with(
        &self,
        opts: &CallOptions,
        pool_id: &str,
        request: &CreateVmRequest,
    ) -> Result<Task> {
        require("pool", pool_id)?;
        request.validate()?;
        let path = RestPath::object("pools", pool_id)
            .actions_group()
            .action("create_vm");
        run_action(self.client, opts, &path, request).await
    }

    /// Create a network on `pool_id` through JSON-RPC `network.create`.
    pub async fn create_network(
        &self,
        pool_id: &str,
        request: &CreateNetworkRequest,
    ) -> Result<ResourceId> {
        require("pool", pool_id)?;
        request.validate()?;
        let mut params = serde_json::to_value(request)?;
        if let Value::Object(map) = &mut params {
            map.insert("pool".to_string(), Value::String(pool_id.to_string()));
        }
        let id: String = self.client.jsonrpc().call("network.create", params).await?;
        if id.is_empty() {
            return Err(XoError::decode("network.create returned an empty id"));
        }
        Ok(ResourceId::parse(&id))
    }

    pub async fn action(&self, pool_id: &str, action: PoolAction) -> Result<Task> {
        require("pool", pool_id)?;
        let path = RestPath::object("pools", pool_id)
            .actions_group()
            .action(action.verb());
        run_action(self.client, &CallOptions::default(), &path, &json!({})).await
    }
}
