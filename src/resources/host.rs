// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

use super::{get_object, list_objects};
use crate::client::{CallOptions, XoClient};
use crate::error::Result;
use crate::lookup::{field_matches, id_decides, tags_contained, XoObject};
use crate::rest::Params;

const DEFAULT_FIELDS: &[&str] = &[
    "id",
    "type",
    "name_label",
    "name_description",
    "$poolId",
    "address",
    "hostname",
    "power_state",
    "version",
    "tags",
];

/// A hypervisor host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Host {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name_label: String,
    #[serde(default)]
    pub name_description: String,
    #[serde(rename = "$poolId", default)]
    pub pool_id: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_state: Option<String>,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl XoObject for Host {
    const KIND: &'static str = "host";

    fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, candidate: &Self) -> bool {
        if let Some(decided) = id_decides(&self.id, &candidate.id) {
            return decided;
        }
        field_matches(&self.name_label, &candidate.name_label)
            && field_matches(&self.pool_id, &candidate.pool_id)
            && field_matches(&self.address, &candidate.address)
            && tags_contained(&self.tags, &candidate.tags)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HostService<'a> {
    client: &'a XoClient,
}

impl<'a> HostService<'a> {
    pub(crate) fn new(client: &'a XoClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &str) -> Result<Host> {
        get_object(self.client, &CallOptions::default(), "hosts", id).await
    }

    pub async fn list(&self, params: &Params) -> Result<Vec<Host>> {
        list_objects(self.client, &CallOptions::default(), "hosts", params, DEFAULT_FIELDS).await
    }
}
