// SPDX-License-Identifier: MIT OR Apache-2.0

//! Networks, physical interfaces and bonds.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{get_object, list_objects, require};
use crate::client::{CallOptions, XoClient};
use crate::codec::FlexInt;
use crate::error::{Result, XoError};
use crate::lookup::{field_matches, id_decides, tags_contained, XoObject};
use crate::rest::Params;

/// Highest usable 802.1Q VLAN tag.
pub const MAX_VLAN: u16 = 4094;

const DEFAULT_FIELDS: &[&str] = &[
    "id",
    "type",
    "name_label",
    "name_description",
    "$poolId",
    "bridge",
    "MTU",
    "automatic",
    "PIFs",
    "tags",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name_label: String,
    #[serde(default)]
    pub name_description: String,
    #[serde(rename = "$poolId", default)]
    pub pool_id: String,
    #[serde(default)]
    pub bridge: String,
    #[serde(rename = "MTU", default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<FlexInt>,
    #[serde(default)]
    pub automatic: bool,
    #[serde(rename = "PIFs", default)]
    pub pifs: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl XoObject for Network {
    const KIND: &'static str = "network";

    fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, candidate: &Self) -> bool {
        if let Some(decided) = id_decides(&self.id, &candidate.id) {
            return decided;
        }
        field_matches(&self.name_label, &candidate.name_label)
            && field_matches(&self.pool_id, &candidate.pool_id)
            && field_matches(&self.bridge, &candidate.bridge)
            && tags_contained(&self.tags, &candidate.tags)
    }
}

/// Physical (or VLAN) interface of a host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pif {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub device: String,
    #[serde(rename = "$poolId", default)]
    pub pool_id: String,
    #[serde(rename = "$network", default)]
    pub network: String,
    #[serde(rename = "$host", default)]
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<FlexInt>,
    #[serde(default)]
    pub attached: bool,
    #[serde(default)]
    pub management: bool,
    #[serde(rename = "isBondMaster", default)]
    pub is_bond_master: bool,
    #[serde(default)]
    pub physical: bool,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub mac: String,
}

impl XoObject for Pif {
    const KIND: &'static str = "PIF";

    fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, candidate: &Self) -> bool {
        if let Some(decided) = id_decides(&self.id, &candidate.id) {
            return decided;
        }
        field_matches(&self.device, &candidate.device)
            && field_matches(&self.pool_id, &candidate.pool_id)
            && field_matches(&self.host, &candidate.host)
            && field_matches(&self.network, &candidate.network)
            && field_matches(&self.vlan, &candidate.vlan)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bond {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "$poolId", default)]
    pub pool_id: String,
    /// The bond's own PIF.
    #[serde(default)]
    pub master: String,
    #[serde(default)]
    pub slaves: Vec<String>,
    #[serde(default)]
    pub mode: String,
}

impl XoObject for Bond {
    const KIND: &'static str = "bond";

    fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, candidate: &Self) -> bool {
        if let Some(decided) = id_decides(&self.id, &candidate.id) {
            return decided;
        }
        field_matches(&self.pool_id, &candidate.pool_id)
            && field_matches(&self.master, &candidate.master)
            && field_matches(&self.mode, &candidate.mode)
    }
}

/// Parameters of JSON-RPC `network.create`. The pool is supplied separately.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateNetworkRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// PIF carrying the VLAN.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pif: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan: Option<u16>,
}

impl CreateNetworkRequest {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn vlan(mut self, pif: impl Into<String>, vlan: u16) -> Self {
        self.pif = Some(pif.into());
        self.vlan = Some(vlan);
        self
    }

    #[must_use]
    pub fn mtu(mut self, mtu: u32) -> Self {
        self.mtu = Some(mtu);
        self
    }

    #[allow(clippy::result_large_err)]
    pub(crate) fn validate(&self) -> Result<()> {
        require("name", &self.name)?;
        if let Some(vlan) = self.vlan {
            if vlan > MAX_VLAN {
                return Err(XoError::validation(format!(
                    "VLAN {vlan} is outside 0..={MAX_VLAN}"
                )));
            }
            match &self.pif {
                Some(pif) => require("pif", pif)?,
                None => return Err(XoError::validation("a VLAN network needs a PIF")),
            }
        }
        if self.mtu == Some(0) {
            return Err(XoError::validation("MTU must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NetworkService<'a> {
    client: &'a XoClient,
}

impl<'a> NetworkService<'a> {
    pub(crate) fn new(client: &'a XoClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &str) -> Result<Network> {
        get_object(self.client, &CallOptions::default(), "networks", id).await
    }

    pub async fn list(&self, params: &Params) -> Result<Vec<Network>> {
        list_objects(self.client, &CallOptions::default(), "networks", params, DEFAULT_FIELDS).await
    }

    /// Create a network; shorthand for the pool service.
    pub async fn create(
        &self,
        pool_id: &str,
        request: &CreateNetworkRequest,
    ) -> Result<crate::codec::ResourceId> {
        self.client.pool().create_network(pool_id, request).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        require("id", id)?;
        let _: Value = self
            .client
            .jsonrpc()
            .call("network.delete", json!({ "id": id }))
            .await?;
        Ok(())
    }
}
