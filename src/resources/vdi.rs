// SPDX-License-Identifier: MIT OR Apache-2.0

//! Virtual disks, including raw and VHD import/export streams.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};

use super::{get_object, list_objects, require};
use crate::client::{CallOptions, XoClient};
use crate::codec::FlexInt;
use crate::error::{Result, XoError};
use crate::lookup::{field_matches, id_decides, tags_contained, XoObject};
use crate::rest::{Params, RestPath};
use crate::tasks::Task;

const DEFAULT_FIELDS: &[&str] = &[
    "id",
    "type",
    "name_label",
    "name_description",
    "$poolId",
    "$SR",
    "size",
    "usage",
    "$VBDs",
    "tags",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vdi {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name_label: String,
    #[serde(default)]
    pub name_description: String,
    #[serde(rename = "$poolId", default)]
    pub pool_id: String,
    #[serde(rename = "$SR", default)]
    pub sr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<FlexInt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<FlexInt>,
    #[serde(rename = "$VBDs", default)]
    pub vbds: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl XoObject for Vdi {
    const KIND: &'static str = "VDI";

    fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, candidate: &Self) -> bool {
        if let Some(decided) = id_decides(&self.id, &candidate.id) {
            return decided;
        }
        field_matches(&self.name_label, &candidate.name_label)
            && field_matches(&self.pool_id, &candidate.pool_id)
            && field_matches(&self.sr, &candidate.sr)
            && tags_contained(&self.tags, &candidate.tags)
    }
}

/// On-the-wire disk image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiskFormat {
    #[default]
    Vhd,
    Raw,
}

impl DiskFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DiskFormat::Vhd => "vhd",
            DiskFormat::Raw => "raw",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VdiService<'a> {
    client: &'a XoClient,
}

impl<'a> VdiService<'a> {
    pub(crate) fn new(client: &'a XoClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &str) -> Result<Vdi> {
        get_object(self.client, &CallOptions::default(), "vdis", id).await
    }

    pub async fn list(&self, params: &Params) -> Result<Vec<Vdi>> {
        list_objects(self.client, &CallOptions::default(), "vdis", params, DEFAULT_FIELDS).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        require("id", id)?;
        let _: Value = self
            .client
            .rest()
            .delete(&RestPath::object("vdis", id), &Params::new())
            .await?;
        Ok(())
    }

    /// Move a disk to another SR and wait for the migration.
    pub async fn migrate(&self, id: &str, sr_id: &str) -> Result<Task> {
        require("id", id)?;
        require("sr", sr_id)?;
        let envelope: Value = self
            .client
            .jsonrpc()
            .call("vdi.migrate", json!({ "id": id, "sr_id": sr_id }))
            .await?;
        self.client.task().handle_task_response(envelope, true).await
    }

    /// Upload a disk image of `size` bytes into `sr_id`.
    ///
    /// The task result carries the new VDI's UUID.
    pub async fn import<R>(
        &self,
        sr_id: &str,
        name_label: &str,
        format: DiskFormat,
        reader: R,
        size: u64,
    ) -> Result<Task>
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        self.import_with(&CallOptions::default(), sr_id, name_label, format, reader, size)
            .await
    }

    pub async fn import_with<R>(
        &self,
        opts: &CallOptions,
        sr_id: &str,
        name_label: &str,
        format: DiskFormat,
        reader: R,
        size: u64,
    ) -> Result<Task>
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        require("sr", sr_id)?;
        require("name_label", name_label)?;
        if size == 0 {
            return Err(XoError::validation("import size must be positive"));
        }
        let path = RestPath::object("srs", sr_id).resource("vdis");
        let params = Params::new()
            .insert("name_label", name_label)
            .insert("format", format.as_str());
        let envelope: Value = self
            .client
            .rest()
            .upload_with(opts, &path, &params, reader, size)
            .await?;
        self.client
            .task()
            .handle_task_response_with(opts, envelope, true)
            .await
    }

    /// Stream the disk content into `sink`, returning the bytes written.
    pub async fn export<W>(&self, id: &str, format: DiskFormat, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        require("id", id)?;
        let path = RestPath::collection("vdis").id(format!("{id}.{}", format.as_str()));
        self.client.rest().download(&path, &Params::new(), sink).await
    }
}
