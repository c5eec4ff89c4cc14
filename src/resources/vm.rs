// SPDX-License-Identifier: MIT OR Apache-2.0

//! Virtual machines.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::AsyncWrite;

use super::{get_object, list_objects, require, run_action};
use crate::client::{CallOptions, XoClient};
use crate::codec::{Extensible, FlexInt, PowerState};
use crate::error::Result;
use crate::lookup::{field_matches, id_decides, tags_contained, XoObject};
use crate::rest::{Params, RestPath};
use crate::tasks::Task;

const DEFAULT_FIELDS: &[&str] = &[
    "id",
    "type",
    "name_label",
    "name_description",
    "power_state",
    "$poolId",
    "$container",
    "CPUs",
    "memory",
    "tags",
    "videoram",
    "auto_poweron",
    "VIFs",
    "$VBDs",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VmCpus {
    #[serde(default)]
    pub number: Option<FlexInt>,
    #[serde(default)]
    pub max: Option<FlexInt>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VmMemory {
    #[serde(default)]
    pub size: Option<FlexInt>,
    #[serde(default)]
    pub dynamic: Vec<FlexInt>,
    #[serde(rename = "static", default)]
    pub static_range: Vec<FlexInt>,
}

/// A virtual machine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vm {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name_label: String,
    #[serde(default)]
    pub name_description: String,
    #[serde(rename = "$poolId", default)]
    pub pool_id: String,
    /// Host the VM runs on, or its pool when halted.
    #[serde(rename = "$container", default)]
    pub container: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_state: Option<Extensible<PowerState>>,
    #[serde(rename = "CPUs", default, skip_serializing_if = "Option::is_none")]
    pub cpus: Option<VmCpus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<VmMemory>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub videoram: Option<FlexInt>,
    #[serde(default)]
    pub auto_poweron: bool,
    #[serde(rename = "VIFs", default)]
    pub vifs: Vec<String>,
    #[serde(rename = "$VBDs", default)]
    pub vbds: Vec<String>,
}

impl XoObject for Vm {
    const KIND: &'static str = "VM";

    fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, candidate: &Self) -> bool {
        if let Some(decided) = id_decides(&self.id, &candidate.id) {
            return decided;
        }
        field_matches(&self.name_label, &candidate.name_label)
            && field_matches(&self.pool_id, &candidate.pool_id)
            && field_matches(&self.container, &candidate.container)
            && field_matches(&self.power_state, &candidate.power_state)
            && tags_contained(&self.tags, &candidate.tags)
    }
}

/// A VM template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VmTemplate {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name_label: String,
    #[serde(default)]
    pub name_description: String,
    #[serde(rename = "$poolId", default)]
    pub pool_id: String,
    #[serde(rename = "isDefaultTemplate", default)]
    pub is_default_template: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl XoObject for VmTemplate {
    const KIND: &'static str = "VM-template";

    fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, candidate: &Self) -> bool {
        if let Some(decided) = id_decides(&self.id, &candidate.id) {
            return decided;
        }
        field_matches(&self.name_label, &candidate.name_label)
            && field_matches(&self.pool_id, &candidate.pool_id)
            && tags_contained(&self.tags, &candidate.tags)
    }
}

/// Network interface of a VM being created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewVif {
    pub network: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
}

/// Disk of a VM being created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewDisk {
    pub name_label: String,
    pub size: u64,
    #[serde(rename = "SR", skip_serializing_if = "Option::is_none")]
    pub sr: Option<String>,
}

/// Body of `POST /pools/<id>/actions/create_vm`.
///
/// ```
/// use xo_api_rs::resources::CreateVmRequest;
///
/// let req = CreateVmRequest::new("vm1", "tpl-uuid")
///     .description("build agent")
///     .boot(true);
/// assert_eq!(req.name_label, "vm1");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateVmRequest {
    pub name_label: String,
    pub template: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affinity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_config: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_config: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vifs: Vec<NewVif>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vdis: Vec<NewDisk>,
}

impl CreateVmRequest {
    #[must_use]
    pub fn new(name_label: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name_label: name_label.into(),
            template: template.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.name_description = Some(description.into());
        self
    }

    /// Start the VM once created.
    #[must_use]
    pub fn boot(mut self, boot: bool) -> Self {
        self.boot = Some(boot);
        self
    }

    /// Preferred host.
    #[must_use]
    pub fn affinity(mut self, host: impl Into<String>) -> Self {
        self.affinity = Some(host.into());
        self
    }

    #[must_use]
    pub fn cloud_config(mut self, config: impl Into<String>) -> Self {
        self.cloud_config = Some(config.into());
        self
    }

    #[must_use]
    pub fn network_config(mut self, config: impl Into<String>) -> Self {
        self.network_config = Some(config.into());
        self
    }

    #[must_use]
    pub fn vif(mut self, network: impl Into<String>, mac: Option<String>) -> Self {
        self.vifs.push(NewVif {
            network: network.into(),
            mac,
        });
        self
    }

    #[must_use]
    pub fn disk(mut self, name_label: impl Into<String>, size: u64, sr: Option<String>) -> Self {
        self.vdis.push(NewDisk {
            name_label: name_label.into(),
            size,
            sr,
        });
        self
    }

    #[allow(clippy::result_large_err)]
    pub(crate) fn validate(&self) -> Result<()> {
        require("name_label", &self.name_label)?;
        require("template", &self.template)?;
        for vif in &self.vifs {
            require("vif network", &vif.network)?;
        }
        for disk in &self.vdis {
            require("disk name_label", &disk.name_label)?;
            if disk.size == 0 {
                return Err(crate::error::XoError::validation("disk size must be positive"));
            }
        }
        Ok(())
    }
}

/// Lifecycle actions exposed under `/vms/<id>/actions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmAction {
    Start,
    CleanShutdown,
    HardShutdown,
    CleanReboot,
    HardReboot,
    Pause,
    Unpause,
    Suspend,
    Resume,
}

impl VmAction {
    #[must_use]
    pub fn verb(self) -> &'static str {
        match self {
            VmAction::Start => "start",
            VmAction::CleanShutdown => "clean_shutdown",
            VmAction::HardShutdown => "hard_shutdown",
            VmAction::CleanReboot => "clean_reboot",
            VmAction::HardReboot => "hard_reboot",
            VmAction::Pause => "pause",
            VmAction::Unpause => "unpause",
            VmAction::Suspend => "suspend",
            VmAction::Resume => "resume",
        }
    }
}

/// Export container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VmExportFormat {
    #[default]
    Xva,
    Ova,
}

impl VmExportFormat {
    fn extension(self) -> &'static str {
        match self {
            VmExportFormat::Xva => "xva",
            VmExportFormat::Ova => "ova",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VmService<'a> {
    client: &'a XoClient,
}

impl<'a> VmService<'a> {
    pub(crate) fn new(client: &'a XoClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &str) -> Result<Vm> {
        get_object(self.client, &CallOptions::default(), "vms", id).await
    }

    pub async fn list(&self, params: &Params) -> Result<Vec<Vm>> {
        self.list_with(&CallOptions::default(), params).await
    }

    pub async fn list_with(&self, opts: &CallOptions, params: &Params) -> Result<Vec<Vm>> {
        list_objects(self.client, opts, "vms", params, DEFAULT_FIELDS).await
    }

    /// Create a VM on a pool and wait for it to exist.
    pub async fn create(&self, pool_id: &str, request: &CreateVmRequest) -> Result<Task> {
        self.client.pool().create_vm(pool_id, request).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        require("id", id)?;
        let _: Value = self
            .client
            .rest()
            .delete(&RestPath::object("vms", id), &Params::new())
            .await?;
        Ok(())
    }

    /// Run a lifecycle action and wait for it.
    pub async fn action(&self, id: &str, action: VmAction) -> Result<Task> {
        self.action_with(&CallOptions::default(), id, action).await
    }

    pub async fn action_with(&self, opts: &CallOptions, id: &str, action: VmAction) -> Result<Task> {
        require("id", id)?;
        let path = RestPath::object("vms", id)
            .actions_group()
            .action(action.verb());
        run_action(self.client, opts, &path, &json!({})).await
    }

    pub async fn start(&self, id: &str) -> Result<Task> {
        self.action(id, VmAction::Start).await
    }

    pub async fn clean_shutdown(&self, id: &str) -> Result<Task> {
        self.action(id, VmAction::CleanShutdown).await
    }

    pub async fn add_tag(&self, id: &str, tag: &str) -> Result<()> {
        require("id", id)?;
        require("tag", tag)?;
        let path = RestPath::object("vms", id).resource("tags").segment(tag);
        let _: Value = self.client.rest().put(&path, &json!({})).await?;
        Ok(())
    }

    pub async fn remove_tag(&self, id: &str, tag: &str) -> Result<()> {
        require("id", id)?;
        require("tag", tag)?;
        let path = RestPath::object("vms", id).resource("tags").segment(tag);
        let _: Value = self.client.rest().delete(&path, &Params::new()).await?;
        Ok(())
    }

    /// Stream an export of the VM into `sink`, returning the bytes written.
    pub async fn export<W>(
        &self,
        id: &str,
        format: VmExportFormat,
        compress: bool,
        sink: &mut W,
    ) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        self.export_with(&CallOptions::default(), id, format, compress, sink)
            .await
    }

    pub async fn export_with<W>(
        &self,
        opts: &CallOptions,
        id: &str,
        format: VmExportFormat,
        compress: bool,
        sink: &mut W,
    ) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        require("id", id)?;
        let path = RestPath::collection("vms").id(format!("{id}.{}", format.extension()));
        let params = if compress {
            Params::new().insert("compress", "zstd")
        } else {
            Params::new()
        };
        self.client
            .rest()
            .download_with(opts, &path, &params, sink)
            .await
    }
}
