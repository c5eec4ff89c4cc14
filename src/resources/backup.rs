// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backup jobs (`backupNg.*` over JSON-RPC).

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::require;
use crate::client::XoClient;
use crate::codec::{BackupMode, Extensible, Selection};
use crate::error::{Result, XoError};

/// A backup job definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupJob {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Extensible<BackupMode>>,
    #[serde(default)]
    pub vms: Selection,
    #[serde(default, skip_serializing_if = "Selection::is_empty")]
    pub remotes: Selection,
    #[serde(default, skip_serializing_if = "Selection::is_empty")]
    pub srs: Selection,
    /// Per-schedule settings keyed by schedule ID; `""` holds job defaults.
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// Parameters of `backupNg.createJob`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateBackupJob {
    pub name: String,
    pub mode: BackupMode,
    pub vms: Selection,
    #[serde(skip_serializing_if = "Selection::is_empty")]
    pub remotes: Selection,
    #[serde(skip_serializing_if = "Selection::is_empty")]
    pub srs: Selection,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub settings: Map<String, Value>,
    /// Schedules created together with the job, keyed by a temporary ID.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub schedules: Map<String, Value>,
}

impl CreateBackupJob {
    #[must_use]
    pub fn new(name: impl Into<String>, mode: BackupMode) -> Self {
        Self {
            name: name.into(),
            mode,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn vms(mut self, vms: impl Into<Selection>) -> Self {
        self.vms = vms.into();
        self
    }

    #[must_use]
    pub fn remotes(mut self, remotes: impl Into<Selection>) -> Self {
        self.remotes = remotes.into();
        self
    }

    #[must_use]
    pub fn srs(mut self, srs: impl Into<Selection>) -> Self {
        self.srs = srs.into();
        self
    }

    #[must_use]
    pub fn setting(mut self, schedule: impl Into<String>, value: Value) -> Self {
        self.settings.insert(schedule.into(), value);
        self
    }

    #[allow(clippy::result_large_err)]
    fn validate(&self) -> Result<()> {
        require("name", &self.name)?;
        if self.vms.is_empty() {
            return Err(XoError::validation("a backup job needs at least one VM"));
        }
        if self.remotes.is_empty() && self.srs.is_empty() {
            return Err(XoError::validation(
                "a backup job needs a remote or an SR target",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BackupService<'a> {
    client: &'a XoClient,
}

impl<'a> BackupService<'a> {
    pub(crate) fn new(client: &'a XoClient) -> Self {
        Self { client }
    }

    /// Create a job, returning its ID.
    pub async fn create_job(&self, job: &CreateBackupJob) -> Result<String> {
        job.validate()?;
        let id: String = self.client.jsonrpc().call("backupNg.createJob", job).await?;
        Ok(id)
    }

    pub async fn get_job(&self, id: &str) -> Result<BackupJob> {
        require("id", id)?;
        self.client
            .jsonrpc()
            .call("backupNg.getJob", json!({ "id": id }))
            .await
    }

    pub async fn list_jobs(&self) -> Result<Vec<BackupJob>> {
        self.client.jsonrpc().call("backupNg.getAllJobs", json!({})).await
    }

    /// Replace the editable members of an existing job.
    pub async fn update_job(&self, job: &BackupJob) -> Result<()> {
        require("id", &job.id)?;
        let _: Value = self.client.jsonrpc().call("backupNg.editJob", job).await?;
        Ok(())
    }

    pub async fn delete_job(&self, id: &str) -> Result<()> {
        require("id", id)?;
        let _: Value = self
            .client
            .jsonrpc()
            .call("backupNg.deleteJob", json!({ "id": id }))
            .await?;
        Ok(())
    }

    /// Start a job run for one of its schedules.
    pub async fn run_job(&self, id: &str, schedule_id: &str) -> Result<Value> {
        require("id", id)?;
        require("schedule", schedule_id)?;
        self.client
            .jsonrpc()
            .call("backupNg.runJob", json!({ "id": id, "schedule": schedule_id }))
            .await
    }
}
