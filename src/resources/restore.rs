// SPDX-License-Identifier: MIT OR Apache-2.0

//! Restoring VMs from backups stored on remotes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::require;
use crate::client::XoClient;
use crate::codec::{BackupMode, Extensible, FlexInt, Timestamp};
use crate::error::{Result, XoError};
use crate::tasks::Task;

/// One restorable VM backup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmBackup {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Extensible<BackupMode>>,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<FlexInt>,
    #[serde(rename = "jobId", default)]
    pub job_id: String,
    #[serde(rename = "scheduleId", default)]
    pub schedule_id: String,
}

/// Backups per remote, then per VM UUID.
pub type BackupIndex = BTreeMap<String, BTreeMap<String, Vec<VmBackup>>>;

#[derive(Debug, Clone, Copy)]
pub struct RestoreService<'a> {
    client: &'a XoClient,
}

impl<'a> RestoreService<'a> {
    pub(crate) fn new(client: &'a XoClient) -> Self {
        Self { client }
    }

    /// Index the VM backups found on `remotes`.
    pub async fn list_vm_backups<S: AsRef<str>>(&self, remotes: &[S]) -> Result<BackupIndex> {
        if remotes.is_empty() {
            return Err(XoError::validation("at least one remote is required"));
        }
        let remotes: Vec<&str> = remotes.iter().map(AsRef::as_ref).collect();
        for remote in &remotes {
            require("remote", remote)?;
        }
        self.client
            .jsonrpc()
            .call("backupNg.listVmBackups", json!({ "remotes": remotes }))
            .await
    }

    /// The newest backup of `vm_id` across every listed remote.
    pub async fn latest_vm_backup<S: AsRef<str>>(
        &self,
        remotes: &[S],
        vm_id: &str,
    ) -> Result<VmBackup> {
        require("vm", vm_id)?;
        let index = self.list_vm_backups(remotes).await?;
        index
            .into_values()
            .filter_map(|mut per_vm| per_vm.remove(vm_id))
            .flatten()
            .max_by_key(|b| b.timestamp.timestamp_millis())
            .ok_or_else(|| XoError::NotFound(format!("no backup of VM {vm_id}")))
    }

    /// Restore a backup onto `sr_id` and wait; the task result carries the new VM.
    pub async fn import_vm_backup(&self, backup_id: &str, sr_id: &str) -> Result<Task> {
        require("backup", backup_id)?;
        require("sr", sr_id)?;
        let envelope: Value = self
            .client
            .jsonrpc()
            .call("backupNg.importVmBackup", json!({ "id": backup_id, "sr": sr_id }))
            .await?;
        self.client.task().handle_task_response(envelope, true).await
    }
}
