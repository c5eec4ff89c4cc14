// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job schedules (`schedule.*` over JSON-RPC).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::require;
use crate::client::XoClient;
use crate::error::{Result, XoError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "jobId", default)]
    pub job_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cron: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// Parameters of `schedule.create`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateSchedule {
    #[serde(rename = "jobId")]
    pub job_id: String,
    pub cron: String,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl CreateSchedule {
    #[must_use]
    pub fn new(job_id: impl Into<String>, cron: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            cron: cron.into(),
            enabled: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Parameters of `schedule.set`; unset members are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScheduleUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// Accepts five (minute-first) or six (second-first) whitespace-separated fields.
#[allow(clippy::result_large_err)]
fn validate_cron(cron: &str) -> Result<()> {
    let fields = cron.split_whitespace().count();
    if !(5..=6).contains(&fields) {
        return Err(XoError::validation(format!(
            "cron expression {cron:?} has {fields} fields, expected 5 or 6"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct ScheduleService<'a> {
    client: &'a XoClient,
}

impl<'a> ScheduleService<'a> {
    pub(crate) fn new(client: &'a XoClient) -> Self {
        Self { client }
    }

    pub async fn create(&self, schedule: &CreateSchedule) -> Result<Schedule> {
        require("job", &schedule.job_id)?;
        validate_cron(&schedule.cron)?;
        self.client.jsonrpc().call("schedule.create", schedule).await
    }

    pub async fn get(&self, id: &str) -> Result<Schedule> {
        require("id", id)?;
        self.client
            .jsonrpc()
            .call("schedule.get", json!({ "id": id }))
            .await
    }

    pub async fn list(&self) -> Result<Vec<Schedule>> {
        self.client.jsonrpc().call("schedule.getAll", json!({})).await
    }

    pub async fn update(&self, id: &str, update: &ScheduleUpdate) -> Result<()> {
        require("id", id)?;
        if let Some(cron) = &update.cron {
            validate_cron(cron)?;
        }
        let mut params = serde_json::to_value(update)?;
        if let Value::Object(map) = &mut params {
            map.insert("id".to_string(), Value::String(id.to_string()));
        }
        let _: Value = self.client.jsonrpc().call("schedule.set", params).await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        require("id", id)?;
        let _: Value = self
            .client
            .jsonrpc()
            .call("schedule.delete", json!({ "id": id }))
            .await?;
        Ok(())
    }
}
