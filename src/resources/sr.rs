// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

use super::{get_object, list_objects};
use crate::client::{CallOptions, XoClient};
use crate::codec::FlexInt;
use crate::error::Result;
use crate::lookup::{field_matches, id_decides, tags_contained, XoObject};
use crate::rest::Params;

const DEFAULT_FIELDS: &[&str] = &[
    "id",
    "type",
    "name_label",
    "name_description",
    "$poolId",
    "$container",
    "SR_type",
    "content_type",
    "shared",
    "size",
    "physical_usage",
    "usage",
    "tags",
];

/// A storage repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sr {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name_label: String,
    #[serde(default)]
    pub name_description: String,
    #[serde(rename = "$poolId", default)]
    pub pool_id: String,
    #[serde(rename = "$container", default)]
    pub container: String,
    #[serde(rename = "SR_type", default)]
    pub sr_type: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub shared: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<FlexInt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_usage: Option<FlexInt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<FlexInt>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Sr {
    /// Bytes still available, when the server reported both figures.
    #[must_use]
    pub fn free_space(&self) -> Option<i64> {
        match (self.size, self.physical_usage) {
            (Some(size), Some(used)) => Some((size.get() - used.get()).max(0)),
            _ => None,
        }
    }
}

impl XoObject for Sr {
    const KIND: &'static str = "SR";

    fn id(&self) -> &str {
        &self.id
    }

    fn matches(&self, candidate: &Self) -> bool {
        if let Some(decided) = id_decides(&self.id, &candidate.id) {
            return decided;
        }
        field_matches(&self.name_label, &candidate.name_label)
            && field_matches(&self.pool_id, &candidate.pool_id)
            && field_matches(&self.sr_type, &candidate.sr_type)
            && tags_contained(&self.tags, &candidate.tags)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SrService<'a> {
    client: &'a XoClient,
}

impl<'a> SrService<'a> {
    pub(crate) fn new(client: &'a XoClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, id: &str) -> Result<Sr> {
        get_object(self.client, &CallOptions::default(), "srs", id).await
    }

    pub async fn list(&self, params: &Params) -> Result<Vec<Sr>> {
        list_objects(self.client, &CallOptions::default(), "srs", params, DEFAULT_FIELDS).await
    }
}
