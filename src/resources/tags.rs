// SPDX-License-Identifier: MIT OR Apache-2.0

use serde_json::{json, Value};

use super::require;
use crate::client::XoClient;
use crate::error::Result;

/// Tags on any object, through the legacy `tag.*` methods.
#[derive(Debug, Clone, Copy)]
pub struct TagService<'a> {
    client: &'a XoClient,
}

impl<'a> TagService<'a> {
    pub(crate) fn new(client: &'a XoClient) -> Self {
        Self { client }
    }

    pub async fn add(&self, object_id: &str, tag: &str) -> Result<()> {
        self.send("tag.add", object_id, tag).await
    }

    pub async fn remove(&self, object_id: &str, tag: &str) -> Result<()> {
        self.send("tag.remove", object_id, tag).await
    }

    async fn send(&self, method: &str, object_id: &str, tag: &str) -> Result<()> {
        require("id", object_id)?;
        require("tag", tag)?;
        let _: Value = self
            .client
            .jsonrpc()
            .call(method, json!({ "tag": tag, "id": object_id }))
            .await?;
        Ok(())
    }
}
