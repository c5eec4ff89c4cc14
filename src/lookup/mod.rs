// SPDX-License-Identifier: MIT OR Apache-2.0

//! Object lookup by example over the JSON-RPC `xo.getAllObjects` call.
//!
//! The caller fills in only the fields it cares about; every object of the
//! same kind is fetched and compared against that partial example.
//!
//! ```no_run
//! # async fn demo(client: &xo_api_rs::XoClient) -> xo_api_rs::Result<()> {
//! use xo_api_rs::resources::Pool;
//!
//! let example = Pool { name_label: "lab-1".into(), ..Pool::default() };
//! let pools = client.lookup().find(&example).await?;
//! # Ok(())
//! # }
//! ```

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use crate::client::CallOptions;
use crate::error::{Result, XoError};
use crate::rpc::RpcClient;

/// An object kind that can be looked up by example.
pub trait XoObject: DeserializeOwned + Send {
    /// Value of the `type` member for objects of this kind.
    const KIND: &'static str;

    fn id(&self) -> &str;

    /// Whether `candidate` satisfies every field set on `self`.
    ///
    /// Implementations compare the ID first: a set ID decides on its own.
    fn matches(&self, candidate: &Self) -> bool;
}

/// `true` when `example` is unset or equal to `candidate`.
pub(crate) fn field_matches<T: PartialEq + Default>(example: &T, candidate: &T) -> bool {
    *example == T::default() || example == candidate
}

/// `true` when every tag of `example` is present on `candidate`.
pub(crate) fn tags_contained(example: &[String], candidate: &[String]) -> bool {
    example.iter().all(|t| candidate.contains(t))
}

/// Outcome of comparing IDs: `Some` when the example's ID decides the match.
pub(crate) fn id_decides(example: &str, candidate: &str) -> Option<bool> {
    if example.is_empty() {
        None
    } else {
        Some(example == candidate)
    }
}

/// Lookup operations bound to a JSON-RPC session.
#[derive(Debug, Clone, Copy)]
pub struct LookupService<'a> {
    rpc: &'a RpcClient,
}

impl<'a> LookupService<'a> {
    pub(crate) fn new(rpc: &'a RpcClient) -> Self {
        Self { rpc }
    }

    /// All objects of the example's kind that match it.
    pub async fn find<T: XoObject>(&self, example: &T) -> Result<Vec<T>> {
        find_from_get_all_objects(self.rpc, &CallOptions::default(), example).await
    }

    pub async fn find_with<T: XoObject>(&self, opts: &CallOptions, example: &T) -> Result<Vec<T>> {
        find_from_get_all_objects(self.rpc, opts, example).await
    }

    /// The single object matching `example`.
    ///
    /// # Errors
    ///
    /// Not-found when nothing matches, validation error when the example is
    /// ambiguous.
    pub async fn find_one<T: XoObject>(&self, example: &T) -> Result<T> {
        let mut found = self.find(example).await?;
        match found.len() {
            0 => Err(XoError::NotFound(format!("no {} matches the example", T::KIND))),
            1 => Ok(found.remove(0)),
            n => Err(XoError::validation(format!(
                "{n} {} objects match the example",
                T::KIND
            ))),
        }
    }
}

/// Fetch every object of `T::KIND` and keep those matching `example`.
///
/// The server-side `type` filter is not trusted; objects are filtered by kind
/// again before decoding.
pub async fn find_from_get_all_objects<T: XoObject>(
    rpc: &RpcClient,
    opts: &CallOptions,
    example: &T,
) -> Result<Vec<T>> {
    let raw: Value = rpc
        .call_with(opts, "xo.getAllObjects", json!({ "filter": { "type": T::KIND } }))
        .await?;

    let objects: Vec<Value> = match raw {
        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => {
            return Err(XoError::decode(format!(
                "xo.getAllObjects returned {other}"
            )))
        }
    };

    let total = objects.len();
    let mut matches = Vec::new();
    for object in objects {
        if object.get("type").and_then(Value::as_str) != Some(T::KIND) {
            continue;
        }
        let candidate: T = serde_json::from_value(object)
            .map_err(|e| XoError::decode(format!("invalid {} object: {e}", T::KIND)))?;
        if example.matches(&candidate) {
            matches.push(candidate);
        }
    }
    debug!(target: "xo_api::rpc", kind = T::KIND, total, matched = matches.len(), "lookup");
    Ok(matches)
}
