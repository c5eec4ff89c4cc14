// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;
use uuid::Uuid;

use crate::error::{Result, XoError};

/// An object identifier: a UUID when it parses as one, otherwise opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceId {
    Uuid(Uuid),
    Other(String),
}

impl ResourceId {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match Uuid::parse_str(s) {
            Ok(u) => ResourceId::Uuid(u),
            Err(_) => ResourceId::Other(s.to_string()),
        }
    }

    #[must_use]
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            ResourceId::Uuid(u) => Some(*u),
            ResourceId::Other(_) => None,
        }
    }

    #[must_use]
    pub fn is_uuid(&self) -> bool {
        matches!(self, ResourceId::Uuid(_))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Uuid(u) => write!(f, "{}", u.hyphenated()),
            ResourceId::Other(s) => f.write_str(s),
        }
    }
}

impl FromStr for ResourceId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<Uuid> for ResourceId {
    fn from(u: Uuid) -> Self {
        ResourceId::Uuid(u)
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// Location of an object inside a REST collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceUrl {
    pub collection: String,
    pub id: String,
}

/// REST collections accepted in the short `/<collection>/<id>` href form.
pub const REST_COLLECTIONS: &[&str] = &[
    "pools",
    "vms",
    "vm-snapshots",
    "vm-templates",
    "hosts",
    "networks",
    "srs",
    "vdis",
    "tasks",
];

/// Split a resource href such as `/rest/v0/srs/<id>` into collection and id.
///
/// Accepts `/rest/v0/<collection>/<id>`, `/<collection>/<id>` for one of the
/// [`REST_COLLECTIONS`], and absolute URLs whose path has one of those forms.
/// Anything else is rejected.
///
/// # Errors
///
/// Returns a decode error when the href does not have exactly that shape.
#[allow(clippy::result_large_err)]
pub fn parse_resource_url(href: &str) -> Result<ResourceUrl> {
    let path = if href.starts_with('/') {
        href.to_string()
    } else {
        Url::parse(href)
            .map_err(|_| XoError::decode(format!("not a resource URL: '{href}'")))?
            .path()
            .to_string()
    };
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let (rest, short) = match path.strip_prefix("/rest/v0/") {
        Some(r) => (Some(r), false),
        None => (path.strip_prefix('/'), true),
    };
    let segments: Vec<&str> = match rest {
        Some(r) => r.split('/').collect(),
        None => Vec::new(),
    };
    match segments.as_slice() {
        [collection, id]
            if !collection.is_empty()
                && !id.is_empty()
                && (!short || REST_COLLECTIONS.contains(collection)) =>
        {
            let id = urlencoding::decode(id)
                .map_err(|e| XoError::decode(format!("bad id in '{href}': {e}")))?;
            Ok(ResourceUrl {
                collection: (*collection).to_string(),
                id: id.into_owned(),
            })
        }
        _ => Err(XoError::decode(format!("not a resource URL: '{href}'"))),
    }
}
