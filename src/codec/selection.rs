// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// A set of object IDs in the server's selection-map convention.
///
/// Decodes from a single ID string, a list of IDs, a `{id: X}` map, a
/// `{id: {__or: [..]}}` map, or `null`. Encodes as `null` when empty,
/// `{id: X}` for one ID and `{id: {__or: [..]}}` for several.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection(Vec<String>);

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn push(&mut self, id: impl Into<String>) {
        self.0.push(id.into());
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|i| i == id)
    }
}

impl<S: Into<String>> FromIterator<S> for Selection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<String>> for Selection {
    fn from(ids: Vec<String>) -> Self {
        Self(ids)
    }
}

impl From<&str> for Selection {
    fn from(id: &str) -> Self {
        Self(vec![id.to_string()])
    }
}

struct OrList<'a>(&'a [String]);

impl Serialize for OrList<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("__or", self.0)?;
        map.end()
    }
}

impl Serialize for Selection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0.as_slice() {
            [] => serializer.serialize_none(),
            [one] => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("id", one)?;
                map.end()
            }
            many => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("id", &OrList(many))?;
                map.end()
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdPattern {
    One(String),
    Or {
        #[serde(rename = "__or")]
        or: Vec<String>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSelection {
    One(String),
    Many(Vec<String>),
    Map(BTreeMap<String, IdPattern>),
}

impl<'de> Deserialize<'de> for Selection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<RawSelection>::deserialize(deserializer)?;
        let ids = match raw {
            None => Vec::new(),
            Some(RawSelection::One(id)) => vec![id],
            Some(RawSelection::Many(ids)) => ids,
            Some(RawSelection::Map(mut map)) => {
                if map.len() != 1 {
                    return Err(de::Error::custom(
                        "selection map must have exactly one key 'id'",
                    ));
                }
                match map.remove("id") {
                    Some(IdPattern::One(id)) => vec![id],
                    Some(IdPattern::Or { or }) => or,
                    None => return Err(de::Error::custom("selection map without 'id' key")),
                }
            }
        };
        Ok(Self(ids))
    }
}
