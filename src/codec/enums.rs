// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use serde::de::value::{Error as ValueError, StrDeserializer};
use serde::de::IntoDeserializer;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// VM power state as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerState {
    Running,
    Halted,
    Paused,
    Suspended,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PowerState::Running => "Running",
            PowerState::Halted => "Halted",
            PowerState::Paused => "Paused",
            PowerState::Suspended => "Suspended",
        };
        f.write_str(s)
    }
}

/// Backup job mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupMode {
    #[default]
    Full,
    Delta,
}

/// A string enum field that tolerates members this library does not know.
///
/// Known members decode into `T`; anything else is kept verbatim and encoded
/// back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extensible<T> {
    Known(T),
    Unknown(String),
}

impl<T> Extensible<T> {
    #[must_use]
    pub fn known(&self) -> Option<&T> {
        match self {
            Extensible::Known(t) => Some(t),
            Extensible::Unknown(_) => None,
        }
    }
}

impl<T> From<T> for Extensible<T> {
    fn from(t: T) -> Self {
        Extensible::Known(t)
    }
}

impl<T: Serialize> Serialize for Extensible<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Extensible::Known(t) => t.serialize(serializer),
            Extensible::Unknown(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de, T> Deserialize<'de> for Extensible<T>
where
    T: for<'a> Deserialize<'a>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let de: StrDeserializer<'_, ValueError> = raw.as_str().into_deserializer();
        Ok(match T::deserialize(de) {
            Ok(t) => Extensible::Known(t),
            Err(_) => Extensible::Unknown(raw),
        })
    }
}
