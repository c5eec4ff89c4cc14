// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An integer that may arrive as a JSON number, a decimal string, or `""`.
///
/// The empty string decodes as `0`. Encodes as a JSON number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlexInt(pub i64);

impl FlexInt {
    #[must_use]
    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for FlexInt {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

impl From<FlexInt> for i64 {
    fn from(v: FlexInt) -> Self {
        v.0
    }
}

impl fmt::Display for FlexInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for FlexInt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

struct FlexIntVisitor;

impl<'de> Visitor<'de> for FlexIntVisitor {
    type Value = FlexInt;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer, a decimal string, or an empty string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<FlexInt, E> {
        Ok(FlexInt(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<FlexInt, E> {
        i64::try_from(v)
            .map(FlexInt)
            .map_err(|_| E::custom(format!("integer out of range: {v}")))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<FlexInt, E> {
        if v.fract() != 0.0 || !v.is_finite() {
            return Err(E::custom(format!("expected an integer, got {v}")));
        }
        Ok(FlexInt(v as i64))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<FlexInt, E> {
        let v = v.trim();
        if v.is_empty() {
            return Ok(FlexInt(0));
        }
        v.parse::<i64>()
            .map(FlexInt)
            .map_err(|_| E::custom(format!("invalid integer string '{v}'")))
    }
}

impl<'de> Deserialize<'de> for FlexInt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FlexIntVisitor)
    }
}
