// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decoders for values the XO server emits in more than one JSON shape.
//!
//! Every type here decodes all of the shapes the server is known to send and
//! encodes back to one canonical shape that decodes to an equal value.

mod enums;
mod ids;
mod numeric;
mod selection;
mod time;

pub use enums::{BackupMode, Extensible, PowerState};
pub use ids::{parse_resource_url, ResourceId, ResourceUrl, REST_COLLECTIONS};
pub use numeric::FlexInt;
pub use selection::Selection;
pub use time::Timestamp;
