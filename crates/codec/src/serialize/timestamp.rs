//! MessagePack timestamp extension (type -1).
//!
//! Timestamps are written in the smallest of the three standard layouts:
//!
//! | Layout | Size | Used when |
//! |---|---|---|
//! | timestamp 32 | 4 bytes | nanoseconds are zero and seconds fit in `u32` |
//! | timestamp 64 | 8 bytes | seconds fit in 34 unsigned bits |
//! | timestamp 96 | 12 bytes | anything else, including pre-1970 instants |

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_bytes::ByteBuf;

/// MessagePack extension type reserved for timestamps.
pub const TIMESTAMP_EXT_TYPE: i8 = -1;

/// `rmp-serde` maps a newtype struct with this exact name onto a MessagePack
/// ext value whose payload is the `(type, bytes)` tuple inside.
#[derive(Serialize, Deserialize)]
#[serde(rename = "_ExtStruct")]
struct ExtStruct((i8, ByteBuf));

/// A UTC instant encoded as a MessagePack timestamp extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireTimestamp(pub DateTime<Utc>);

impl WireTimestamp {
    fn to_ext_bytes(self) -> Vec<u8> {
        let secs = self.0.timestamp();
        let nanos = self.0.timestamp_subsec_nanos();

        if secs >= 0 && (secs as u64) >> 34 == 0 {
            let data = (u64::from(nanos) << 34) | secs as u64;
            if data & 0xFFFF_FFFF_0000_0000 == 0 {
                return (data as u32).to_be_bytes().to_vec();
            }
            return data.to_be_bytes().to_vec();
        }

        let mut out = Vec::with_capacity(12);
        out.extend_from_slice(&nanos.to_be_bytes());
        out.extend_from_slice(&secs.to_be_bytes());
        out
    }

    fn from_ext_bytes(bytes: &[u8]) -> Result<Self, String> {
        let (secs, nanos) = match bytes.len() {
            4 => {
                let secs = u32::from_be_bytes(bytes.try_into().map_err(|_| "timestamp 32")?);
                (i64::from(secs), 0)
            }
            8 => {
                let data = u64::from_be_bytes(bytes.try_into().map_err(|_| "timestamp 64")?);
                ((data & 0x0000_0003_FFFF_FFFF) as i64, (data >> 34) as u32)
            }
            12 => {
                let nanos = u32::from_be_bytes(bytes[..4].try_into().map_err(|_| "timestamp 96")?);
                let secs = i64::from_be_bytes(bytes[4..].try_into().map_err(|_| "timestamp 96")?);
                (secs, nanos)
            }
            n => return Err(format!("invalid timestamp length {n}")),
        };

        if nanos >= 1_000_000_000 {
            return Err(format!("timestamp nanoseconds out of range: {nanos}"));
        }
        DateTime::from_timestamp(secs, nanos)
            .map(WireTimestamp)
            .ok_or_else(|| format!("timestamp out of range: {secs}s"))
    }
}

impl Serialize for WireTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ExtStruct((TIMESTAMP_EXT_TYPE, ByteBuf::from(self.to_ext_bytes()))).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WireTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let ExtStruct((ext_type, data)) = ExtStruct::deserialize(deserializer)?;
        if ext_type != TIMESTAMP_EXT_TYPE {
            return Err(D::Error::custom(format!(
                "expected timestamp extension type {TIMESTAMP_EXT_TYPE}, got {ext_type}"
            )));
        }
        Self::from_ext_bytes(&data).map_err(D::Error::custom)
    }
}
