//! # Value Codec Module
//!
//! This module provides the pluggable serialization boundary between typed
//! caller values and the opaque byte strings cache layers store.
//!
//! ## Overview
//!
//! Layers never see caller types: the cache stack converts values through
//! `serde` into a [`serde_json::Value`] pivot and hands that to a
//! [`CacheCodec`] which produces the stored byte representation. The pivot
//! keeps the codec trait object-safe while still letting implementations
//! choose any byte-level format.
//!
//! A null value always round-trips through a sentinel byte marker (the JSON
//! codec writes the four bytes `null`), never through an empty byte string,
//! so a stored "known absent" value is distinguishable from a missing one.
//!
//! ## Usage
//!
//! ```rust
//! use stratacache_core::codec::{decode_value, encode_value, CacheCodec, JsonCodec};
//!
//! let codec = JsonCodec;
//! let bytes = encode_value(&codec, &42u32).unwrap();
//! let value: u32 = decode_value(&codec, &bytes).unwrap();
//! assert_eq!(value, 42);
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;

use crate::entry::RawValue;
use crate::error::CacheResult;

/// Byte-level codec for cached values.
///
/// Implementations must be `Send + Sync + Debug` so a single codec instance
/// can be shared by the stack and every layer. The required property is
/// `decode(encode(v)) == v` for every supported value.
pub trait CacheCodec: Send + Sync + Debug {
    /// Encode a value into its stored byte representation.
    fn encode(&self, value: &Value) -> CacheResult<RawValue>;

    /// Decode a stored byte representation back into a value.
    fn decode(&self, bytes: &[u8]) -> CacheResult<Value>;

    /// Name of the codec, used for logging and debugging.
    fn name(&self) -> &'static str;
}

/// Default JSON codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl CacheCodec for JsonCodec {
    fn encode(&self, value: &Value) -> CacheResult<RawValue> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> CacheResult<Value> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

/// Serialize a typed value through the codec.
pub fn encode_value<T: Serialize + ?Sized>(
    codec: &dyn CacheCodec,
    value: &T,
) -> CacheResult<RawValue> {
    let pivot = serde_json::to_value(value)?;
    codec.encode(&pivot)
}

/// Deserialize a typed value through the codec.
pub fn decode_value<T: DeserializeOwned>(codec: &dyn CacheCodec, bytes: &[u8]) -> CacheResult<T> {
    let pivot = codec.decode(bytes)?;
    Ok(serde_json::from_value(pivot)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        id: u64,
        label: String,
    }

    #[test]
    fn round_trips_typed_values() {
        let codec = JsonCodec;
        let payload = Payload {
            id: 7,
            label: "seven".to_string(),
        };

        let bytes = encode_value(&codec, &payload).unwrap();
        let decoded: Payload = decode_value(&codec, &bytes).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn null_encodes_to_sentinel_marker() {
        let codec = JsonCodec;

        let bytes = encode_value(&codec, &None::<String>).unwrap();
        assert!(!bytes.is_empty());
        assert_eq!(bytes, b"null");

        let decoded: Option<String> = decode_value(&codec, &bytes).unwrap();
        assert_eq!(decoded, None);
    }

    #[test]
    fn decode_rejects_garbage() {
        let codec = JsonCodec;
        assert!(decode_value::<u32>(&codec, b"{not json").is_err());
    }
}
