//! DSON: the canonical, type-tagged encoding used for hashing, signing and
//! the node wire format.
//!
//! ## Layers
//! - [`value`] - the [`DsonValue`] tree and map helpers
//! - [`cbor`] - canonical binary form (hashed and signed)
//! - [`json`] - prefixed JSON form (node RPC)

pub mod cbor;
pub mod json;
pub mod value;

pub use value::{DsonValue, MapBuilder, MapReader, Output, VERSION};

use crate::error::DsonError;
use crate::primitives::Hash256;

/// Types that lower to and lift from a [`DsonValue`].
pub trait DsonSerializable: Sized {
    fn to_dson(&self, output: Output) -> DsonValue;

    fn from_dson(value: &DsonValue) -> Result<Self, DsonError>;
}

pub fn to_bytes<T: DsonSerializable>(value: &T, output: Output) -> Vec<u8> {
    cbor::encode_value(&value.to_dson(output))
}

pub fn from_bytes<T: DsonSerializable>(bytes: &[u8]) -> Result<T, DsonError> {
    T::from_dson(&cbor::decode_value(bytes)?)
}

pub fn to_json<T: DsonSerializable>(value: &T, output: Output) -> serde_json::Value {
    json::to_json(&value.to_dson(output))
}

pub fn from_json<T: DsonSerializable>(value: &serde_json::Value) -> Result<T, DsonError> {
    T::from_dson(&json::from_json(value)?)
}

/// Double SHA-256 of the hash-mode encoding.
pub fn hash_of<T: DsonSerializable>(value: &T) -> Hash256 {
    Hash256::of(&to_bytes(value, Output::Hash))
}
