//! The DSON value model
//!
//! Every serializable ledger type lowers to a [`DsonValue`] tree. Maps are
//! `BTreeMap`s, so key order is canonical no matter how a map was built.

use crate::error::DsonError;
use crate::primitives::{Euid, Hash256, RadixAddress, Rri, UInt256};
use std::collections::BTreeMap;

/// Encoding target. Fields are included or omitted per output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Output {
    /// The form that is hashed and signed. Never carries signatures.
    Hash,
    /// Client-facing form; adds derived fields such as `hid`.
    Api,
    /// Node wire form.
    Wire,
    /// Local storage form.
    Persist,
    /// Every field.
    All,
}

impl Output {
    pub fn includes_signatures(&self) -> bool {
        !matches!(self, Output::Hash)
    }
}

pub const VERSION: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DsonValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
    Euid(Euid),
    Hash(Hash256),
    Address(RadixAddress),
    U256(UInt256),
    Rri(Rri),
    Array(Vec<DsonValue>),
    Map(BTreeMap<String, DsonValue>),
}

impl DsonValue {
    pub fn kind(&self) -> &'static str {
        match self {
            DsonValue::Null => "null",
            DsonValue::Bool(_) => "bool",
            DsonValue::Int(_) => "int",
            DsonValue::Text(_) => "text",
            DsonValue::Bytes(_) => "bytes",
            DsonValue::Euid(_) => "euid",
            DsonValue::Hash(_) => "hash",
            DsonValue::Address(_) => "address",
            DsonValue::U256(_) => "u256",
            DsonValue::Rri(_) => "rri",
            DsonValue::Array(_) => "array",
            DsonValue::Map(_) => "map",
        }
    }

    fn mismatch(&self, field: &str, expected: &'static str) -> DsonError {
        DsonError::TypeMismatch {
            field: field.to_string(),
            expected,
            found: self.kind(),
        }
    }

    pub fn as_bool(&self, field: &str) -> Result<bool, DsonError> {
        match self {
            DsonValue::Bool(b) => Ok(*b),
            other => Err(other.mismatch(field, "bool")),
        }
    }

    pub fn as_int(&self, field: &str) -> Result<i64, DsonError> {
        match self {
            DsonValue::Int(i) => Ok(*i),
            other => Err(other.mismatch(field, "int")),
        }
    }

    pub fn as_text(&self, field: &str) -> Result<&str, DsonError> {
        match self {
            DsonValue::Text(s) => Ok(s),
            other => Err(other.mismatch(field, "text")),
        }
    }

    pub fn as_bytes(&self, field: &str) -> Result<&[u8], DsonError> {
        match self {
            DsonValue::Bytes(b) => Ok(b),
            other => Err(other.mismatch(field, "bytes")),
        }
    }

    pub fn as_euid(&self, field: &str) -> Result<Euid, DsonError> {
        match self {
            DsonValue::Euid(e) => Ok(*e),
            other => Err(other.mismatch(field, "euid")),
        }
    }

    pub fn as_hash(&self, field: &str) -> Result<Hash256, DsonError> {
        match self {
            DsonValue::Hash(h) => Ok(*h),
            other => Err(other.mismatch(field, "hash")),
        }
    }

    pub fn as_address(&self, field: &str) -> Result<RadixAddress, DsonError> {
        match self {
            DsonValue::Address(a) => Ok(*a),
            other => Err(other.mismatch(field, "address")),
        }
    }

    pub fn as_u256(&self, field: &str) -> Result<UInt256, DsonError> {
        match self {
            DsonValue::U256(v) => Ok(*v),
            other => Err(other.mismatch(field, "u256")),
        }
    }

    pub fn as_rri(&self, field: &str) -> Result<&Rri, DsonError> {
        match self {
            DsonValue::Rri(r) => Ok(r),
            other => Err(other.mismatch(field, "rri")),
        }
    }

    pub fn as_array(&self, field: &str) -> Result<&[DsonValue], DsonError> {
        match self {
            DsonValue::Array(items) => Ok(items),
            other => Err(other.mismatch(field, "array")),
        }
    }

    pub fn as_map(&self, field: &str) -> Result<&BTreeMap<String, DsonValue>, DsonError> {
        match self {
            DsonValue::Map(map) => Ok(map),
            other => Err(other.mismatch(field, "map")),
        }
    }
}

impl From<bool> for DsonValue {
    fn from(v: bool) -> Self {
        DsonValue::Bool(v)
    }
}

impl From<i64> for DsonValue {
    fn from(v: i64) -> Self {
        DsonValue::Int(v)
    }
}

impl From<&str> for DsonValue {
    fn from(v: &str) -> Self {
        DsonValue::Text(v.to_string())
    }
}

impl From<String> for DsonValue {
    fn from(v: String) -> Self {
        DsonValue::Text(v)
    }
}

impl From<Vec<u8>> for DsonValue {
    fn from(v: Vec<u8>) -> Self {
        DsonValue::Bytes(v)
    }
}

impl From<Euid> for DsonValue {
    fn from(v: Euid) -> Self {
        DsonValue::Euid(v)
    }
}

impl From<Hash256> for DsonValue {
    fn from(v: Hash256) -> Self {
        DsonValue::Hash(v)
    }
}

impl From<RadixAddress> for DsonValue {
    fn from(v: RadixAddress) -> Self {
        DsonValue::Address(v)
    }
}

impl From<UInt256> for DsonValue {
    fn from(v: UInt256) -> Self {
        DsonValue::U256(v)
    }
}

impl From<Rri> for DsonValue {
    fn from(v: Rri) -> Self {
        DsonValue::Rri(v)
    }
}

impl From<Vec<DsonValue>> for DsonValue {
    fn from(v: Vec<DsonValue>) -> Self {
        DsonValue::Array(v)
    }
}

impl From<BTreeMap<String, DsonValue>> for DsonValue {
    fn from(v: BTreeMap<String, DsonValue>) -> Self {
        DsonValue::Map(v)
    }
}

/// Builds a serializer-tagged map, skipping fields not meant for `output`.
pub struct MapBuilder {
    output: Output,
    map: BTreeMap<String, DsonValue>,
}

impl MapBuilder {
    pub fn new(serializer: &str, output: Output) -> Self {
        let mut map = BTreeMap::new();
        map.insert("serializer".to_string(), DsonValue::from(serializer));
        map.insert("version".to_string(), DsonValue::Int(VERSION));
        MapBuilder { output, map }
    }

    /// Map without `serializer`/`version`, for nested plain maps.
    pub fn plain(output: Output) -> Self {
        MapBuilder {
            output,
            map: BTreeMap::new(),
        }
    }

    pub fn output(&self) -> Output {
        self.output
    }

    pub fn field(mut self, key: &str, value: impl Into<DsonValue>) -> Self {
        self.map.insert(key.to_string(), value.into());
        self
    }

    pub fn optional(self, key: &str, value: Option<impl Into<DsonValue>>) -> Self {
        match value {
            Some(v) => self.field(key, v),
            None => self,
        }
    }

    /// Adds the field only when the current output is one of `outputs`.
    pub fn field_in(self, outputs: &[Output], key: &str, value: impl Into<DsonValue>) -> Self {
        if outputs.contains(&self.output) || self.output == Output::All {
            self.field(key, value)
        } else {
            self
        }
    }

    pub fn build(self) -> DsonValue {
        DsonValue::Map(self.map)
    }
}

/// Strict reader over a decoded map.
pub struct MapReader<'a> {
    map: &'a BTreeMap<String, DsonValue>,
}

impl<'a> MapReader<'a> {
    /// Opens `value` as a map whose `serializer` must equal `expected`.
    pub fn expect(value: &'a DsonValue, expected: &str) -> Result<Self, DsonError> {
        let reader = Self::plain(value)?;
        let found = reader.serializer()?;
        if found != expected {
            return Err(DsonError::SerializerMismatch {
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
        Ok(reader)
    }

    pub fn plain(value: &'a DsonValue) -> Result<Self, DsonError> {
        Ok(MapReader {
            map: value.as_map("<root>")?,
        })
    }

    pub fn serializer(&self) -> Result<&'a str, DsonError> {
        self.get("serializer")?.as_text("serializer")
    }

    pub fn get(&self, key: &str) -> Result<&'a DsonValue, DsonError> {
        self.map
            .get(key)
            .ok_or_else(|| DsonError::MissingField(key.to_string()))
    }

    pub fn optional(&self, key: &str) -> Option<&'a DsonValue> {
        self.map.get(key)
    }

    pub fn text(&self, key: &str) -> Result<&'a str, DsonError> {
        self.get(key)?.as_text(key)
    }

    pub fn int(&self, key: &str) -> Result<i64, DsonError> {
        self.get(key)?.as_int(key)
    }

    pub fn bytes(&self, key: &str) -> Result<&'a [u8], DsonError> {
        self.get(key)?.as_bytes(key)
    }

    pub fn address(&self, key: &str) -> Result<RadixAddress, DsonError> {
        self.get(key)?.as_address(key)
    }

    pub fn u256(&self, key: &str) -> Result<UInt256, DsonError> {
        self.get(key)?.as_u256(key)
    }

    pub fn rri(&self, key: &str) -> Result<Rri, DsonError> {
        self.get(key)?.as_rri(key).cloned()
    }

    pub fn array(&self, key: &str) -> Result<&'a [DsonValue], DsonError> {
        self.get(key)?.as_array(key)
    }

    pub fn map(&self, key: &str) -> Result<&'a BTreeMap<String, DsonValue>, DsonError> {
        self.get(key)?.as_map(key)
    }
}
