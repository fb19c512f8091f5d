use crate::dson::{DsonValue, MapBuilder, MapReader, Output};
use crate::error::DsonError;
use crate::primitives::RadixAddress;
use std::collections::BTreeMap;

pub const MESSAGE: &str = "radix.particles.message";

/// Arbitrary bytes sent from one address to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageParticle {
    from: RadixAddress,
    to: RadixAddress,
    data: Vec<u8>,
    metadata: BTreeMap<String, String>,
    nonce: i64,
}

impl MessageParticle {
    pub fn new(from: RadixAddress, to: RadixAddress, data: Vec<u8>, nonce: i64) -> Self {
        MessageParticle {
            from,
            to,
            data,
            metadata: BTreeMap::new(),
            nonce,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn from(&self) -> &RadixAddress {
        &self.from
    }

    pub fn to(&self) -> &RadixAddress {
        &self.to
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn nonce(&self) -> i64 {
        self.nonce
    }

    pub(crate) fn to_dson(&self, output: Output) -> MapBuilder {
        let metadata: BTreeMap<String, DsonValue> = self
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), DsonValue::from(v.as_str())))
            .collect();
        MapBuilder::new(MESSAGE, output)
            .field("from", self.from)
            .field("to", self.to)
            .field("bytes", self.data.clone())
            .field("metaData", metadata)
            .field("nonce", self.nonce)
    }

    pub(crate) fn from_reader(reader: &MapReader<'_>) -> Result<Self, DsonError> {
        let mut metadata = BTreeMap::new();
        if let Some(value) = reader.optional("metaData") {
            for (key, item) in value.as_map("metaData")? {
                metadata.insert(key.clone(), item.as_text(key)?.to_string());
            }
        }
        Ok(MessageParticle {
            from: reader.address("from")?,
            to: reader.address("to")?,
            data: reader.bytes("bytes")?.to_vec(),
            metadata,
            nonce: reader.int("nonce")?,
        })
    }
}
