//! Name claims: unique ids and the resource identifier particle that
//! reserves an RRI before a token or unique id takes it.

use crate::dson::{MapBuilder, MapReader, Output};
use crate::error::{DsonError, PrimitiveError};
use crate::primitives::{RadixAddress, Rri};

pub const UNIQUE: &str = "radix.particles.unique";
pub const RRI: &str = "radix.particles.rri";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniqueParticle {
    rri: Rri,
    nonce: i64,
}

impl UniqueParticle {
    pub fn new(address: RadixAddress, name: impl Into<String>, nonce: i64) -> Result<Self, PrimitiveError> {
        Ok(UniqueParticle {
            rri: Rri::new(address, name)?,
            nonce,
        })
    }

    pub fn address(&self) -> &RadixAddress {
        self.rri.address()
    }

    pub fn name(&self) -> &str {
        self.rri.name()
    }

    pub fn nonce(&self) -> i64 {
        self.nonce
    }

    pub fn rri(&self) -> &Rri {
        &self.rri
    }

    pub(crate) fn to_dson(&self, output: Output) -> MapBuilder {
        MapBuilder::new(UNIQUE, output)
            .field("address", *self.rri.address())
            .field("name", self.rri.name())
            .field("nonce", self.nonce)
    }

    pub(crate) fn from_reader(reader: &MapReader<'_>) -> Result<Self, DsonError> {
        Ok(UniqueParticle::new(
            reader.address("address")?,
            reader.text("name")?,
            reader.int("nonce")?,
        )?)
    }
}

/// Reservation of an RRI. Spun down when a token or unique id claims it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RriParticle {
    rri: Rri,
    nonce: i64,
}

impl RriParticle {
    pub fn new(rri: Rri) -> Self {
        RriParticle { rri, nonce: 0 }
    }

    pub fn rri(&self) -> &Rri {
        &self.rri
    }

    pub fn nonce(&self) -> i64 {
        self.nonce
    }

    pub(crate) fn to_dson(&self, output: Output) -> MapBuilder {
        MapBuilder::new(RRI, output)
            .field("rri", self.rri.clone())
            .field("nonce", self.nonce)
    }

    pub(crate) fn from_reader(reader: &MapReader<'_>) -> Result<Self, DsonError> {
        Ok(RriParticle {
            rri: reader.rri("rri")?,
            nonce: reader.int("nonce")?,
        })
    }
}
