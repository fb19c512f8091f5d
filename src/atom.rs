//! Atoms: the ledger's unit of commitment
//!
//! An [`UnsignedAtom`] holds particle groups and metadata. Its hash is the
//! double SHA-256 of its hash-mode DSON, which never includes signatures, so
//! an [`Atom`] and the unsigned atom it was signed from share one hash.

use crate::crypto::EcdsaSignature;
use crate::dson::{self, DsonSerializable, DsonValue, MapBuilder, MapReader, Output};
use crate::error::{CryptoError, DsonError};
use crate::particles::{Particle, ParticleGroup, Spin, SpunParticle};
use crate::primitives::{Euid, Hash256, RadixAddress};
use std::collections::BTreeMap;

pub const ATOM: &str = "radix.atom";
pub const METADATA_TIMESTAMP: &str = "timestamp";
pub const METADATA_POW_NONCE: &str = "powNonce";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedAtom {
    particle_groups: Vec<ParticleGroup>,
    metadata: BTreeMap<String, String>,
}

impl UnsignedAtom {
    pub fn new(particle_groups: Vec<ParticleGroup>, timestamp_ms: i64) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(METADATA_TIMESTAMP.to_string(), timestamp_ms.to_string());
        UnsignedAtom {
            particle_groups,
            metadata,
        }
    }

    /// Stamped with the current wall-clock time.
    pub fn now(particle_groups: Vec<ParticleGroup>) -> Self {
        Self::new(particle_groups, chrono::Utc::now().timestamp_millis())
    }

    pub fn particle_groups(&self) -> &[ParticleGroup] {
        &self.particle_groups
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.metadata.get(METADATA_TIMESTAMP)?.parse().ok()
    }

    pub fn pow_nonce(&self) -> Option<u64> {
        self.metadata.get(METADATA_POW_NONCE)?.parse().ok()
    }

    pub fn with_pow_nonce(self, nonce: u64) -> Self {
        self.with_metadata(METADATA_POW_NONCE, nonce.to_string())
    }

    /// Copy without `powNonce`; its hash is the proof-of-work seed.
    pub fn without_pow_nonce(&self) -> Self {
        let mut copy = self.clone();
        copy.metadata.remove(METADATA_POW_NONCE);
        copy
    }

    pub fn hash(&self) -> Hash256 {
        dson::hash_of(self)
    }

    pub fn hid(&self) -> Euid {
        self.hash().euid()
    }

    pub fn spun_particles(&self) -> impl Iterator<Item = &SpunParticle> {
        self.particle_groups.iter().flat_map(|g| g.particles().iter())
    }

    pub fn particles(&self, spin: Spin) -> impl Iterator<Item = &Particle> {
        self.spun_particles()
            .filter(move |sp| sp.spin == spin)
            .map(|sp| &sp.particle)
    }

    /// Every address any particle concerns, in first-seen order.
    pub fn addresses(&self) -> Vec<RadixAddress> {
        let mut out: Vec<RadixAddress> = Vec::new();
        for spun in self.spun_particles() {
            for address in spun.particle.addresses() {
                if !out.contains(&address) {
                    out.push(address);
                }
            }
        }
        out
    }

    /// Attaches a signature over [`UnsignedAtom::hash`] from `signer`.
    pub fn sign(self, signer: &RadixAddress, signature: EcdsaSignature) -> Atom {
        let mut signatures = BTreeMap::new();
        signatures.insert(signer.uid(), signature);
        Atom {
            unsigned: self,
            signatures,
        }
    }

    fn builder(&self, output: Output) -> MapBuilder {
        let groups: Vec<DsonValue> = self
            .particle_groups
            .iter()
            .map(|g| g.to_dson(output))
            .collect();
        let metadata: BTreeMap<String, DsonValue> = self
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), DsonValue::from(v.as_str())))
            .collect();
        MapBuilder::new(ATOM, output)
            .field("particleGroups", groups)
            .field("metaData", metadata)
    }

    fn from_reader(reader: &MapReader<'_>) -> Result<Self, DsonError> {
        let particle_groups = reader
            .array("particleGroups")?
            .iter()
            .map(ParticleGroup::from_dson)
            .collect::<Result<Vec<_>, _>>()?;
        let mut metadata = BTreeMap::new();
        for (key, item) in reader.map("metaData")? {
            metadata.insert(key.clone(), item.as_text(key)?.to_string());
        }
        Ok(UnsignedAtom {
            particle_groups,
            metadata,
        })
    }
}

impl DsonSerializable for UnsignedAtom {
    fn to_dson(&self, output: Output) -> DsonValue {
        let builder = self.builder(output);
        if output == Output::Api || output == Output::All {
            return builder.field("hid", self.hid()).build();
        }
        builder.build()
    }

    fn from_dson(value: &DsonValue) -> Result<Self, DsonError> {
        UnsignedAtom::from_reader(&MapReader::expect(value, ATOM)?)
    }
}

const SIGNATURE_SERIALIZER: &str = EcdsaSignature::SERIALIZER;

fn signature_to_dson(signature: &EcdsaSignature, output: Output) -> DsonValue {
    MapBuilder::new(SIGNATURE_SERIALIZER, output)
        .field("r", signature.r.to_vec())
        .field("s", signature.s.to_vec())
        .build()
}

fn signature_from_dson(value: &DsonValue) -> Result<EcdsaSignature, DsonError> {
    let reader = MapReader::expect(value, SIGNATURE_SERIALIZER)?;
    let scalar = |key: &str| -> Result<[u8; 32], DsonError> {
        reader
            .bytes(key)?
            .try_into()
            .map_err(|_| DsonError::InvalidValue {
                field: key.to_string(),
                reason: "signature scalars are 32 bytes".to_string(),
            })
    };
    Ok(EcdsaSignature {
        r: scalar("r")?,
        s: scalar("s")?,
    })
}

/// A signed atom, ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    unsigned: UnsignedAtom,
    signatures: BTreeMap<Euid, EcdsaSignature>,
}

impl Atom {
    pub fn unsigned(&self) -> &UnsignedAtom {
        &self.unsigned
    }

    pub fn signatures(&self) -> &BTreeMap<Euid, EcdsaSignature> {
        &self.signatures
    }

    pub fn add_signature(&mut self, signer: &RadixAddress, signature: EcdsaSignature) {
        self.signatures.insert(signer.uid(), signature);
    }

    pub fn hash(&self) -> Hash256 {
        self.unsigned.hash()
    }

    pub fn hid(&self) -> Euid {
        self.unsigned.hid()
    }

    /// First eight hex characters of the hash, for display.
    pub fn short_id(&self) -> String {
        self.hash().to_hex()[..8].to_string()
    }

    pub fn particle_groups(&self) -> &[ParticleGroup] {
        self.unsigned.particle_groups()
    }

    pub fn spun_particles(&self) -> impl Iterator<Item = &SpunParticle> {
        self.unsigned.spun_particles()
    }

    pub fn particles(&self, spin: Spin) -> impl Iterator<Item = &Particle> {
        self.unsigned.particles(spin)
    }

    pub fn addresses(&self) -> Vec<RadixAddress> {
        self.unsigned.addresses()
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.unsigned.timestamp()
    }

    pub fn pow_nonce(&self) -> Option<u64> {
        self.unsigned.pow_nonce()
    }

    /// Checks the signature `signer` placed on this atom.
    pub fn verify_signature(&self, signer: &RadixAddress) -> Result<(), CryptoError> {
        let signature = self
            .signatures
            .get(&signer.uid())
            .ok_or(CryptoError::VerificationFailed)?;
        let public_key = signer
            .public_key()
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        signature.verify(&self.hash(), &public_key)
    }
}

impl DsonSerializable for Atom {
    fn to_dson(&self, output: Output) -> DsonValue {
        let mut builder = self.unsigned.builder(output);
        if output.includes_signatures() {
            let signatures: BTreeMap<String, DsonValue> = self
                .signatures
                .iter()
                .map(|(uid, sig)| (uid.to_hex(), signature_to_dson(sig, output)))
                .collect();
            builder = builder.field("signatures", signatures);
        }
        if output == Output::Api || output == Output::All {
            builder = builder.field("hid", self.hid());
        }
        builder.build()
    }

    fn from_dson(value: &DsonValue) -> Result<Self, DsonError> {
        let reader = MapReader::expect(value, ATOM)?;
        let unsigned = UnsignedAtom::from_reader(&reader)?;
        let mut signatures = BTreeMap::new();
        if let Some(value) = reader.optional("signatures") {
            for (key, item) in value.as_map("signatures")? {
                signatures.insert(Euid::from_hex(key)?, signature_from_dson(item)?);
            }
        }
        Ok(Atom {
            unsigned,
            signatures,
        })
    }
}
