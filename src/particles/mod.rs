//! Particles: the typed immutable records atoms are made of
//!
//! ## Kinds
//! - [`token`] - token definitions, unallocated supply, transferrable tokens
//! - [`message`] - address-to-address data
//! - [`unique`] - unique ids and RRI reservations

pub mod message;
pub mod token;
pub mod unique;

pub use message::MessageParticle;
pub use token::{
    current_planck, TokenDefinitionParticle, TokenPermission, TokenPermissions, TokenSupply,
    TokenSupplyType, TransferrableTokensParticle, UnallocatedTokensParticle,
};
pub use unique::{RriParticle, UniqueParticle};

use crate::dson::{self, DsonSerializable, DsonValue, MapBuilder, MapReader, Output};
use crate::error::DsonError;
use crate::primitives::{Euid, Hash256, RadixAddress, Rri, UInt256};
use std::collections::BTreeMap;

/// Whether a particle occurrence creates or consumes state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Spin {
    Up,
    Down,
    Neutral,
}

impl Spin {
    pub fn value(&self) -> i64 {
        match self {
            Spin::Up => 1,
            Spin::Down => -1,
            Spin::Neutral => 0,
        }
    }

    pub fn from_value(value: i64) -> Result<Self, DsonError> {
        match value {
            1 => Ok(Spin::Up),
            -1 => Ok(Spin::Down),
            0 => Ok(Spin::Neutral),
            other => Err(DsonError::InvalidValue {
                field: "spin".to_string(),
                reason: format!("{other} is not a spin"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Particle {
    TokenDefinition(TokenDefinitionParticle),
    UnallocatedTokens(UnallocatedTokensParticle),
    TransferrableTokens(TransferrableTokensParticle),
    Message(MessageParticle),
    Unique(UniqueParticle),
    ResourceIdentifier(RriParticle),
}

impl Particle {
    pub fn serializer(&self) -> &'static str {
        match self {
            Particle::TokenDefinition(p) => p.serializer(),
            Particle::UnallocatedTokens(_) => token::UNALLOCATED_TOKENS,
            Particle::TransferrableTokens(_) => token::TRANSFERRABLE_TOKENS,
            Particle::Message(_) => message::MESSAGE,
            Particle::Unique(_) => unique::UNIQUE,
            Particle::ResourceIdentifier(_) => unique::RRI,
        }
    }

    /// Addresses this particle concerns.
    pub fn addresses(&self) -> Vec<RadixAddress> {
        match self {
            Particle::TokenDefinition(p) => vec![*p.owner()],
            Particle::UnallocatedTokens(p) => vec![*p.token().address()],
            Particle::TransferrableTokens(p) => vec![*p.address()],
            Particle::Message(p) if p.from() == p.to() => vec![*p.from()],
            Particle::Message(p) => vec![*p.from(), *p.to()],
            Particle::Unique(p) => vec![*p.address()],
            Particle::ResourceIdentifier(p) => vec![*p.rri().address()],
        }
    }

    pub fn destinations(&self) -> Vec<Euid> {
        self.addresses().iter().map(RadixAddress::uid).collect()
    }

    pub fn hash(&self) -> Hash256 {
        dson::hash_of(self)
    }

    /// The token a value-bearing particle belongs to.
    pub fn token_reference(&self) -> Option<&Rri> {
        match self {
            Particle::UnallocatedTokens(p) => Some(p.token()),
            Particle::TransferrableTokens(p) => Some(p.token()),
            _ => None,
        }
    }

    /// Name this particle claims, if it claims one.
    pub fn claimed_rri(&self) -> Option<&Rri> {
        match self {
            Particle::TokenDefinition(p) => Some(p.rri()),
            Particle::Unique(p) => Some(p.rri()),
            _ => None,
        }
    }

    pub fn amount(&self) -> Option<UInt256> {
        match self {
            Particle::UnallocatedTokens(p) => Some(p.amount()),
            Particle::TransferrableTokens(p) => Some(p.amount()),
            _ => None,
        }
    }

    pub fn as_transferrable(&self) -> Option<&TransferrableTokensParticle> {
        match self {
            Particle::TransferrableTokens(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_unallocated(&self) -> Option<&UnallocatedTokensParticle> {
        match self {
            Particle::UnallocatedTokens(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_token_definition(&self) -> Option<&TokenDefinitionParticle> {
        match self {
            Particle::TokenDefinition(p) => Some(p),
            _ => None,
        }
    }
}

impl DsonSerializable for Particle {
    fn to_dson(&self, output: Output) -> DsonValue {
        let builder = match self {
            Particle::TokenDefinition(p) => p.to_dson(output),
            Particle::UnallocatedTokens(p) => p.to_dson(output),
            Particle::TransferrableTokens(p) => p.to_dson(output),
            Particle::Message(p) => p.to_dson(output),
            Particle::Unique(p) => p.to_dson(output),
            Particle::ResourceIdentifier(p) => p.to_dson(output),
        };
        let destinations: Vec<DsonValue> =
            self.destinations().into_iter().map(DsonValue::Euid).collect();
        builder.field("destinations", destinations).build()
    }

    fn from_dson(value: &DsonValue) -> Result<Self, DsonError> {
        let reader = MapReader::plain(value)?;
        let particle = match reader.serializer()? {
            token::FIXED_SUPPLY_TOKEN_DEFINITION | token::MUTABLE_SUPPLY_TOKEN_DEFINITION => {
                Particle::TokenDefinition(TokenDefinitionParticle::from_reader(&reader)?)
            }
            token::UNALLOCATED_TOKENS => {
                Particle::UnallocatedTokens(UnallocatedTokensParticle::from_reader(&reader)?)
            }
            token::TRANSFERRABLE_TOKENS => {
                Particle::TransferrableTokens(TransferrableTokensParticle::from_reader(&reader)?)
            }
            message::MESSAGE => Particle::Message(MessageParticle::from_reader(&reader)?),
            unique::UNIQUE => Particle::Unique(UniqueParticle::from_reader(&reader)?),
            unique::RRI => Particle::ResourceIdentifier(RriParticle::from_reader(&reader)?),
            other => return Err(DsonError::UnknownSerializer(other.to_string())),
        };
        Ok(particle)
    }
}

impl From<TokenDefinitionParticle> for Particle {
    fn from(p: TokenDefinitionParticle) -> Self {
        Particle::TokenDefinition(p)
    }
}

impl From<UnallocatedTokensParticle> for Particle {
    fn from(p: UnallocatedTokensParticle) -> Self {
        Particle::UnallocatedTokens(p)
    }
}

impl From<TransferrableTokensParticle> for Particle {
    fn from(p: TransferrableTokensParticle) -> Self {
        Particle::TransferrableTokens(p)
    }
}

impl From<MessageParticle> for Particle {
    fn from(p: MessageParticle) -> Self {
        Particle::Message(p)
    }
}

impl From<UniqueParticle> for Particle {
    fn from(p: UniqueParticle) -> Self {
        Particle::Unique(p)
    }
}

impl From<RriParticle> for Particle {
    fn from(p: RriParticle) -> Self {
        Particle::ResourceIdentifier(p)
    }
}

pub const SPUN_PARTICLE: &str = "radix.spun_particle";
pub const PARTICLE_GROUP: &str = "radix.particle_group";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpunParticle {
    pub particle: Particle,
    pub spin: Spin,
}

impl SpunParticle {
    pub fn new(particle: impl Into<Particle>, spin: Spin) -> Self {
        SpunParticle {
            particle: particle.into(),
            spin,
        }
    }

    pub fn up(particle: impl Into<Particle>) -> Self {
        Self::new(particle, Spin::Up)
    }

    pub fn down(particle: impl Into<Particle>) -> Self {
        Self::new(particle, Spin::Down)
    }
}

impl DsonSerializable for SpunParticle {
    fn to_dson(&self, output: Output) -> DsonValue {
        MapBuilder::new(SPUN_PARTICLE, output)
            .field("particle", self.particle.to_dson(output))
            .field("spin", self.spin.value())
            .build()
    }

    fn from_dson(value: &DsonValue) -> Result<Self, DsonError> {
        let reader = MapReader::expect(value, SPUN_PARTICLE)?;
        Ok(SpunParticle {
            particle: Particle::from_dson(reader.get("particle")?)?,
            spin: Spin::from_value(reader.int("spin")?)?,
        })
    }
}

/// One indivisible state transition inside an atom.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParticleGroup {
    particles: Vec<SpunParticle>,
    metadata: BTreeMap<String, String>,
}

impl ParticleGroup {
    pub fn new(particles: Vec<SpunParticle>) -> Self {
        ParticleGroup {
            particles,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn push(&mut self, spun: SpunParticle) {
        self.particles.push(spun);
    }

    pub fn particles(&self) -> &[SpunParticle] {
        &self.particles
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn with_spin(&self, spin: Spin) -> impl Iterator<Item = &Particle> {
        self.particles
            .iter()
            .filter(move |sp| sp.spin == spin)
            .map(|sp| &sp.particle)
    }
}

impl DsonSerializable for ParticleGroup {
    fn to_dson(&self, output: Output) -> DsonValue {
        let particles: Vec<DsonValue> = self.particles.iter().map(|p| p.to_dson(output)).collect();
        let builder = MapBuilder::new(PARTICLE_GROUP, output).field("particles", particles);
        if self.metadata.is_empty() {
            return builder.build();
        }
        let metadata: BTreeMap<String, DsonValue> = self
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), DsonValue::from(v.as_str())))
            .collect();
        builder.field("metaData", metadata).build()
    }

    fn from_dson(value: &DsonValue) -> Result<Self, DsonError> {
        let reader = MapReader::expect(value, PARTICLE_GROUP)?;
        let particles = reader
            .array("particles")?
            .iter()
            .map(SpunParticle::from_dson)
            .collect::<Result<Vec<_>, _>>()?;
        let mut metadata = BTreeMap::new();
        if let Some(value) = reader.optional("metaData") {
            for (key, item) in value.as_map("metaData")? {
                metadata.insert(key.clone(), item.as_text(key)?.to_string());
            }
        }
        Ok(ParticleGroup {
            particles,
            metadata,
        })
    }
}

/// Random particle nonce, so that otherwise identical particles hash apart.
pub fn random_nonce() -> i64 {
    rand::random()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn transferrable(owner: RadixAddress, amount: u64) -> TransferrableTokensParticle {
        let token = Rri::new(owner, "XRD").unwrap();
        TransferrableTokensParticle::new(
            owner,
            token,
            UInt256::from_u64(amount),
            UInt256::ONE,
            TokenPermissions::owner_only(),
            1,
            42,
        )
        .unwrap()
    }

    #[test]
    fn test_spin_values() {
        for spin in [Spin::Up, Spin::Down, Spin::Neutral] {
            assert_eq!(Spin::from_value(spin.value()).unwrap(), spin);
        }
        assert!(Spin::from_value(2).is_err());
    }

    #[test]
    fn test_message_destinations() {
        let a = KeyPair::generate().address(2);
        let b = KeyPair::generate().address(2);
        let particle = Particle::from(MessageParticle::new(a, b, b"hi".to_vec(), 1));
        assert_eq!(particle.destinations(), vec![a.uid(), b.uid()]);
        let to_self = Particle::from(MessageParticle::new(a, a, vec![], 1));
        assert_eq!(to_self.destinations().len(), 1);
    }

    #[test]
    fn test_particle_round_trip_all_kinds() {
        let owner = KeyPair::generate().address(2);
        let rri = Rri::new(owner, "TOK").unwrap();
        let particles: Vec<Particle> = vec![
            TokenDefinitionParticle::new(
                rri.clone(),
                "Token",
                "desc",
                UInt256::ONE,
                None,
                TokenSupply::Mutable(TokenPermissions::owner_only()),
            )
            .unwrap()
            .into(),
            UnallocatedTokensParticle::new(
                rri.clone(),
                UInt256::MAX,
                UInt256::ONE,
                TokenPermissions::owner_only(),
                7,
            )
            .unwrap()
            .into(),
            transferrable(owner, 10).into(),
            MessageParticle::new(owner, owner, vec![1, 2], 3)
                .with_metadata("application", "message")
                .into(),
            UniqueParticle::new(owner, "name1", 4).unwrap().into(),
            RriParticle::new(rri).into(),
        ];
        for particle in particles {
            let bytes = dson::to_bytes(&particle, Output::Hash);
            let decoded: Particle = dson::from_bytes(&bytes).unwrap();
            assert_eq!(decoded, particle);
            let json = dson::to_json(&particle, Output::Wire);
            assert_eq!(dson::from_json::<Particle>(&json).unwrap(), particle);
        }
    }

    #[test]
    fn test_unknown_serializer_rejected() {
        let value = MapBuilder::new("radix.particles.nope", Output::Hash).build();
        assert_eq!(
            Particle::from_dson(&value),
            Err(DsonError::UnknownSerializer("radix.particles.nope".to_string()))
        );
    }

    #[test]
    fn test_hash_depends_on_nonce() {
        let owner = KeyPair::generate().address(2);
        let a = Particle::from(transferrable(owner, 5));
        let token = Rri::new(owner, "XRD").unwrap();
        let b = Particle::from(
            TransferrableTokensParticle::new(
                owner,
                token,
                UInt256::from_u64(5),
                UInt256::ONE,
                TokenPermissions::owner_only(),
                1,
                43,
            )
            .unwrap(),
        );
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.hash(), a.clone().hash());
    }

    #[test]
    fn test_group_json_wire_shape() {
        let owner = KeyPair::generate().address(2);
        let group = ParticleGroup::new(vec![SpunParticle::up(transferrable(owner, 3))]);
        let json = dson::to_json(&group, Output::Wire);
        assert_eq!(json["serializer"], ":str:radix.particle_group");
        assert_eq!(json["particles"][0]["spin"], 1);
        assert_eq!(
            json["particles"][0]["particle"]["serializer"],
            ":str:radix.particles.transferrable_tokens"
        );
        assert_eq!(json["particles"][0]["particle"]["amount"], ":u20:3");
    }
}
