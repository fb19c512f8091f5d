//! Token definitions and circulating supply
//!
//! Fixed supply tokens report the supply in their definition. Mutable supply
//! tokens report the pool size minus what is still unallocated, once any
//! unallocated particle for the token has been seen.

use crate::atom::Atom;
use crate::chemistry::mappers::unallocated_pool;
use crate::error::ProjectionError;
use crate::particles::{Spin, SpunParticle, TokenDefinitionParticle, TokenSupply, TokenSupplyType};
use crate::primitives::{Hash256, Rri, UInt256};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenState {
    pub token: Rri,
    pub name: String,
    pub description: String,
    pub granularity: UInt256,
    pub icon_url: Option<String>,
    pub supply_type: TokenSupplyType,
    /// `None` for a mutable token whose pool has not been observed.
    pub total_supply: Option<UInt256>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Pool {
    granularity: UInt256,
    live: BTreeMap<Hash256, UInt256>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenDefinitionsState {
    definitions: BTreeMap<Rri, TokenDefinitionParticle>,
    pools: BTreeMap<Rri, Pool>,
}

impl TokenDefinitionsState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_atoms<'a>(atoms: impl IntoIterator<Item = &'a Atom>) -> Result<Self, ProjectionError> {
        let mut state = Self::new();
        for atom in atoms {
            for spun in atom.spun_particles() {
                state.apply(spun)?;
            }
        }
        Ok(state)
    }

    pub fn apply(&mut self, spun: &SpunParticle) -> Result<(), ProjectionError> {
        if let Some(definition) = spun.particle.as_token_definition() {
            if spun.spin == Spin::Up {
                self.define(definition.clone())?;
            }
            return Ok(());
        }
        if let Some(unallocated) = spun.particle.as_unallocated() {
            let pool = self
                .pools
                .entry(unallocated.token().clone())
                .or_insert_with(|| Pool {
                    granularity: unallocated.granularity(),
                    live: BTreeMap::new(),
                });
            match spun.spin {
                Spin::Up => {
                    pool.live.insert(spun.particle.hash(), unallocated.amount());
                }
                Spin::Down => {
                    pool.live.remove(&spun.particle.hash());
                }
                Spin::Neutral => {}
            }
        }
        Ok(())
    }

    fn define(&mut self, definition: TokenDefinitionParticle) -> Result<(), ProjectionError> {
        match self.definitions.get(definition.rri()) {
            Some(existing) if *existing != definition => {
                Err(ProjectionError::ConflictingDefinition(definition.rri().clone()))
            }
            Some(_) => Ok(()),
            None => {
                self.definitions.insert(definition.rri().clone(), definition);
                Ok(())
            }
        }
    }

    pub fn get(&self, token: &Rri) -> Option<TokenState> {
        let definition = self.definitions.get(token)?;
        let total_supply = match definition.supply() {
            TokenSupply::Fixed(supply) => Some(*supply),
            TokenSupply::Mutable(_) => self.pools.get(token).map(|pool| {
                let unallocated = UInt256::checked_sum(pool.live.values()).unwrap_or(UInt256::MAX);
                unallocated_pool(&pool.granularity).saturating_sub(&unallocated)
            }),
        };
        Some(TokenState {
            token: token.clone(),
            name: definition.name().to_string(),
            description: definition.description().to_string(),
            granularity: definition.granularity(),
            icon_url: definition.icon_url().map(str::to_string),
            supply_type: definition.supply().supply_type(),
            total_supply,
        })
    }

    pub fn tokens(&self) -> Vec<TokenState> {
        self.definitions.keys().filter_map(|token| self.get(token)).collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Union of two states. Two different definitions for one token, or the
    /// same unallocated particle in both, is an error.
    pub fn merge(mut self, other: TokenDefinitionsState) -> Result<Self, ProjectionError> {
        for (_, definition) in other.definitions {
            self.define(definition)?;
        }
        for (token, theirs) in other.pools {
            let ours = self.pools.entry(token).or_insert_with(|| Pool {
                granularity: theirs.granularity,
                live: BTreeMap::new(),
            });
            for (hash, amount) in theirs.live {
                if ours.live.insert(hash, amount).is_some() {
                    return Err(ProjectionError::DuplicateParticle(hash.to_hex()));
                }
            }
        }
        Ok(self)
    }
}
