//! Fungible particle transitioning (coin selection)
//!
//! Greedy over the caller's candidate order. Every touched candidate is
//! retired whole; the part of it not moved is reissued to its owner as a
//! migrated output. `Σremoved == Σtransitioned + Σmigrated` always holds.

use crate::error::StageActionError;
use crate::particles::{Particle, ParticleGroup, SpunParticle};
use crate::primitives::{Rri, UInt256};

/// A value-bearing particle the transitioner can consume.
pub trait Fungible {
    fn amount(&self) -> UInt256;
}

impl Fungible for crate::particles::TransferrableTokensParticle {
    fn amount(&self) -> UInt256 {
        self.amount()
    }
}

impl Fungible for crate::particles::UnallocatedTokensParticle {
    fn amount(&self) -> UInt256 {
        self.amount()
    }
}

impl Fungible for UInt256 {
    fn amount(&self) -> UInt256 {
        *self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FungibleTransition<I, O> {
    pub removed: Vec<I>,
    pub migrated: Vec<O>,
    pub transitioned: Vec<O>,
}

impl<I, O> FungibleTransition<I, O>
where
    I: Clone + Into<Particle>,
    O: Clone + Into<Particle>,
{
    /// removed → down, then migrated and transitioned → up, as one group.
    pub fn into_particle_group(self) -> ParticleGroup {
        let mut particles = Vec::with_capacity(
            self.removed.len() + self.migrated.len() + self.transitioned.len(),
        );
        particles.extend(self.removed.into_iter().map(SpunParticle::down));
        particles.extend(self.transitioned.into_iter().map(SpunParticle::up));
        particles.extend(self.migrated.into_iter().map(SpunParticle::up));
        ParticleGroup::new(particles)
    }
}

/// Per-candidate split: how much of each moved, how much came back as change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split {
    pub transitioned: UInt256,
    pub change: UInt256,
}

/// Pure amount arithmetic behind [`FungibleParticleTransitioner`].
pub fn plan(
    candidates: &[UInt256],
    target: UInt256,
    token: &Rri,
) -> Result<Vec<Split>, StageActionError> {
    let balance = UInt256::checked_sum(candidates.iter())
        .ok_or_else(|| StageActionError::Invalid("candidate balance overflows".to_string()))?;
    if balance < target {
        return Err(StageActionError::InsufficientFunds {
            token: token.clone(),
            balance,
            requested: target,
        });
    }

    let mut splits = Vec::new();
    let mut already_transitioned = UInt256::ZERO;
    for amount in candidates {
        if already_transitioned == target {
            break;
        }
        // already_transitioned <= target and transition <= amount hold by construction.
        let remaining = target.saturating_sub(&already_transitioned);
        let transitioned = remaining.min(*amount);
        let change = amount.saturating_sub(&transitioned);
        already_transitioned = already_transitioned
            .checked_add(&transitioned)
            .ok_or(StageActionError::Invalid("transition overflows".to_string()))?;
        splits.push(Split {
            transitioned,
            change,
        });
    }
    Ok(splits)
}

/// Parameterized by how to build a transitioned output (send, burn, mint
/// sink) and a migrated change output.
pub struct FungibleParticleTransitioner<T, M> {
    transition: T,
    migrate: M,
}

impl<T, M> FungibleParticleTransitioner<T, M> {
    pub fn new(transition: T, migrate: M) -> Self {
        FungibleParticleTransitioner {
            transition,
            migrate,
        }
    }

    pub fn create_transition<I, O>(
        &self,
        candidates: &[I],
        target: UInt256,
        token: &Rri,
    ) -> Result<FungibleTransition<I, O>, StageActionError>
    where
        I: Fungible + Clone,
        T: Fn(UInt256) -> Result<O, StageActionError>,
        M: Fn(UInt256) -> Result<O, StageActionError>,
    {
        let amounts: Vec<UInt256> = candidates.iter().map(Fungible::amount).collect();
        let splits = plan(&amounts, target, token)?;

        let mut result = FungibleTransition {
            removed: Vec::with_capacity(splits.len()),
            migrated: Vec::new(),
            transitioned: Vec::with_capacity(splits.len()),
        };
        for (candidate, split) in candidates.iter().zip(splits) {
            result.removed.push(candidate.clone());
            if !split.transitioned.is_zero() {
                result.transitioned.push((self.transition)(split.transitioned)?);
            }
            if !split.change.is_zero() {
                result.migrated.push((self.migrate)(split.change)?);
            }
        }
        Ok(result)
    }
}
