//! Token balances folded from transferrable particles

use crate::atom::Atom;
use crate::error::ProjectionError;
use crate::particles::{Particle, Spin, SpunParticle, TransferrableTokensParticle};
use crate::primitives::{Hash256, RadixAddress, Rri, UInt256};
use std::collections::BTreeMap;

/// The live coins one address holds of one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalance {
    pub token: Rri,
    pub granularity: UInt256,
    coins: BTreeMap<Hash256, UInt256>,
}

impl TokenBalance {
    fn new(token: Rri, granularity: UInt256) -> Self {
        TokenBalance {
            token,
            granularity,
            coins: BTreeMap::new(),
        }
    }

    /// Saturates at `UInt256::MAX`; a sum that large cannot come from a
    /// valid ledger.
    pub fn amount(&self) -> UInt256 {
        UInt256::checked_sum(self.coins.values()).unwrap_or(UInt256::MAX)
    }

    pub fn coin_count(&self) -> usize {
        self.coins.len()
    }
}

/// Balances keyed by address then token. Only up particles add value; a
/// down only retracts an up applied earlier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenBalanceState {
    balances: BTreeMap<RadixAddress, BTreeMap<Rri, TokenBalance>>,
}

impl TokenBalanceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_atoms<'a>(atoms: impl IntoIterator<Item = &'a Atom>) -> Result<Self, ProjectionError> {
        let mut state = Self::new();
        for atom in atoms {
            state.apply_atom(atom)?;
        }
        Ok(state)
    }

    /// Builds the state from a set of particles already known to be live.
    pub fn from_up_particles<'a>(
        particles: impl IntoIterator<Item = &'a Particle>,
    ) -> Result<Self, ProjectionError> {
        let mut state = Self::new();
        for particle in particles {
            if let Some(coin) = particle.as_transferrable() {
                state.add(coin, particle.hash())?;
            }
        }
        Ok(state)
    }

    pub fn apply_atom(&mut self, atom: &Atom) -> Result<(), ProjectionError> {
        for spun in atom.spun_particles() {
            self.apply(spun)?;
        }
        Ok(())
    }

    pub fn apply(&mut self, spun: &SpunParticle) -> Result<(), ProjectionError> {
        let Some(coin) = spun.particle.as_transferrable() else {
            return Ok(());
        };
        let hash = spun.particle.hash();
        match spun.spin {
            Spin::Up => self.add(coin, hash),
            Spin::Down => {
                if let Some(balance) = self
                    .balances
                    .get_mut(coin.address())
                    .and_then(|tokens| tokens.get_mut(coin.token()))
                {
                    balance.coins.remove(&hash);
                }
                Ok(())
            }
            Spin::Neutral => Ok(()),
        }
    }

    fn add(&mut self, coin: &TransferrableTokensParticle, hash: Hash256) -> Result<(), ProjectionError> {
        let balance = self
            .balances
            .entry(*coin.address())
            .or_default()
            .entry(coin.token().clone())
            .or_insert_with(|| TokenBalance::new(coin.token().clone(), coin.granularity()));
        if balance.granularity != coin.granularity() {
            return Err(ProjectionError::ConflictingBalance {
                address: *coin.address(),
                token: coin.token().clone(),
            });
        }
        balance.coins.insert(hash, coin.amount());
        Ok(())
    }

    pub fn balance(&self, address: &RadixAddress, token: &Rri) -> UInt256 {
        self.token_balance(address, token)
            .map(TokenBalance::amount)
            .unwrap_or(UInt256::ZERO)
    }

    pub fn token_balance(&self, address: &RadixAddress, token: &Rri) -> Option<&TokenBalance> {
        self.balances.get(address).and_then(|tokens| tokens.get(token))
    }

    /// Non-zero balances of `address`.
    pub fn balances(&self, address: &RadixAddress) -> BTreeMap<Rri, UInt256> {
        self.balances
            .get(address)
            .into_iter()
            .flat_map(|tokens| tokens.values())
            .map(|balance| (balance.token.clone(), balance.amount()))
            .filter(|(_, amount)| !amount.is_zero())
            .collect()
    }

    pub fn addresses(&self) -> impl Iterator<Item = &RadixAddress> {
        self.balances.keys()
    }

    /// Combines two states built from disjoint particle sets. The same coin
    /// in both, or one token seen with two granularities, is an error.
    pub fn merge(mut self, other: TokenBalanceState) -> Result<Self, ProjectionError> {
        for (address, tokens) in other.balances {
            let mine = self.balances.entry(address).or_default();
            for (token, theirs) in tokens {
                match mine.get_mut(&token) {
                    None => {
                        mine.insert(token, theirs);
                    }
                    Some(ours) => {
                        if ours.granularity != theirs.granularity {
                            return Err(ProjectionError::ConflictingBalance { address, token });
                        }
                        for (hash, amount) in theirs.coins {
                            if ours.coins.insert(hash, amount).is_some() {
                                return Err(ProjectionError::DuplicateParticle(hash.to_hex()));
                            }
                        }
                    }
                }
            }
        }
        Ok(self)
    }
}
