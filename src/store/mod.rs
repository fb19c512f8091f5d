//! Local projections of ledger state
//!
//! The [`InMemoryAtomStore`] holds every atom observed for the addresses we
//! follow; [`TokenBalanceState`] and [`TokenDefinitionsState`] are folded
//! from it on demand.

pub mod atom_store;
pub mod balance;
pub mod reducer;
pub mod token_definitions;

pub use atom_store::InMemoryAtomStore;
pub use balance::{TokenBalance, TokenBalanceState};
pub use reducer::InMemoryAtomStoreReducer;
pub use token_definitions::{TokenDefinitionsState, TokenState};
