//! Chemistry: mapping between user intent and particles
//!
//! ## Forward
//! - [`actions`] - the closed set of [`UserAction`]s
//! - [`transitioner`] - fungible coin selection
//! - [`mappers`] - one mapper per action
//! - [`builder`] - multi-action atoms
//!
//! ## Reverse
//! - [`reverse`] - atoms back to executed actions

pub mod actions;
pub mod builder;
pub mod mappers;
pub mod reverse;
pub mod transitioner;

pub use actions::{
    BurnTokensAction, CreateTokenAction, MintTokensAction, PutUniqueIdAction, SendMessageAction,
    TransferTokensAction, UserAction,
};
pub use builder::TransactionBuilder;
pub use mappers::map_action;
pub use reverse::{AtomToExecutedActions, ExecutedAction, ExecutedTransaction};
pub use transitioner::{Fungible, FungibleParticleTransitioner, FungibleTransition};
