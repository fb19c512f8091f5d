//! Action → particle group mappers
//!
//! Each mapper takes the action, the up particles of the addresses named by
//! [`UserAction::required_state`] and the active address, and either returns
//! the particle groups that encode the action or a [`StageActionError`].

mod message;
mod token;
mod transfer;

pub use message::{map_put_unique_id, map_send_message};
pub use token::{map_burn_tokens, map_create_token, map_mint_tokens, unallocated_pool};
pub use transfer::map_transfer_tokens;

use super::actions::UserAction;
use crate::error::StageActionError;
use crate::particles::{
    Particle, ParticleGroup, TokenDefinitionParticle, TransferrableTokensParticle,
    UnallocatedTokensParticle,
};
use crate::primitives::{RadixAddress, Rri, UInt256};

/// Metadata key marking the purpose of a message particle.
pub const APPLICATION_KEY: &str = "application";
pub const APPLICATION_ATTACHMENT: &str = "attachment";
pub const APPLICATION_MESSAGE: &str = "message";

pub fn map_action(
    action: &UserAction,
    up_particles: &[Particle],
    active: &RadixAddress,
) -> Result<Vec<ParticleGroup>, StageActionError> {
    check_signer(action.signer(), active)?;
    match action {
        UserAction::CreateToken(a) => map_create_token(a, up_particles, active),
        UserAction::TransferTokens(a) => map_transfer_tokens(a, up_particles, active),
        UserAction::BurnTokens(a) => map_burn_tokens(a, up_particles, active),
        UserAction::MintTokens(a) => map_mint_tokens(a, up_particles, active),
        UserAction::SendMessage(a) => map_send_message(a, up_particles, active),
        UserAction::PutUniqueId(a) => map_put_unique_id(a, up_particles, active),
    }
}

pub(crate) fn check_signer(
    signer: &RadixAddress,
    active: &RadixAddress,
) -> Result<(), StageActionError> {
    if signer != active {
        return Err(StageActionError::SignerMismatch {
            signer: *signer,
            active: *active,
        });
    }
    Ok(())
}

pub(crate) fn check_amount(amount: &UInt256, granularity: &UInt256) -> Result<(), StageActionError> {
    if amount.is_zero() {
        return Err(StageActionError::ZeroAmount);
    }
    if granularity.is_zero() {
        return Err(StageActionError::ZeroGranularity);
    }
    if !amount.is_multiple_of(granularity) {
        return Err(StageActionError::NotMultipleOfGranularity {
            amount: *amount,
            granularity: *granularity,
        });
    }
    Ok(())
}

/// Fails if a live token definition or unique id already holds `rri`.
pub(crate) fn check_rri_unclaimed(
    up_particles: &[Particle],
    rri: &Rri,
) -> Result<(), StageActionError> {
    if up_particles
        .iter()
        .any(|p| p.claimed_rri() == Some(rri))
    {
        return Err(StageActionError::RriAlreadyClaimed(rri.clone()));
    }
    Ok(())
}

pub(crate) fn find_definition<'a>(
    up_particles: &'a [Particle],
    token: &Rri,
) -> Option<&'a TokenDefinitionParticle> {
    up_particles
        .iter()
        .filter_map(Particle::as_token_definition)
        .find(|d| d.rri() == token)
}

pub(crate) fn transferrables_of(
    up_particles: &[Particle],
    owner: &RadixAddress,
    token: &Rri,
) -> Vec<TransferrableTokensParticle> {
    up_particles
        .iter()
        .filter_map(Particle::as_transferrable)
        .filter(|p| p.address() == owner && p.token() == token)
        .cloned()
        .collect()
}

pub(crate) fn unallocated_of(
    up_particles: &[Particle],
    token: &Rri,
) -> Vec<UnallocatedTokensParticle> {
    up_particles
        .iter()
        .filter_map(Particle::as_unallocated)
        .filter(|p| p.token() == token)
        .cloned()
        .collect()
}

pub(crate) fn invalid_name(err: crate::error::PrimitiveError) -> StageActionError {
    StageActionError::Invalid(err.to_string())
}
