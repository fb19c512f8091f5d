use super::{
    check_rri_unclaimed, check_signer, invalid_name, APPLICATION_KEY, APPLICATION_MESSAGE,
};
use crate::chemistry::actions::{PutUniqueIdAction, SendMessageAction};
use crate::error::StageActionError;
use crate::particles::{
    random_nonce, MessageParticle, Particle, ParticleGroup, RriParticle, SpunParticle,
    UniqueParticle,
};
use crate::primitives::{RadixAddress, Rri};

pub fn map_send_message(
    action: &SendMessageAction,
    _up_particles: &[Particle],
    active: &RadixAddress,
) -> Result<Vec<ParticleGroup>, StageActionError> {
    check_signer(&action.from, active)?;
    let message = MessageParticle::new(action.from, action.to, action.data.clone(), random_nonce())
        .with_metadata(APPLICATION_KEY, APPLICATION_MESSAGE);
    Ok(vec![ParticleGroup::new(vec![SpunParticle::up(message)])])
}

/// Consumes the RRI reservation and creates the unique particle.
pub fn map_put_unique_id(
    action: &PutUniqueIdAction,
    up_particles: &[Particle],
    active: &RadixAddress,
) -> Result<Vec<ParticleGroup>, StageActionError> {
    check_signer(&action.address, active)?;
    let rri = Rri::new(action.address, action.unique.clone()).map_err(invalid_name)?;
    check_rri_unclaimed(up_particles, &rri)?;
    let unique = UniqueParticle::new(action.address, action.unique.clone(), random_nonce())
        .map_err(invalid_name)?;
    Ok(vec![ParticleGroup::new(vec![
        SpunParticle::down(RriParticle::new(rri)),
        SpunParticle::up(unique),
    ])])
}
