use super::{
    check_amount, check_rri_unclaimed, check_signer, find_definition, invalid_name,
    transferrables_of, unallocated_of,
};
use crate::chemistry::actions::{BurnTokensAction, CreateTokenAction, MintTokensAction};
use crate::chemistry::transitioner::FungibleParticleTransitioner;
use crate::error::StageActionError;
use crate::particles::{
    current_planck, random_nonce, Particle, ParticleGroup, RriParticle, SpunParticle,
    TokenDefinitionParticle, TokenPermission, TokenPermissions, TokenSupply, TokenSupplyType,
    TransferrableTokensParticle, UnallocatedTokensParticle,
};
use crate::primitives::{RadixAddress, Rri, UInt256};

/// Size of the unallocated pool a mutable token starts with: the largest
/// multiple of `granularity` that fits in 256 bits.
pub fn unallocated_pool(granularity: &UInt256) -> UInt256 {
    match UInt256::MAX.div_rem(granularity) {
        Ok((_, rem)) => UInt256::MAX.saturating_sub(&rem),
        Err(_) => UInt256::MAX,
    }
}

/// Fixed supply: one group with the RRI claim, the definition and the whole
/// supply to the creator. Mutable supply: the claim, the definition and the
/// unallocated pool, plus a mint group when the initial supply is non-zero.
pub fn map_create_token(
    action: &CreateTokenAction,
    up_particles: &[Particle],
    active: &RadixAddress,
) -> Result<Vec<ParticleGroup>, StageActionError> {
    check_signer(&action.creator, active)?;
    let rri = Rri::new(action.creator, action.iso.clone()).map_err(invalid_name)?;
    check_rri_unclaimed(up_particles, &rri)?;
    if action.granularity.is_zero() {
        return Err(StageActionError::ZeroGranularity);
    }

    match action.supply_type {
        TokenSupplyType::Fixed => {
            check_amount(&action.initial_supply, &action.granularity)?;
            let definition = TokenDefinitionParticle::new(
                rri.clone(),
                action.name.clone(),
                action.description.clone(),
                action.granularity,
                action.icon_url.clone(),
                TokenSupply::Fixed(action.initial_supply),
            )?;
            let supply = TransferrableTokensParticle::new(
                action.creator,
                rri.clone(),
                action.initial_supply,
                action.granularity,
                TokenPermissions::fixed(),
                current_planck(),
                random_nonce(),
            )?;
            Ok(vec![ParticleGroup::new(vec![
                SpunParticle::down(RriParticle::new(rri)),
                SpunParticle::up(definition),
                SpunParticle::up(supply),
            ])])
        }
        TokenSupplyType::Mutable => {
            if !action.initial_supply.is_zero() {
                check_amount(&action.initial_supply, &action.granularity)?;
            }
            let definition = TokenDefinitionParticle::new(
                rri.clone(),
                action.name.clone(),
                action.description.clone(),
                action.granularity,
                action.icon_url.clone(),
                TokenSupply::Mutable(action.permissions),
            )?;
            let pool = UnallocatedTokensParticle::new(
                rri.clone(),
                unallocated_pool(&action.granularity),
                action.granularity,
                action.permissions,
                random_nonce(),
            )?;
            let mut groups = vec![ParticleGroup::new(vec![
                SpunParticle::down(RriParticle::new(rri.clone())),
                SpunParticle::up(definition),
                SpunParticle::up(pool.clone()),
            ])];
            if !action.initial_supply.is_zero() {
                groups.push(mint_group(
                    &[pool],
                    &action.creator,
                    &rri,
                    action.initial_supply,
                    action.granularity,
                    action.permissions,
                )?);
            }
            Ok(groups)
        }
    }
}

fn mint_group(
    unallocated: &[UnallocatedTokensParticle],
    minter: &RadixAddress,
    token: &Rri,
    amount: UInt256,
    granularity: UInt256,
    permissions: TokenPermissions,
) -> Result<ParticleGroup, StageActionError> {
    let planck = current_planck();
    let transitioner = FungibleParticleTransitioner::new(
        |amount| {
            TransferrableTokensParticle::new(
                *minter,
                token.clone(),
                amount,
                granularity,
                permissions,
                planck,
                random_nonce(),
            )
            .map(Particle::from)
        },
        |amount| {
            UnallocatedTokensParticle::new(
                token.clone(),
                amount,
                granularity,
                permissions,
                random_nonce(),
            )
            .map(Particle::from)
        },
    );
    let transition = transitioner.create_transition(unallocated, amount, token)?;
    Ok(transition.into_particle_group())
}

fn check_permission(
    definition: &TokenDefinitionParticle,
    permission: TokenPermission,
    actor: &RadixAddress,
    action: &'static str,
) -> Result<(), StageActionError> {
    if permission.allows(actor, definition.owner()) {
        return Ok(());
    }
    let holder = match permission {
        TokenPermission::TokenOwnerOnly => Some(*definition.owner()),
        _ => None,
    };
    Err(StageActionError::PermissionDenied {
        token: definition.rri().clone(),
        action,
        required: permission.as_str(),
        holder,
    })
}

fn mutable_definition<'a>(
    up_particles: &'a [Particle],
    token: &Rri,
) -> Result<(&'a TokenDefinitionParticle, TokenPermissions), StageActionError> {
    let definition =
        find_definition(up_particles, token).ok_or_else(|| StageActionError::UnknownToken(token.clone()))?;
    match definition.supply() {
        TokenSupply::Fixed(_) => Err(StageActionError::FixedSupply(token.clone())),
        TokenSupply::Mutable(permissions) => Ok((definition, *permissions)),
    }
}

/// Moves new supply out of the unallocated pool to the minter.
pub fn map_mint_tokens(
    action: &MintTokensAction,
    up_particles: &[Particle],
    active: &RadixAddress,
) -> Result<Vec<ParticleGroup>, StageActionError> {
    check_signer(&action.address, active)?;
    let (definition, permissions) = mutable_definition(up_particles, &action.token)?;
    check_permission(definition, permissions.mint, &action.address, "Mint")?;
    check_amount(&action.amount, &definition.granularity())?;

    let pool = unallocated_of(up_particles, &action.token);
    let group = mint_group(
        &pool,
        &action.address,
        &action.token,
        action.amount,
        definition.granularity(),
        permissions,
    )?;
    Ok(vec![group])
}

/// Returns tokens of the burner to the unallocated pool.
pub fn map_burn_tokens(
    action: &BurnTokensAction,
    up_particles: &[Particle],
    active: &RadixAddress,
) -> Result<Vec<ParticleGroup>, StageActionError> {
    check_signer(&action.address, active)?;
    let (definition, permissions) = mutable_definition(up_particles, &action.token)?;
    check_permission(definition, permissions.burn, &action.address, "Burn")?;
    let granularity = definition.granularity();
    check_amount(&action.amount, &granularity)?;

    let candidates = transferrables_of(up_particles, &action.address, &action.token);
    let planck = current_planck();
    let transitioner = FungibleParticleTransitioner::new(
        |amount| {
            UnallocatedTokensParticle::new(
                action.token.clone(),
                amount,
                granularity,
                permissions,
                random_nonce(),
            )
            .map(Particle::from)
        },
        |amount| {
            TransferrableTokensParticle::new(
                action.address,
                action.token.clone(),
                amount,
                granularity,
                permissions,
                planck,
                random_nonce(),
            )
            .map(Particle::from)
        },
    );
    let transition = transitioner.create_transition(&candidates, action.amount, &action.token)?;
    Ok(vec![transition.into_particle_group()])
}
