use super::{
    check_amount, check_signer, find_definition, transferrables_of, APPLICATION_ATTACHMENT,
    APPLICATION_KEY,
};
use crate::chemistry::actions::TransferTokensAction;
use crate::chemistry::transitioner::FungibleParticleTransitioner;
use crate::error::StageActionError;
use crate::particles::{
    current_planck, random_nonce, MessageParticle, Particle, ParticleGroup, SpunParticle,
    TransferrableTokensParticle,
};
use crate::primitives::{RadixAddress, UInt256};

/// Sends tokens from the active address, returning change to it. An
/// attachment rides along as a message particle in the same group.
pub fn map_transfer_tokens(
    action: &TransferTokensAction,
    up_particles: &[Particle],
    active: &RadixAddress,
) -> Result<Vec<ParticleGroup>, StageActionError> {
    check_signer(&action.from, active)?;
    let candidates = transferrables_of(up_particles, &action.from, &action.token);

    let granularity = find_definition(up_particles, &action.token)
        .map(|d| d.granularity())
        .or_else(|| candidates.first().map(|c| c.granularity()));
    let (granularity, permissions) = match (granularity, candidates.first()) {
        (Some(granularity), Some(first)) => (granularity, first.permissions()),
        _ => {
            if action.amount.is_zero() {
                return Err(StageActionError::ZeroAmount);
            }
            return Err(StageActionError::InsufficientFunds {
                token: action.token.clone(),
                balance: UInt256::ZERO,
                requested: action.amount,
            });
        }
    };
    check_amount(&action.amount, &granularity)?;

    let planck = current_planck();
    let output = |owner: RadixAddress| {
        let token = action.token.clone();
        move |amount: UInt256| {
            TransferrableTokensParticle::new(
                owner,
                token.clone(),
                amount,
                granularity,
                permissions,
                planck,
                random_nonce(),
            )
        }
    };
    let transitioner = FungibleParticleTransitioner::new(output(action.to), output(action.from));
    let transition = transitioner.create_transition(&candidates, action.amount, &action.token)?;

    let mut group = transition.into_particle_group();
    if let Some(attachment) = &action.attachment {
        group.push(SpunParticle::up(
            MessageParticle::new(action.from, action.to, attachment.clone(), random_nonce())
                .with_metadata(APPLICATION_KEY, APPLICATION_ATTACHMENT),
        ));
    }
    Ok(vec![group])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::particles::{Spin, TokenPermissions};
    use crate::primitives::Rri;

    fn coin(owner: RadixAddress, token: &Rri, amount: u64) -> Particle {
        TransferrableTokensParticle::new(
            owner,
            token.clone(),
            UInt256::from_u64(amount),
            UInt256::ONE,
            TokenPermissions::owner_only(),
            1,
            random_nonce(),
        )
        .unwrap()
        .into()
    }

    #[test]
    fn test_transfer_with_change() {
        let a = KeyPair::generate().address(2);
        let b = KeyPair::generate().address(2);
        let token = Rri::new(a, "XRD").unwrap();
        let up = vec![coin(a, &token, 10)];
        let action = TransferTokensAction::new(a, b, token.clone(), UInt256::from_u64(4));

        let groups = map_transfer_tokens(&action, &up, &a).unwrap();
        assert_eq!(groups.len(), 1);
        let particles = groups[0].particles();
        assert_eq!(particles.len(), 3);
        assert_eq!(particles[0].spin, Spin::Down);
        assert_eq!(particles[0].particle, up[0]);

        let ups: Vec<&TransferrableTokensParticle> = groups[0]
            .with_spin(Spin::Up)
            .filter_map(Particle::as_transferrable)
            .collect();
        assert_eq!(ups[0].address(), &b);
        assert_eq!(ups[0].amount(), UInt256::from_u64(4));
        assert_eq!(ups[1].address(), &a);
        assert_eq!(ups[1].amount(), UInt256::from_u64(6));
    }

    #[test]
    fn test_attachment_in_same_group() {
        let a = KeyPair::generate().address(2);
        let b = KeyPair::generate().address(2);
        let token = Rri::new(a, "XRD").unwrap();
        let up = vec![coin(a, &token, 5)];
        let action =
            TransferTokensAction::new(a, b, token, UInt256::from_u64(5)).with_attachment(b"memo".to_vec());

        let groups = map_transfer_tokens(&action, &up, &a).unwrap();
        let message = groups[0]
            .particles()
            .iter()
            .find_map(|sp| match &sp.particle {
                Particle::Message(m) => Some(m.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(message.data(), b"memo");
        assert_eq!(
            message.metadata().get(APPLICATION_KEY).map(String::as_str),
            Some(APPLICATION_ATTACHMENT)
        );
    }

    #[test]
    fn test_insufficient_funds() {
        let a = KeyPair::generate().address(2);
        let b = KeyPair::generate().address(2);
        let token = Rri::new(a, "XRD").unwrap();
        let up = vec![coin(a, &token, 3), coin(a, &token, 5)];
        let action = TransferTokensAction::new(a, b, token.clone(), UInt256::from_u64(10));
        assert_eq!(
            map_transfer_tokens(&action, &up, &a),
            Err(StageActionError::InsufficientFunds {
                token: token.clone(),
                balance: UInt256::from_u64(8),
                requested: UInt256::from_u64(10),
            })
        );
        assert!(matches!(
            map_transfer_tokens(&action, &[], &a),
            Err(StageActionError::InsufficientFunds { balance, .. }) if balance.is_zero()
        ));
    }

    #[test]
    fn test_other_owners_coins_ignored() {
        let a = KeyPair::generate().address(2);
        let b = KeyPair::generate().address(2);
        let token = Rri::new(a, "XRD").unwrap();
        let up = vec![coin(b, &token, 50), coin(a, &token, 2)];
        let action = TransferTokensAction::new(a, b, token, UInt256::from_u64(3));
        assert!(matches!(
            map_transfer_tokens(&action, &up, &a),
            Err(StageActionError::InsufficientFunds { balance, .. }) if balance == UInt256::from_u64(2)
        ));
    }

    #[test]
    fn test_signer_must_be_active() {
        let a = KeyPair::generate().address(2);
        let b = KeyPair::generate().address(2);
        let token = Rri::new(a, "XRD").unwrap();
        let action = TransferTokensAction::new(a, b, token, UInt256::ONE);
        assert!(matches!(
            map_transfer_tokens(&action, &[], &b),
            Err(StageActionError::SignerMismatch { .. })
        ));
    }
}
