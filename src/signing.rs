//! Turning an unsigned atom into a submittable one: seed, proof-of-work,
//! nonce stamp, signature.

use crate::atom::{Atom, UnsignedAtom};
use crate::crypto::RadixIdentity;
use crate::error::{PowError, Result};
use crate::pow::ProofOfWork;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// The puzzle an atom must solve before it may be submitted.
pub fn pow_for(atom: &UnsignedAtom, magic: i32, leading_zeros: u32) -> ProofOfWork {
    ProofOfWork::new(atom.without_pow_nonce().hash(), magic, leading_zeros)
}

/// Checks the `powNonce` stamped into an atom.
pub fn verify_pow(atom: &UnsignedAtom, magic: i32, leading_zeros: u32) -> Result<bool> {
    match atom.pow_nonce() {
        Some(nonce) => Ok(pow_for(atom, magic, leading_zeros).prove(nonce)?),
        None => Ok(false),
    }
}

/// Finalizes `atom`: proof-of-work (cancellable), then a signature from
/// `identity` over the nonce-stamped hash.
pub async fn finalize(
    atom: UnsignedAtom,
    identity: &dyn RadixIdentity,
    magic: i32,
    leading_zeros: u32,
    cancel: CancellationToken,
) -> Result<Atom> {
    let nonce = pow_for(&atom, magic, leading_zeros)
        .work_async(cancel.clone())
        .await?;
    if cancel.is_cancelled() {
        return Err(PowError::Cancelled(nonce).into());
    }
    let stamped = atom.with_pow_nonce(nonce);
    let hash = stamped.hash();
    let signature = identity.sign(&hash).await?;
    let signer = identity.address(magic);
    debug!(atom = %hash, signer = %signer, "Atom signed");
    Ok(stamped.sign(&signer, signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::LocalIdentity;
    use crate::error::RadixError;
    use crate::particles::{MessageParticle, ParticleGroup, SpunParticle};
    use std::time::Duration;

    fn message_atom(identity: &LocalIdentity) -> UnsignedAtom {
        let address = identity.address(5);
        UnsignedAtom::new(
            vec![ParticleGroup::new(vec![SpunParticle::up(MessageParticle::new(
                address,
                address,
                b"pow".to_vec(),
                1,
            ))])],
            1,
        )
    }

    #[tokio::test]
    async fn test_finalize_produces_valid_atom() {
        tokio::time::timeout(Duration::from_secs(10), async {
            let identity = LocalIdentity::generate();
            let unsigned = message_atom(&identity);
            let atom = finalize(
                unsigned.clone(),
                &identity,
                5,
                8,
                CancellationToken::new(),
            )
            .await
            .unwrap();

            assert!(verify_pow(atom.unsigned(), 5, 8).unwrap());
            assert!(atom.verify_signature(&identity.address(5)).is_ok());
            assert_eq!(atom.unsigned().without_pow_nonce(), unsigned);
        })
        .await
        .expect("Test timed out");
    }

    #[tokio::test]
    async fn test_finalize_cancelled() {
        tokio::time::timeout(Duration::from_secs(5), async {
            let identity = LocalIdentity::generate();
            let cancel = CancellationToken::new();
            cancel.cancel();
            let result = finalize(message_atom(&identity), &identity, 5, 200, cancel).await;
            assert!(matches!(
                result,
                Err(RadixError::Pow(PowError::Cancelled(_)))
            ));
        })
        .await
        .expect("Test timed out");
    }

    #[test]
    fn test_missing_nonce_is_not_proven() {
        let identity = LocalIdentity::generate();
        assert!(!verify_pow(&message_atom(&identity), 5, 8).unwrap());
    }
}
