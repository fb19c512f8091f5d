//! Property tests for coin selection and canonical encoding

use proptest::prelude::*;
use radix_client::atom::{Atom, UnsignedAtom};
use radix_client::chemistry::transitioner::plan;
use radix_client::chemistry::FungibleParticleTransitioner;
use radix_client::crypto::KeyPair;
use radix_client::dson::{self, Output};
use radix_client::error::StageActionError;
use radix_client::particles::{MessageParticle, ParticleGroup, SpunParticle};
use radix_client::primitives::{Rri, UInt256};

fn token() -> Rri {
    Rri::new(KeyPair::generate().address(1), "XRD").unwrap()
}

fn sum(values: &[UInt256]) -> UInt256 {
    UInt256::checked_sum(values.iter()).unwrap()
}

proptest! {
    #[test]
    fn prop_transition_conserves_value(
        amounts in prop::collection::vec(1u64..1_000_000, 1..20),
        fraction in 0.0f64..=1.0,
    ) {
        let total: u64 = amounts.iter().sum();
        let target = ((total as f64 * fraction) as u64).clamp(1, total);
        let candidates: Vec<UInt256> = amounts.iter().copied().map(UInt256::from_u64).collect();

        let transitioner = FungibleParticleTransitioner::new(
            |amount: UInt256| Ok::<_, StageActionError>(amount),
            |amount: UInt256| Ok::<_, StageActionError>(amount),
        );
        let result = transitioner
            .create_transition(&candidates, UInt256::from_u64(target), &token())
            .unwrap();

        let removed = sum(&result.removed);
        let transitioned = sum(&result.transitioned);
        let migrated = sum(&result.migrated);
        prop_assert_eq!(removed, transitioned.checked_add(&migrated).unwrap());
        prop_assert_eq!(transitioned, UInt256::from_u64(target));
        // Candidates are consumed as a prefix of the given order.
        prop_assert_eq!(&result.removed[..], &candidates[..result.removed.len()]);
        prop_assert!(result.migrated.len() <= 1);
    }

    #[test]
    fn prop_insufficient_funds_reports_true_balance(
        amounts in prop::collection::vec(0u64..1_000, 0..10),
        extra in 1u64..1_000,
    ) {
        let total: u64 = amounts.iter().sum();
        let candidates: Vec<UInt256> = amounts.iter().copied().map(UInt256::from_u64).collect();
        let token = token();
        let result = plan(&candidates, UInt256::from_u64(total + extra), &token);
        prop_assert_eq!(
            result,
            Err(StageActionError::InsufficientFunds {
                token,
                balance: UInt256::from_u64(total),
                requested: UInt256::from_u64(total + extra),
            })
        );
    }
}

#[test]
fn test_insufficient_funds_example() {
    let token = token();
    let candidates = [UInt256::from_u64(3), UInt256::from_u64(5)];
    match plan(&candidates, UInt256::from_u64(10), &token) {
        Err(StageActionError::InsufficientFunds { balance, .. }) => {
            assert_eq!(balance, UInt256::from_u64(8))
        }
        other => panic!("expected insufficient funds, got {other:?}"),
    }
}

fn signed(keypair: &KeyPair, unsigned: UnsignedAtom) -> Atom {
    let signature = keypair.sign_hash(&unsigned.hash()).unwrap();
    unsigned.sign(&keypair.address(1), signature)
}

#[test]
fn test_encoding_independent_of_metadata_order() {
    let keypair = KeyPair::generate();
    let address = keypair.address(1);
    let group = || {
        ParticleGroup::new(vec![SpunParticle::up(MessageParticle::new(
            address,
            address,
            b"determinism".to_vec(),
            42,
        ))])
    };

    let one = UnsignedAtom::new(vec![group()], 1_000)
        .with_metadata("application", "wallet")
        .with_metadata("origin", "test");
    let two = UnsignedAtom::new(vec![group()], 1_000)
        .with_metadata("origin", "test")
        .with_metadata("application", "wallet");

    assert_eq!(dson::to_bytes(&one, Output::Hash), dson::to_bytes(&two, Output::Hash));
    assert_eq!(one.hash(), two.hash());
}

#[test]
fn test_decode_encode_is_lossless() {
    let keypair = KeyPair::generate();
    let address = keypair.address(1);
    let atom = signed(
        &keypair,
        UnsignedAtom::new(
            vec![ParticleGroup::new(vec![SpunParticle::up(MessageParticle::new(
                address,
                address,
                vec![0, 1, 2, 255],
                7,
            ))])],
            5_000,
        ),
    );

    let bytes = dson::to_bytes(&atom, Output::Wire);
    let decoded: Atom = dson::from_bytes(&bytes).unwrap();
    assert_eq!(decoded, atom);
    assert_eq!(dson::to_bytes(&decoded, Output::Wire), bytes);

    let json = dson::to_json(&atom, Output::Wire);
    let from_json: Atom = dson::from_json(&json).unwrap();
    assert_eq!(from_json.hash(), atom.hash());
}

#[test]
fn test_hash_form_excludes_signatures() {
    let keypair = KeyPair::generate();
    let address = keypair.address(1);
    let unsigned = UnsignedAtom::new(
        vec![ParticleGroup::new(vec![SpunParticle::up(MessageParticle::new(
            address,
            address,
            b"x".to_vec(),
            1,
        ))])],
        1,
    );
    let atom = signed(&keypair, unsigned.clone());
    assert_eq!(dson::to_bytes(&atom, Output::Hash), dson::to_bytes(&unsigned, Output::Hash));
    assert_ne!(dson::to_bytes(&atom, Output::Wire), dson::to_bytes(&unsigned, Output::Wire));
}
