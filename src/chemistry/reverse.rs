//! Atom → executed actions, for transaction history
//!
//! A mutable token created with an initial supply and one created empty and
//! minted later in the same atom look identical on the ledger; both come back
//! as a `CreateToken` whose initial supply is the amount minted in that atom.

use super::mappers::{APPLICATION_ATTACHMENT, APPLICATION_KEY};
use crate::atom::Atom;
use crate::particles::{
    MessageParticle, Particle, ParticleGroup, Spin, TokenSupply, TokenSupplyType,
};
use crate::primitives::{Euid, RadixAddress, Rri, UInt256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutedAction {
    TokenTransfer {
        from: RadixAddress,
        to: RadixAddress,
        token: Rri,
        amount: UInt256,
        attachment: Option<Vec<u8>>,
    },
    CreateToken {
        creator: RadixAddress,
        token: Rri,
        name: String,
        description: String,
        granularity: UInt256,
        supply_type: TokenSupplyType,
        initial_supply: UInt256,
        icon_url: Option<String>,
    },
    MintTokens {
        address: RadixAddress,
        token: Rri,
        amount: UInt256,
    },
    BurnTokens {
        address: RadixAddress,
        token: Rri,
        amount: UInt256,
    },
    SendMessage {
        from: RadixAddress,
        to: RadixAddress,
        data: Vec<u8>,
    },
    PutUniqueId {
        address: RadixAddress,
        rri: Rri,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedTransaction {
    pub atom_id: Euid,
    pub timestamp: Option<i64>,
    pub message: Option<String>,
    pub actions: Vec<ExecutedAction>,
}

impl ExecutedTransaction {
    /// Actions involving `address` as sender, recipient or actor.
    pub fn involving<'a>(&'a self, address: &'a RadixAddress) -> impl Iterator<Item = &'a ExecutedAction> {
        self.actions.iter().filter(move |action| match action {
            ExecutedAction::TokenTransfer { from, to, .. } => from == address || to == address,
            ExecutedAction::SendMessage { from, to, .. } => from == address || to == address,
            ExecutedAction::CreateToken { creator, .. } => creator == address,
            ExecutedAction::MintTokens { address: a, .. } => a == address,
            ExecutedAction::BurnTokens { address: a, .. } => a == address,
            ExecutedAction::PutUniqueId { address: a, .. } => a == address,
        })
    }
}

pub struct AtomToExecutedActions;

impl AtomToExecutedActions {
    pub fn map(atom: &Atom) -> ExecutedTransaction {
        let mut actions = Vec::new();
        for group in atom.particle_groups() {
            map_group(group, &mut actions);
        }
        ExecutedTransaction {
            atom_id: atom.hid(),
            timestamp: atom.timestamp(),
            message: atom.unsigned().metadata().get("message").cloned(),
            actions,
        }
    }
}

fn sum<'a>(amounts: impl Iterator<Item = UInt256> + 'a) -> UInt256 {
    amounts.fold(UInt256::ZERO, |acc, a| acc.checked_add(&a).unwrap_or(UInt256::MAX))
}

fn is_attachment(message: &MessageParticle) -> bool {
    message.metadata().get(APPLICATION_KEY).map(String::as_str) == Some(APPLICATION_ATTACHMENT)
}

fn map_group(group: &ParticleGroup, actions: &mut Vec<ExecutedAction>) {
    let downs: Vec<&Particle> = group.with_spin(Spin::Down).collect();
    let ups: Vec<&Particle> = group.with_spin(Spin::Up).collect();

    if let Some(definition) = ups.iter().find_map(|p| p.as_token_definition()) {
        let (supply_type, initial_supply) = match definition.supply() {
            TokenSupply::Fixed(supply) => (TokenSupplyType::Fixed, *supply),
            TokenSupply::Mutable(_) => (TokenSupplyType::Mutable, UInt256::ZERO),
        };
        actions.push(ExecutedAction::CreateToken {
            creator: *definition.owner(),
            token: definition.rri().clone(),
            name: definition.name().to_string(),
            description: definition.description().to_string(),
            granularity: definition.granularity(),
            supply_type,
            initial_supply,
            icon_url: definition.icon_url().map(str::to_string),
        });
        return;
    }

    let down_unallocated: Vec<_> = downs.iter().filter_map(|p| p.as_unallocated()).collect();
    let down_transferrable: Vec<_> = downs.iter().filter_map(|p| p.as_transferrable()).collect();
    let up_unallocated: Vec<_> = ups.iter().filter_map(|p| p.as_unallocated()).collect();
    let up_transferrable: Vec<_> = ups.iter().filter_map(|p| p.as_transferrable()).collect();

    if let Some(pool) = down_unallocated.first() {
        let token = pool.token().clone();
        let amount = sum(up_transferrable.iter().map(|t| t.amount()));
        let Some(recipient) = up_transferrable.first().map(|t| *t.address()) else {
            return;
        };
        // Mint in the atom that created the token folds into its initial supply.
        let created_here = actions.iter_mut().find_map(|action| match action {
            ExecutedAction::CreateToken {
                token: t,
                supply_type: TokenSupplyType::Mutable,
                initial_supply,
                ..
            } if *t == token => Some(initial_supply),
            _ => None,
        });
        match created_here {
            Some(initial_supply) => {
                *initial_supply = initial_supply.checked_add(&amount).unwrap_or(UInt256::MAX)
            }
            None => actions.push(ExecutedAction::MintTokens {
                address: recipient,
                token,
                amount,
            }),
        }
    } else if let Some(first) = down_transferrable.first() {
        let from = *first.address();
        let token = first.token().clone();
        if !up_unallocated.is_empty() {
            actions.push(ExecutedAction::BurnTokens {
                address: from,
                token,
                amount: sum(up_unallocated.iter().map(|u| u.amount())),
            });
        } else {
            let attachment = ups.iter().find_map(|p| match p {
                Particle::Message(m) if is_attachment(m) => Some(m.data().to_vec()),
                _ => None,
            });
            let mut recipients: Vec<(RadixAddress, UInt256)> = Vec::new();
            for output in up_transferrable.iter().filter(|t| t.address() != &from) {
                match recipients.iter_mut().find(|(addr, _)| addr == output.address()) {
                    Some((_, total)) => {
                        *total = total.checked_add(&output.amount()).unwrap_or(UInt256::MAX)
                    }
                    None => recipients.push((*output.address(), output.amount())),
                }
            }
            if recipients.is_empty() {
                // Each consumed input yields one output in order; change, if
                // any, is the single output after them.
                let inputs = down_transferrable.iter().filter(|t| !t.amount().is_zero()).count();
                let moved = sum(up_transferrable.iter().take(inputs).map(|t| t.amount()));
                recipients.push((from, moved));
            }
            for (to, amount) in recipients {
                actions.push(ExecutedAction::TokenTransfer {
                    from,
                    to,
                    token: token.clone(),
                    amount,
                    attachment: attachment.clone(),
                });
            }
        }
    }

    for particle in &ups {
        match particle {
            Particle::Message(m) if !is_attachment(m) => actions.push(ExecutedAction::SendMessage {
                from: *m.from(),
                to: *m.to(),
                data: m.data().to_vec(),
            }),
            Particle::Unique(u) => actions.push(ExecutedAction::PutUniqueId {
                address: *u.address(),
                rri: u.rri().clone(),
            }),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::UnsignedAtom;
    use crate::chemistry::actions::{
        BurnTokensAction, CreateTokenAction, MintTokensAction, PutUniqueIdAction,
        SendMessageAction, TransferTokensAction, UserAction,
    };
    use crate::chemistry::builder::TransactionBuilder;
    use crate::crypto::KeyPair;

    fn build(active: RadixAddress, up: Vec<Particle>, actions: &[UserAction]) -> (Atom, Vec<Particle>) {
        let keypair = KeyPair::generate();
        let mut builder = TransactionBuilder::new(active, up);
        builder.stage_all(actions).unwrap();
        let remaining = builder.up_particles().to_vec();
        let unsigned: UnsignedAtom = builder.build(1);
        let signature = keypair.sign_hash(&unsigned.hash()).unwrap();
        (unsigned.sign(&active, signature), remaining)
    }

    fn mutable(creator: RadixAddress, supply: u64) -> UserAction {
        CreateTokenAction::new(
            creator,
            "Mutable",
            "MUT",
            "",
            UInt256::from_u64(supply),
            UInt256::ONE,
            TokenSupplyType::Mutable,
        )
        .into()
    }

    #[test]
    fn test_transfer_excludes_change() {
        let a = KeyPair::generate().address(2);
        let b = KeyPair::generate().address(2);
        let token = Rri::new(a, "MUT").unwrap();
        let (_, up) = build(a, vec![], &[mutable(a, 10)]);
        let (atom, _) = build(
            a,
            up,
            &[TransferTokensAction::new(a, b, token.clone(), UInt256::from_u64(4))
                .with_attachment(b"for you".to_vec())
                .into()],
        );
        let executed = AtomToExecutedActions::map(&atom);
        assert_eq!(
            executed.actions,
            vec![ExecutedAction::TokenTransfer {
                from: a,
                to: b,
                token,
                amount: UInt256::from_u64(4),
                attachment: Some(b"for you".to_vec()),
            }]
        );
        assert_eq!(executed.atom_id, atom.hid());
    }

    #[test]
    fn test_self_transfer_reports_moved_amount() {
        let a = KeyPair::generate().address(2);
        let token = Rri::new(a, "MUT").unwrap();
        let transfer = |amount: u64| -> UserAction {
            TransferTokensAction::new(a, a, token.clone(), UInt256::from_u64(amount)).into()
        };
        let (_, up) = build(a, vec![], &[mutable(a, 10)]);

        let (partial, up) = build(a, up, &[transfer(4)]);
        let amounts = |atom: &Atom| -> Vec<UInt256> {
            AtomToExecutedActions::map(atom)
                .actions
                .iter()
                .filter_map(|action| match action {
                    ExecutedAction::TokenTransfer { from, to, amount, .. } if from == &a && to == &a => {
                        Some(*amount)
                    }
                    _ => None,
                })
                .collect()
        };
        assert_eq!(amounts(&partial), vec![UInt256::from_u64(4)]);

        // Both coins consumed whole: no change output.
        let (whole, _) = build(a, up, &[transfer(10)]);
        assert_eq!(amounts(&whole), vec![UInt256::from_u64(10)]);
    }

    #[test]
    fn test_initial_supply_and_later_mint_collapse() {
        let a = KeyPair::generate().address(2);
        let (with_supply, _) = build(a, vec![], &[mutable(a, 25)]);
        let (created_then_minted, _) = build(
            a,
            vec![],
            &[
                mutable(a, 0),
                MintTokensAction {
                    address: a,
                    token: Rri::new(a, "MUT").unwrap(),
                    amount: UInt256::from_u64(25),
                }
                .into(),
            ],
        );
        let first = AtomToExecutedActions::map(&with_supply).actions;
        let second = AtomToExecutedActions::map(&created_then_minted).actions;
        assert_eq!(first, second);
        assert!(matches!(
            &first[0],
            ExecutedAction::CreateToken { initial_supply, .. } if *initial_supply == UInt256::from_u64(25)
        ));
    }

    #[test]
    fn test_mint_burn_message_unique() {
        let a = KeyPair::generate().address(2);
        let b = KeyPair::generate().address(2);
        let token = Rri::new(a, "MUT").unwrap();
        let (_, up) = build(a, vec![], &[mutable(a, 0)]);
        let (atom, _) = build(
            a,
            up,
            &[
                MintTokensAction {
                    address: a,
                    token: token.clone(),
                    amount: UInt256::from_u64(9),
                }
                .into(),
                BurnTokensAction {
                    address: a,
                    token: token.clone(),
                    amount: UInt256::from_u64(2),
                }
                .into(),
                SendMessageAction {
                    from: a,
                    to: b,
                    data: b"hey".to_vec(),
                }
                .into(),
                PutUniqueIdAction {
                    address: a,
                    unique: "handle".to_string(),
                }
                .into(),
            ],
        );
        let actions = AtomToExecutedActions::map(&atom).actions;
        assert_eq!(actions.len(), 4);
        assert_eq!(
            actions[0],
            ExecutedAction::MintTokens {
                address: a,
                token: token.clone(),
                amount: UInt256::from_u64(9)
            }
        );
        assert_eq!(
            actions[1],
            ExecutedAction::BurnTokens {
                address: a,
                token,
                amount: UInt256::from_u64(2)
            }
        );
        assert!(matches!(actions[2], ExecutedAction::SendMessage { .. }));
        assert!(matches!(actions[3], ExecutedAction::PutUniqueId { .. }));
    }
}
