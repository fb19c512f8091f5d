use super::atom_store::InMemoryAtomStore;
use crate::network::actions::NodeAction;
use crate::network::atom_status::AtomStatus;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

/// Folds fetch observations and our own stored submissions into the atom
/// store. The only writer of the store.
#[derive(Clone)]
pub struct InMemoryAtomStoreReducer {
    store: InMemoryAtomStore,
}

impl InMemoryAtomStoreReducer {
    pub fn new(store: InMemoryAtomStore) -> Self {
        InMemoryAtomStoreReducer { store }
    }

    pub fn store(&self) -> &InMemoryAtomStore {
        &self.store
    }

    pub fn reduce(&self, action: &NodeAction) {
        match action {
            NodeAction::FetchAtomsObservation {
                address,
                observation,
                ..
            } => self.store.store(address, observation.clone()),
            NodeAction::SubmitAtomStatus {
                atom,
                status: AtomStatus::Stored,
                ..
            } => self.store.store_atom(atom),
            _ => {}
        }
    }

    /// Runs the reducer over the action bus until `cancel` fires or the bus
    /// closes.
    pub fn spawn(self, mut actions: broadcast::Receiver<NodeAction>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = actions.recv() => match received {
                        Ok(action) => self.reduce(&action),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(lagged = n, "Atom store reducer lagged behind the action bus");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            trace!("Atom store reducer stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::{Atom, UnsignedAtom};
    use crate::crypto::KeyPair;
    use crate::network::actions::AtomObservation;
    use crate::network::node::RadixNode;
    use crate::particles::{MessageParticle, ParticleGroup, SpunParticle};
    use std::time::Duration;
    use uuid::Uuid;

    fn message_atom(keypair: &KeyPair) -> Atom {
        let address = keypair.address(3);
        let message = MessageParticle::new(address, address, b"hello".to_vec(), 7);
        let unsigned = UnsignedAtom::new(vec![ParticleGroup::new(vec![SpunParticle::up(message)])], 1);
        let signature = keypair.sign_hash(&unsigned.hash()).unwrap();
        unsigned.sign(&address, signature)
    }

    #[test]
    fn test_only_stored_status_reaches_store() {
        let keypair = KeyPair::generate();
        let atom = message_atom(&keypair);
        let reducer = InMemoryAtomStoreReducer::new(InMemoryAtomStore::new());
        let status = |status| NodeAction::SubmitAtomStatus {
            uuid: Uuid::new_v4(),
            atom: atom.clone(),
            node: RadixNode::new("n", 1, false),
            status,
            data: None,
        };

        reducer.reduce(&status(AtomStatus::PendingConstraintMachineVerification));
        assert!(reducer.store().is_empty());
        reducer.reduce(&status(AtomStatus::Stored));
        assert_eq!(reducer.store().is_soft(&atom.hid()), Some(true));
    }

    #[tokio::test]
    async fn test_spawned_reducer_folds_observations() {
        tokio::time::timeout(Duration::from_secs(5), async {
            let keypair = KeyPair::generate();
            let atom = message_atom(&keypair);
            let address = keypair.address(3);
            let store = InMemoryAtomStore::new();
            let (tx, rx) = broadcast::channel(16);
            let cancel = CancellationToken::new();
            let task = InMemoryAtomStoreReducer::new(store.clone()).spawn(rx, cancel.clone());

            tx.send(NodeAction::FetchAtomsObservation {
                uuid: Uuid::new_v4(),
                address,
                node: RadixNode::new("n", 1, false),
                observation: AtomObservation::stored(atom.clone(), true),
            })
            .unwrap();

            assert!(store.on_sync(&address).await.is_some());
            assert_eq!(store.atoms(&address), vec![atom]);
            cancel.cancel();
            task.await.unwrap();
        })
        .await
        .expect("Test timed out");
    }
}
