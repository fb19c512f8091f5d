//! Address-indexed atom store
//!
//! Every address keeps a replay log of the atoms it currently holds, a live
//! broadcast of every change and a sync marker set by the first head
//! observation. The replay log holds one entry per stored atom plus head
//! markers, never two markers in a row, so it is bounded by the number of
//! atoms the address holds. Particle liveness is tracked across all stored
//! atoms: a particle is up while some atom spins it up and no stored atom
//! spins it down.

use crate::atom::Atom;
use crate::network::actions::{AtomObservation, ObservationKind};
use crate::particles::{Particle, Spin};
use crate::primitives::{Euid, RadixAddress};
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

const LIVE_CAPACITY: usize = 256;

struct StoredAtom {
    atom: Atom,
    is_soft: bool,
}

struct AddressLog {
    /// Stored atoms keyed by id, and head markers (`None`).
    replay: Vec<(Option<Euid>, AtomObservation)>,
    live: broadcast::Sender<AtomObservation>,
    synced: watch::Sender<Option<DateTime<Utc>>>,
}

impl AddressLog {
    fn new() -> Self {
        let (live, _) = broadcast::channel(LIVE_CAPACITY);
        let (synced, _) = watch::channel(None);
        AddressLog {
            replay: Vec::new(),
            live,
            synced,
        }
    }

    fn mark_head(&mut self, received_at: DateTime<Utc>) {
        if !matches!(self.replay.last(), Some((None, _))) {
            self.replay.push((
                None,
                AtomObservation {
                    received_at,
                    ..AtomObservation::head()
                },
            ));
        }
    }

    fn publish(&mut self, id: Option<Euid>, observation: AtomObservation) {
        match (observation.kind, id) {
            (ObservationKind::Delete, Some(id)) => {
                self.replay.retain(|(entry, _)| *entry != Some(id));
                self.replay
                    .dedup_by(|later, earlier| later.0.is_none() && earlier.0.is_none());
                if observation.is_head {
                    self.mark_head(observation.received_at);
                }
            }
            (ObservationKind::Store, Some(id)) => {
                match self.replay.iter_mut().find(|(entry, _)| *entry == Some(id)) {
                    Some((_, existing)) => {
                        existing.is_soft = observation.is_soft;
                        existing.is_head |= observation.is_head;
                    }
                    None => self.replay.push((Some(id), observation.clone())),
                }
            }
            _ => self.mark_head(observation.received_at),
        }
        // No receivers is fine; the log replays for late subscribers.
        let _ = self.live.send(observation);
    }
}

#[derive(Default)]
struct Inner {
    atoms: HashMap<Euid, StoredAtom>,
    order: Vec<Euid>,
    ups: HashMap<Particle, HashSet<Euid>>,
    downs: HashMap<Particle, HashSet<Euid>>,
    addresses: HashMap<RadixAddress, AddressLog>,
}

impl Inner {
    fn log(&mut self, address: &RadixAddress) -> &mut AddressLog {
        self.addresses.entry(*address).or_insert_with(AddressLog::new)
    }

    /// Returns whether subscribers should see the observation.
    fn insert(&mut self, atom: &Atom, is_soft: bool) -> bool {
        let id = atom.hid();
        if let Some(existing) = self.atoms.get_mut(&id) {
            if existing.is_soft && !is_soft {
                existing.is_soft = false;
                return true;
            }
            return false;
        }
        for spun in atom.spun_particles() {
            let index = match spun.spin {
                Spin::Up => &mut self.ups,
                Spin::Down => &mut self.downs,
                Spin::Neutral => continue,
            };
            index.entry(spun.particle.clone()).or_default().insert(id);
        }
        self.atoms.insert(
            id,
            StoredAtom {
                atom: atom.clone(),
                is_soft,
            },
        );
        self.order.push(id);
        true
    }

    fn remove(&mut self, atom: &Atom) -> bool {
        let id = atom.hid();
        if self.atoms.remove(&id).is_none() {
            return false;
        }
        self.order.retain(|stored| *stored != id);
        for spun in atom.spun_particles() {
            let index = match spun.spin {
                Spin::Up => &mut self.ups,
                Spin::Down => &mut self.downs,
                Spin::Neutral => continue,
            };
            if let Some(ids) = index.get_mut(&spun.particle) {
                ids.remove(&id);
                if ids.is_empty() {
                    index.remove(&spun.particle);
                }
            }
        }
        true
    }

    fn is_live(&self, particle: &Particle) -> bool {
        self.ups.get(particle).is_some_and(|ids| !ids.is_empty())
            && !self.downs.get(particle).is_some_and(|ids| !ids.is_empty())
    }

    fn ordered(&self) -> impl Iterator<Item = &StoredAtom> {
        self.order.iter().filter_map(|id| self.atoms.get(id))
    }
}

/// In-memory atom store shared by the store reducer (the only writer) and
/// readers. Cloning shares the same store.
#[derive(Clone, Default)]
pub struct InMemoryAtomStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryAtomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an observation made by the subscription for `address`.
    pub fn store(&self, address: &RadixAddress, observation: AtomObservation) {
        let mut inner = self.inner.write();
        let changed = match (&observation.kind, &observation.atom) {
            (ObservationKind::Store, Some(atom)) => inner.insert(atom, observation.is_soft),
            (ObservationKind::Delete, Some(atom)) => inner.remove(atom),
            _ => false,
        };
        let is_head = observation.is_head;
        let received_at = observation.received_at;
        let target = observation
            .atom
            .as_ref()
            .filter(|_| changed)
            .map(|atom| (atom.hid(), atom.addresses()));
        match target {
            Some((id, concerned)) => {
                // The change is global; every address the atom concerns sees it.
                for other in concerned.into_iter().filter(|other| other != address) {
                    let shared = AtomObservation {
                        is_head: false,
                        ..observation.clone()
                    };
                    inner.log(&other).publish(Some(id), shared);
                }
                inner.log(address).publish(Some(id), observation);
            }
            None if is_head => inner.log(address).publish(
                None,
                AtomObservation {
                    received_at,
                    ..AtomObservation::head()
                },
            ),
            None => debug!(address = %address, "Skipping duplicate observation"),
        }
        let log = inner.log(address);
        if is_head && log.synced.borrow().is_none() {
            debug!(address = %address, at = %received_at, "Address synced");
            log.synced.send_replace(Some(received_at));
        }
    }

    /// Records an atom our own submission saw stored, for every address it
    /// concerns. Soft until a subscription confirms it.
    pub fn store_atom(&self, atom: &Atom) {
        if let Some(address) = atom.addresses().first() {
            self.store(address, AtomObservation::soft_stored(atom.clone()));
        }
    }

    /// Everything observed for `address` so far, then live updates.
    pub fn observe(&self, address: &RadixAddress) -> BoxStream<'static, AtomObservation> {
        let (replay, live) = {
            let mut inner = self.inner.write();
            let log = inner.log(address);
            let replay: Vec<AtomObservation> =
                log.replay.iter().map(|(_, observation)| observation.clone()).collect();
            (replay, log.live.subscribe())
        };
        let address = *address;
        let live = stream::unfold(live, move |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(observation) => return Some((observation, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(address = %address, skipped, "Atom observer lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        stream::iter(replay).chain(live).boxed()
    }

    /// Resolves once `address` has seen its first head observation. Every
    /// caller gets the same instant.
    pub async fn on_sync(&self, address: &RadixAddress) -> Option<DateTime<Utc>> {
        let mut rx = self.inner.write().log(address).synced.subscribe();
        let synced = rx.wait_for(Option::is_some).await.ok()?;
        *synced
    }

    pub fn synced_at(&self, address: &RadixAddress) -> Option<DateTime<Utc>> {
        self.inner
            .read()
            .addresses
            .get(address)
            .and_then(|log| *log.synced.borrow())
    }

    /// Stored atoms concerning `address`, in store order.
    pub fn atoms(&self, address: &RadixAddress) -> Vec<Atom> {
        self.inner
            .read()
            .ordered()
            .filter(|stored| stored.atom.addresses().contains(address))
            .map(|stored| stored.atom.clone())
            .collect()
    }

    pub fn all_atoms(&self) -> Vec<Atom> {
        self.inner.read().ordered().map(|stored| stored.atom.clone()).collect()
    }

    pub fn get(&self, id: &Euid) -> Option<Atom> {
        self.inner.read().atoms.get(id).map(|stored| stored.atom.clone())
    }

    pub fn is_soft(&self, id: &Euid) -> Option<bool> {
        self.inner.read().atoms.get(id).map(|stored| stored.is_soft)
    }

    pub fn len(&self) -> usize {
        self.inner.read().atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live particles concerning `address`, in the order their atoms were
    /// stored.
    pub fn up_particles(&self, address: &RadixAddress) -> Vec<Particle> {
        let inner = self.inner.read();
        let mut seen = HashSet::new();
        let mut particles = Vec::new();
        for stored in inner.ordered() {
            for particle in stored.atom.particles(Spin::Up) {
                if inner.is_live(particle)
                    && particle.addresses().contains(address)
                    && seen.insert(particle.clone())
                {
                    particles.push(particle.clone());
                }
            }
        }
        particles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::UnsignedAtom;
    use crate::chemistry::{CreateTokenAction, TransactionBuilder, TransferTokensAction, UserAction};
    use crate::crypto::KeyPair;
    use crate::particles::TokenSupplyType;
    use crate::primitives::{Rri, UInt256};
    use futures::FutureExt;
    use std::time::Duration;

    fn sign(keypair: &KeyPair, unsigned: UnsignedAtom) -> Atom {
        let signature = keypair.sign_hash(&unsigned.hash()).unwrap();
        unsigned.sign(&keypair.address(2), signature)
    }

    fn build(keypair: &KeyPair, up: Vec<Particle>, action: UserAction) -> Atom {
        let mut builder = TransactionBuilder::new(keypair.address(2), up);
        builder.stage(&action).unwrap();
        sign(keypair, builder.build(1))
    }

    fn create_token(keypair: &KeyPair, supply: u64) -> Atom {
        let action = CreateTokenAction::new(
            keypair.address(2),
            "Coin",
            "COIN",
            "",
            UInt256::from_u64(supply),
            UInt256::ONE,
            TokenSupplyType::Fixed,
        );
        build(keypair, vec![], action.into())
    }

    #[test]
    fn test_spent_particles_leave_up_set() {
        let keypair = KeyPair::generate();
        let a = keypair.address(2);
        let b = KeyPair::generate().address(2);
        let store = InMemoryAtomStore::new();

        let created = create_token(&keypair, 10);
        store.store(&a, AtomObservation::stored(created, false));
        let up = store.up_particles(&a);
        assert_eq!(up.iter().filter(|p| p.as_transferrable().is_some()).count(), 1);

        let token = Rri::new(a, "COIN").unwrap();
        let transfer = build(
            &keypair,
            up,
            TransferTokensAction::new(a, b, token, UInt256::from_u64(4)).into(),
        );
        store.store(&a, AtomObservation::stored(transfer.clone(), false));

        let coins: Vec<UInt256> = store
            .up_particles(&a)
            .iter()
            .filter_map(Particle::as_transferrable)
            .map(|t| t.amount())
            .collect();
        assert_eq!(coins, vec![UInt256::from_u64(6)]);
        assert_eq!(store.up_particles(&b).len(), 1);

        store.store(&a, AtomObservation::deleted(transfer, false));
        let coins: Vec<UInt256> = store
            .up_particles(&a)
            .iter()
            .filter_map(Particle::as_transferrable)
            .map(|t| t.amount())
            .collect();
        assert_eq!(coins, vec![UInt256::from_u64(10)]);
    }

    #[test]
    fn test_duplicate_store_is_skipped() {
        let keypair = KeyPair::generate();
        let a = keypair.address(2);
        let store = InMemoryAtomStore::new();
        let atom = create_token(&keypair, 5);
        store.store(&a, AtomObservation::stored(atom.clone(), false));
        store.store(&a, AtomObservation::stored(atom.clone(), false));
        assert_eq!(store.len(), 1);
        assert_eq!(store.atoms(&a), vec![atom]);
    }

    #[test]
    fn test_soft_atom_hardens() {
        let keypair = KeyPair::generate();
        let a = keypair.address(2);
        let store = InMemoryAtomStore::new();
        let atom = create_token(&keypair, 5);
        store.store_atom(&atom);
        assert_eq!(store.is_soft(&atom.hid()), Some(true));
        store.store(&a, AtomObservation::stored(atom.clone(), false));
        assert_eq!(store.is_soft(&atom.hid()), Some(false));
    }

    #[tokio::test]
    async fn test_observe_replays_then_streams() {
        tokio::time::timeout(Duration::from_secs(5), async {
            let keypair = KeyPair::generate();
            let a = keypair.address(2);
            let store = InMemoryAtomStore::new();
            let first = create_token(&keypair, 1);
            let second = create_token(&keypair, 2);
            store.store(&a, AtomObservation::stored(first.clone(), false));

            let mut observations = store.observe(&a);
            store.store(&a, AtomObservation::stored(second.clone(), true));

            let replayed = observations.next().await.unwrap();
            assert_eq!(replayed.atom, Some(first));
            let live = observations.next().await.unwrap();
            assert_eq!(live.atom, Some(second));
            assert!(live.is_head);
        })
        .await
        .expect("Test timed out");
    }

    #[tokio::test]
    async fn test_replay_holds_one_entry_per_atom() {
        tokio::time::timeout(Duration::from_secs(5), async {
            let keypair = KeyPair::generate();
            let a = keypair.address(2);
            let store = InMemoryAtomStore::new();
            let atom = create_token(&keypair, 5);

            store.store_atom(&atom);
            store.store(&a, AtomObservation::stored(atom.clone(), false));
            store.store(&a, AtomObservation::stored(atom.clone(), false));
            for _ in 0..3 {
                store.store(&a, AtomObservation::head());
            }

            let mut observations = store.observe(&a);
            let stored = observations.next().await.unwrap();
            assert_eq!(stored.atom, Some(atom.clone()));
            assert!(!stored.is_soft);
            assert_eq!(observations.next().await.unwrap().kind, ObservationKind::Head);
            assert!(observations.next().now_or_never().is_none());

            store.store(&a, AtomObservation::deleted(atom, false));
            let mut after_delete = store.observe(&a);
            assert_eq!(after_delete.next().await.unwrap().kind, ObservationKind::Head);
            assert!(after_delete.next().now_or_never().is_none());
        })
        .await
        .expect("Test timed out");
    }

    #[tokio::test]
    async fn test_delete_reaches_every_concerned_address() {
        tokio::time::timeout(Duration::from_secs(5), async {
            let keypair = KeyPair::generate();
            let a = keypair.address(2);
            let b = KeyPair::generate().address(2);
            let store = InMemoryAtomStore::new();
            let created = create_token(&keypair, 10);
            store.store(&a, AtomObservation::stored(created, false));

            let token = Rri::new(a, "COIN").unwrap();
            let transfer = build(
                &keypair,
                store.up_particles(&a),
                TransferTokensAction::new(a, b, token, UInt256::from_u64(4)).into(),
            );
            let mut at_b = store.observe(&b);
            store.store(&a, AtomObservation::stored(transfer.clone(), false));
            let seen = at_b.next().await.unwrap();
            assert_eq!(seen.kind, ObservationKind::Store);
            assert_eq!(seen.atom, Some(transfer.clone()));

            store.store(&a, AtomObservation::deleted(transfer.clone(), false));
            let removed = at_b.next().await.unwrap();
            assert_eq!(removed.kind, ObservationKind::Delete);
            assert_eq!(removed.atom, Some(transfer));
            assert!(store.atoms(&b).is_empty());
            assert!(store.observe(&b).next().now_or_never().is_none());
        })
        .await
        .expect("Test timed out");
    }

    #[tokio::test]
    async fn test_on_sync_shares_one_instant() {
        tokio::time::timeout(Duration::from_secs(5), async {
            let a = KeyPair::generate().address(2);
            let store = InMemoryAtomStore::new();
            let early = {
                let store = store.clone();
                tokio::spawn(async move { store.on_sync(&a).await })
            };
            tokio::task::yield_now().await;

            let head = AtomObservation::head();
            let expected = head.received_at;
            store.store(&a, head);
            // A second head must not move the marker.
            store.store(&a, AtomObservation::head());

            assert_eq!(early.await.unwrap(), Some(expected));
            assert_eq!(store.on_sync(&a).await, Some(expected));
            assert_eq!(store.synced_at(&a), Some(expected));
        })
        .await
        .expect("Test timed out");
    }
}
