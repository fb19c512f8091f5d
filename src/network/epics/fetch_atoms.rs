use super::{Epic, EpicContext};
use crate::atom::Atom;
use crate::dson;
use crate::network::actions::{AtomObservation, NodeAction};
use crate::network::jsonrpc::parse_atoms_update;
use crate::network::node::RadixNode;
use crate::primitives::RadixAddress;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

const RETRY_BASE: Duration = Duration::from_millis(500);
const RETRY_MAX: Duration = Duration::from_secs(30);

struct Entry {
    address: RadixAddress,
    cancel: CancellationToken,
    node: Option<RadixNode>,
    /// Consecutive failed attempts, reset once a subscription is accepted.
    failures: u32,
}

/// Keeps an atom subscription per fetch request. If subscribing fails or the
/// node goes away, the request goes back to node finding after a backoff.
pub struct FetchAtomsEpic {
    requests: Arc<Mutex<HashMap<Uuid, Entry>>>,
}

impl FetchAtomsEpic {
    pub fn new() -> Self {
        FetchAtomsEpic {
            requests: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for FetchAtomsEpic {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts one update push into observations; only the last carries the
/// head flag.
pub(crate) fn observations_from_update(params: &serde_json::Value) -> Vec<AtomObservation> {
    let update = match parse_atoms_update(params) {
        Ok(update) => update,
        Err(e) => {
            warn!(error = %e, "Ignoring bad atoms update");
            return Vec::new();
        }
    };
    let mut observations = Vec::with_capacity(update.events.len().max(1));
    for (kind, json) in &update.events {
        let atom: Atom = match dson::from_json(json) {
            Ok(atom) => atom,
            Err(e) => {
                warn!(error = %e, "Ignoring undecodable atom");
                continue;
            }
        };
        match kind.as_str() {
            "store" => observations.push(AtomObservation::stored(atom, false)),
            "delete" => observations.push(AtomObservation::deleted(atom, false)),
            other => debug!(kind = other, "Ignoring atom event type"),
        }
    }
    if update.is_head {
        match observations.last_mut() {
            Some(last) => last.is_head = true,
            None => observations.push(AtomObservation::head()),
        }
    }
    observations
}

/// How a subscription attempt ended.
enum Ended {
    Cancelled,
    /// Connecting or subscribing failed.
    Failed,
    /// The socket went away after subscribing.
    Lost,
}

fn retry_delay(attempt: u32) -> Duration {
    let doublings = attempt.saturating_sub(1).min(6);
    RETRY_BASE.saturating_mul(1 << doublings).min(RETRY_MAX)
}

async fn run_subscription(
    uuid: Uuid,
    address: RadixAddress,
    node: RadixNode,
    cancel: CancellationToken,
    requests: Arc<Mutex<HashMap<Uuid, Entry>>>,
    ctx: EpicContext,
) {
    let ended = follow(uuid, address, &node, &cancel, &requests, &ctx).await;
    if matches!(ended, Ended::Cancelled) {
        return;
    }

    // Still wanted: route the request again once the backoff has passed.
    let attempt = match requests.lock().get_mut(&uuid) {
        Some(entry) => {
            entry.node = None;
            entry.failures += 1;
            entry.failures
        }
        None => return,
    };
    let delay = retry_delay(attempt);
    match ended {
        Ended::Lost => warn!(uuid = %uuid, node = %node, "Atom subscription lost, finding another node"),
        _ => warn!(uuid = %uuid, node = %node, attempt, delay = ?delay, "Atom subscription failed, retrying"),
    }
    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = ctx.cancel.cancelled() => return,
        _ = tokio::time::sleep(delay) => {}
    }
    if requests.lock().contains_key(&uuid) {
        ctx.dispatch(NodeAction::FindANodeRequest { uuid });
    }
}

async fn follow(
    uuid: Uuid,
    address: RadixAddress,
    node: &RadixNode,
    cancel: &CancellationToken,
    requests: &Mutex<HashMap<Uuid, Entry>>,
    ctx: &EpicContext,
) -> Ended {
    let _lease = ctx.websockets.lease(node);
    let subscriber_id = uuid.to_string();
    let client = match ctx.websockets.connect(node).await {
        Ok(client) => client,
        Err(e) => {
            ctx.dispatch(NodeAction::RpcFailure {
                node: node.clone(),
                method: "Atoms.subscribe".to_string(),
                reason: e.to_string(),
            });
            return Ended::Failed;
        }
    };
    let mut updates = match client.observe_atoms(&subscriber_id, &address).await {
        Ok(rx) => rx,
        Err(e) => {
            warn!(uuid = %uuid, node = %node, error = %e, "Atom subscription failed");
            ctx.dispatch(NodeAction::RpcFailure {
                node: node.clone(),
                method: "Atoms.subscribe".to_string(),
                reason: e.to_string(),
            });
            return Ended::Failed;
        }
    };
    if let Some(entry) = requests.lock().get_mut(&uuid) {
        entry.failures = 0;
    }
    info!(uuid = %uuid, address = %address, node = %node, "Subscribed to atoms");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                if let Err(e) = client.cancel_atoms_subscribe(&subscriber_id).await {
                    debug!(uuid = %uuid, error = %e, "Atoms.cancel failed");
                }
                return Ended::Cancelled;
            }
            _ = ctx.cancel.cancelled() => return Ended::Cancelled,
            pushed = updates.recv() => {
                let Some(params) = pushed else { return Ended::Lost };
                for observation in observations_from_update(&params) {
                    ctx.dispatch(NodeAction::FetchAtomsObservation {
                        uuid,
                        address,
                        node: node.clone(),
                        observation,
                    });
                }
            }
        }
    }
}

#[async_trait]
impl Epic for FetchAtomsEpic {
    fn name(&self) -> &'static str {
        "fetch-atoms"
    }

    async fn handle(&self, action: &NodeAction, ctx: &EpicContext) {
        match action {
            NodeAction::FetchAtomsRequest { uuid, address } => {
                self.requests.lock().insert(
                    *uuid,
                    Entry {
                        address: *address,
                        cancel: CancellationToken::new(),
                        node: None,
                        failures: 0,
                    },
                );
                ctx.dispatch(NodeAction::FindANodeRequest { uuid: *uuid });
            }
            NodeAction::FindANodeResult { uuid, node } => {
                let address = {
                    let mut requests = self.requests.lock();
                    match requests.get_mut(uuid) {
                        Some(entry) if entry.node.is_none() => {
                            entry.node = Some(node.clone());
                            entry.address
                        }
                        _ => return,
                    }
                };
                ctx.dispatch(NodeAction::FetchAtomsSubscribe {
                    uuid: *uuid,
                    address,
                    node: node.clone(),
                });
            }
            NodeAction::FetchAtomsSubscribe { uuid, address, node } => {
                let Some(cancel) = self.requests.lock().get(uuid).map(|e| e.cancel.clone()) else {
                    return;
                };
                tokio::spawn(run_subscription(
                    *uuid,
                    *address,
                    node.clone(),
                    cancel,
                    self.requests.clone(),
                    ctx.clone(),
                ));
            }
            NodeAction::FetchAtomsCancel { uuid, .. } => {
                if let Some(entry) = self.requests.lock().remove(uuid) {
                    entry.cancel.cancel();
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::UnsignedAtom;
    use crate::crypto::KeyPair;
    use crate::dson::Output;
    use crate::network::actions::ObservationKind;
    use crate::particles::{MessageParticle, ParticleGroup, SpunParticle};
    use serde_json::json;

    fn atom() -> Atom {
        let keypair = KeyPair::generate();
        let address = keypair.address(1);
        let message = MessageParticle::new(address, address, b"hi".to_vec(), 1);
        let unsigned = UnsignedAtom::new(vec![ParticleGroup::new(vec![SpunParticle::up(message)])], 1);
        let signature = keypair.sign_hash(&unsigned.hash()).unwrap();
        unsigned.sign(&address, signature)
    }

    #[test]
    fn test_head_flag_lands_on_last_observation() {
        let a = atom();
        let json = dson::to_json(&a, Output::Wire);
        let params = json!({
            "subscriberId": "s",
            "isHead": true,
            "atomEvents": [{"type": "store", "atom": json}, {"type": "delete", "atom": json}],
        });
        let observations = observations_from_update(&params);
        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].kind, ObservationKind::Store);
        assert!(!observations[0].is_head);
        assert_eq!(observations[1].kind, ObservationKind::Delete);
        assert!(observations[1].is_head);
        assert_eq!(observations[0].atom.as_ref().unwrap().hid(), a.hid());
    }

    #[test]
    fn test_empty_head_update() {
        let observations = observations_from_update(&json!({"subscriberId": "s", "isHead": true}));
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].kind, ObservationKind::Head);
    }

    #[test]
    fn test_retry_delay_backs_off_to_cap() {
        assert_eq!(retry_delay(1), Duration::from_millis(500));
        assert_eq!(retry_delay(2), Duration::from_secs(1));
        assert_eq!(retry_delay(4), Duration::from_secs(4));
        assert_eq!(retry_delay(7), RETRY_MAX);
        assert_eq!(retry_delay(u32::MAX), RETRY_MAX);
    }
}
