//! The client context
//!
//! [`RadixClient`] is constructed explicitly and owns everything a wallet
//! needs: the configuration, the signing identity, a running network engine
//! and the atom store fed by it. Several clients may live in one process.

use crate::atom::{Atom, UnsignedAtom};
use crate::chemistry::{AtomToExecutedActions, ExecutedTransaction, TransactionBuilder, UserAction};
use crate::config::ClientConfig;
use crate::crypto::RadixIdentity;
use crate::error::{RadixError, Result, SubmissionError};
use crate::network::actions::{AtomObservation, NodeAction};
use crate::network::atom_status::AtomStatus;
use crate::network::controller::{EngineSettings, RadixNetworkController};
use crate::network::epics::ActionDispatcher;
use crate::network::node::RadixNode;
use crate::network::state::RadixNetworkState;
use crate::network::transport::{HttpClient, ReqwestHttpClient, TungsteniteConnector, WebSocketConnector};
use crate::particles::Particle;
use crate::primitives::{Euid, RadixAddress, Rri, UInt256};
use crate::signing::finalize;
use crate::store::{InMemoryAtomStore, InMemoryAtomStoreReducer, TokenBalanceState, TokenDefinitionsState};
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct RadixClient {
    config: ClientConfig,
    identity: Arc<dyn RadixIdentity>,
    address: RadixAddress,
    controller: RadixNetworkController,
    store: InMemoryAtomStore,
    reducer_cancel: CancellationToken,
    reducer_task: Mutex<Option<JoinHandle<()>>>,
}

impl RadixClient {
    /// Connects over WebSockets and HTTP. Must be called within a tokio
    /// runtime.
    pub fn connect(config: ClientConfig, identity: Arc<dyn RadixIdentity>) -> Result<Self> {
        let settings = EngineSettings::from_config(&config)?;
        let http = ReqwestHttpClient::new(settings.rpc_timeout)?;
        Self::with_transports(
            config,
            identity,
            Arc::new(TungsteniteConnector::new()),
            Arc::new(http),
        )
    }

    pub fn with_transports(
        config: ClientConfig,
        identity: Arc<dyn RadixIdentity>,
        connector: Arc<dyn WebSocketConnector>,
        http: Arc<dyn HttpClient>,
    ) -> Result<Self> {
        config.validate()?;
        let settings = EngineSettings::from_config(&config)?;
        let controller = RadixNetworkController::spawn(settings, connector, http);
        let store = InMemoryAtomStore::new();
        let reducer_cancel = CancellationToken::new();
        let reducer_task = InMemoryAtomStoreReducer::new(store.clone())
            .spawn(controller.observe_actions(), reducer_cancel.clone());
        let address = identity.address(config.universe.magic);
        info!(address = %address, universe = %config.universe.name, "Radix client started");
        Ok(RadixClient {
            config,
            identity,
            address,
            controller,
            store,
            reducer_cancel,
            reducer_task: Mutex::new(Some(reducer_task)),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn address(&self) -> RadixAddress {
        self.address
    }

    pub fn controller(&self) -> &RadixNetworkController {
        &self.controller
    }

    pub fn store(&self) -> &InMemoryAtomStore {
        &self.store
    }

    /// Starts following `address`. The subscription lasts until the handle
    /// is cancelled or dropped.
    pub fn pull(&self, address: &RadixAddress) -> Result<AtomPull> {
        let uuid = Uuid::new_v4();
        self.controller.dispatch(NodeAction::FetchAtomsRequest {
            uuid,
            address: *address,
        })?;
        debug!(uuid = %uuid, address = %address, "Pulling atoms");
        Ok(AtomPull {
            uuid,
            address: *address,
            dispatcher: self.controller.dispatcher(),
            cancelled: AtomicBool::new(false),
        })
    }

    /// Stages `actions` against the store's current up particles.
    pub fn build_atom(&self, actions: &[UserAction]) -> Result<UnsignedAtom> {
        let mut addresses: Vec<RadixAddress> = Vec::new();
        for action in actions {
            for address in action.required_state() {
                if !addresses.contains(&address) {
                    addresses.push(address);
                }
            }
        }
        let mut seen = HashSet::new();
        let up: Vec<Particle> = addresses
            .iter()
            .flat_map(|address| self.store.up_particles(address))
            .filter(|particle| seen.insert(particle.clone()))
            .collect();

        let mut builder = TransactionBuilder::new(self.address, up);
        builder.stage_all(actions)?;
        Ok(builder.build_now())
    }

    /// Proof-of-work, signature, then submission, in the background.
    pub fn submit(&self, atom: UnsignedAtom) -> Submission {
        let uuid = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (updates_tx, updates) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_submission(SubmissionTask {
            uuid,
            atom,
            identity: self.identity.clone(),
            magic: self.config.universe.magic,
            leading_zeros: self.config.pow.leading_zeros,
            dispatcher: self.controller.dispatcher(),
            actions: self.controller.observe_actions(),
            cancel: cancel.clone(),
            updates: updates_tx,
        }));
        Submission {
            uuid,
            cancel,
            updates,
            task,
        }
    }

    pub fn execute(&self, actions: &[UserAction]) -> Result<Submission> {
        Ok(self.submit(self.build_atom(actions)?))
    }

    pub fn balances(&self, address: &RadixAddress) -> Result<BTreeMap<Rri, UInt256>> {
        let up = self.store.up_particles(address);
        Ok(TokenBalanceState::from_up_particles(&up)?.balances(address))
    }

    pub fn balance(&self, address: &RadixAddress, token: &Rri) -> Result<UInt256> {
        Ok(self.balances(address)?.get(token).copied().unwrap_or(UInt256::ZERO))
    }

    pub fn token_definitions(&self) -> Result<TokenDefinitionsState> {
        Ok(TokenDefinitionsState::from_atoms(&self.store.all_atoms())?)
    }

    pub fn observe_atoms(&self, address: &RadixAddress) -> BoxStream<'static, AtomObservation> {
        self.store.observe(address)
    }

    pub async fn on_sync(&self, address: &RadixAddress) -> Option<DateTime<Utc>> {
        self.store.on_sync(address).await
    }

    pub fn transaction_history(&self, address: &RadixAddress) -> Vec<ExecutedTransaction> {
        self.store
            .atoms(address)
            .iter()
            .map(AtomToExecutedActions::map)
            .collect()
    }

    pub fn network_state(&self) -> RadixNetworkState {
        self.controller.state()
    }

    pub async fn shutdown(&self) {
        self.controller.shutdown().await;
        self.reducer_cancel.cancel();
        let task = self.reducer_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        info!(address = %self.address, "Radix client stopped");
    }
}

impl Drop for RadixClient {
    fn drop(&mut self) {
        self.reducer_cancel.cancel();
    }
}

/// An active atom subscription for one address.
#[must_use = "dropping the handle cancels the subscription"]
pub struct AtomPull {
    uuid: Uuid,
    address: RadixAddress,
    dispatcher: ActionDispatcher,
    cancelled: AtomicBool,
}

impl AtomPull {
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn address(&self) -> &RadixAddress {
        &self.address
    }

    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.dispatcher.dispatch(NodeAction::FetchAtomsCancel {
                uuid: self.uuid,
                address: self.address,
            });
        }
    }
}

impl Drop for AtomPull {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionUpdate {
    /// Proof-of-work found and the atom signed.
    Signed { atom_id: Euid },
    Status {
        node: RadixNode,
        status: AtomStatus,
        data: Option<serde_json::Value>,
    },
}

/// A submission in flight. Updates arrive in order; the completion resolves
/// once with the stored atom or the reason it was not stored.
pub struct Submission {
    uuid: Uuid,
    cancel: CancellationToken,
    updates: mpsc::UnboundedReceiver<SubmissionUpdate>,
    task: JoinHandle<Result<Atom>>,
}

impl Submission {
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Stops the proof-of-work search, or abandons the submission if the
    /// atom was already sent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// `None` once the submission has finished.
    pub async fn next_update(&mut self) -> Option<SubmissionUpdate> {
        self.updates.recv().await
    }

    pub async fn completion(self) -> Result<Atom> {
        self.task.await.map_err(|e| RadixError::TaskFailed(e.to_string()))?
    }
}

struct SubmissionTask {
    uuid: Uuid,
    atom: UnsignedAtom,
    identity: Arc<dyn RadixIdentity>,
    magic: i32,
    leading_zeros: u32,
    dispatcher: ActionDispatcher,
    actions: broadcast::Receiver<NodeAction>,
    cancel: CancellationToken,
    updates: mpsc::UnboundedSender<SubmissionUpdate>,
}

async fn run_submission(task: SubmissionTask) -> Result<Atom> {
    let SubmissionTask {
        uuid,
        atom,
        identity,
        magic,
        leading_zeros,
        dispatcher,
        mut actions,
        cancel,
        updates,
    } = task;

    let signed = finalize(atom, identity.as_ref(), magic, leading_zeros, cancel.clone()).await?;
    let _ = updates.send(SubmissionUpdate::Signed { atom_id: signed.hid() });
    if !dispatcher.dispatch(NodeAction::SubmitAtomRequest {
        uuid,
        atom: signed.clone(),
    }) {
        return Err(RadixError::EngineStopped);
    }
    info!(uuid = %uuid, atom = %signed.short_id(), "Atom submitted");

    let mut cancel_sent = false;
    loop {
        let received = tokio::select! {
            _ = cancel.cancelled(), if !cancel_sent => {
                cancel_sent = true;
                dispatcher.dispatch(NodeAction::SubmitAtomCancel { uuid });
                continue;
            }
            received = actions.recv() => received,
        };
        match received {
            Ok(NodeAction::SubmitAtomStatus {
                uuid: id,
                node,
                status,
                data,
                ..
            }) if id == uuid => {
                let _ = updates.send(SubmissionUpdate::Status { node, status, data });
            }
            Ok(NodeAction::SubmitAtomCompleted { uuid: id, result, .. }) if id == uuid => {
                return result.map(|()| signed).map_err(RadixError::from);
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(uuid = %uuid, lagged = n, "Submission lagged behind the action bus");
            }
            Err(broadcast::error::RecvError::Closed) => {
                return Err(SubmissionError::Transport("network engine stopped".to_string()).into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::LocalIdentity;
    use crate::error::{PowError, RpcError};
    use crate::network::epics::test_support::RefusingConnector;
    use async_trait::async_trait;
    use std::time::Duration;

    struct NoHttp;

    #[async_trait]
    impl HttpClient for NoHttp {
        async fn load_content(&self, url: &str) -> std::result::Result<String, RpcError> {
            Err(RpcError::Http(url.to_string()))
        }
    }

    fn client() -> RadixClient {
        let mut config = ClientConfig::default();
        config.pow.leading_zeros = 250;
        RadixClient::with_transports(
            config,
            Arc::new(LocalIdentity::generate()),
            Arc::new(RefusingConnector),
            Arc::new(NoHttp),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_cancel_stops_proof_of_work() {
        tokio::time::timeout(Duration::from_secs(10), async {
            let client = client();
            let a = client.address();
            let action = UserAction::from(crate::chemistry::SendMessageAction {
                from: a,
                to: a,
                data: b"cancel me".to_vec(),
            });
            let submission = client.execute(&[action]).unwrap();
            submission.cancel();
            let result = submission.completion().await;
            assert!(matches!(result, Err(RadixError::Pow(PowError::Cancelled(_)))));
            client.shutdown().await;
        })
        .await
        .expect("Test timed out");
    }

    #[tokio::test]
    async fn test_build_fails_without_funds() {
        tokio::time::timeout(Duration::from_secs(5), async {
            let client = client();
            let a = client.address();
            let token = Rri::new(a, "XRD").unwrap();
            let action = UserAction::from(crate::chemistry::TransferTokensAction::new(
                a,
                a,
                token,
                UInt256::ONE,
            ));
            assert!(matches!(client.build_atom(&[action]), Err(RadixError::Stage(_))));
            assert!(client.balances(&a).unwrap().is_empty());
            client.shutdown().await;
        })
        .await
        .expect("Test timed out");
    }
}
