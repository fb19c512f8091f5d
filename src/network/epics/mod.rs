//! Epics: one asynchronous concern each
//!
//! Every epic reads the action bus after the reducer has applied an action,
//! and answers by dispatching further actions. Slow work is spawned so the
//! bus keeps moving.

pub mod auto_close;
pub mod discovery;
pub mod fetch_atoms;
pub mod find_node;
pub mod json_rpc;
pub mod submit_atom;
pub mod websockets;

pub use auto_close::AutoCloseEpic;
pub use discovery::{DiscoveryEpic, NodeDiscovery};
pub use fetch_atoms::FetchAtomsEpic;
pub use find_node::FindANodeEpic;
pub use json_rpc::JsonRpcEpic;
pub use submit_atom::SubmitAtomEpic;
pub use websockets::WebSocketsEpic;

use super::actions::NodeAction;
use super::controller::EngineSettings;
use super::state::{RadixNetworkState, UniversePredicate};
use super::websockets::WebSockets;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

/// Entry point into the single ordered action channel.
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    tx: mpsc::UnboundedSender<NodeAction>,
}

impl ActionDispatcher {
    pub(crate) fn new(tx: mpsc::UnboundedSender<NodeAction>) -> Self {
        ActionDispatcher { tx }
    }

    /// Queues `action`. Returns false once the engine has stopped.
    pub fn dispatch(&self, action: NodeAction) -> bool {
        self.tx.send(action).is_ok()
    }
}

/// What an epic may see and touch.
#[derive(Clone)]
pub struct EpicContext {
    pub dispatcher: ActionDispatcher,
    pub state: watch::Receiver<RadixNetworkState>,
    pub websockets: Arc<WebSockets>,
    pub settings: Arc<EngineSettings>,
    pub predicate: UniversePredicate,
    pub cancel: CancellationToken,
}

impl EpicContext {
    pub fn state(&self) -> RadixNetworkState {
        self.state.borrow().clone()
    }

    pub fn dispatch(&self, action: NodeAction) {
        if !self.dispatcher.dispatch(action) {
            trace!("Dropping action, engine stopped");
        }
    }
}

#[async_trait]
pub trait Epic: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn handle(&self, action: &NodeAction, ctx: &EpicContext);
}

pub(crate) async fn run_epic(
    epic: Arc<dyn Epic>,
    mut actions: broadcast::Receiver<NodeAction>,
    ctx: EpicContext,
) {
    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            received = actions.recv() => match received {
                Ok(action) => epic.handle(&action, &ctx).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(epic = epic.name(), lagged = n, "Epic lagged behind the action bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    trace!(epic = epic.name(), "Epic stopped");
}
