//! The network engine
//!
//! One task owns [`RadixNetworkState`]: it pulls actions off the dispatch
//! channel, folds them with the reducer, publishes the new state, then
//! broadcasts the action to every epic and external observer.

use super::actions::NodeAction;
use super::epics::{
    run_epic, ActionDispatcher, AutoCloseEpic, DiscoveryEpic, Epic, EpicContext, FetchAtomsEpic,
    FindANodeEpic, JsonRpcEpic, NodeDiscovery, SubmitAtomEpic, WebSocketsEpic,
};
use super::node::RadixNode;
use super::reducer::reduce;
use super::state::{is_universe_suitable, RadixNetworkState, UniversePredicate};
use super::transport::{HttpClient, WebSocketConnector};
use super::websockets::WebSockets;
use crate::config::ClientConfig;
use crate::error::{ConfigError, RadixError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const ACTION_BUS_CAPACITY: usize = 1024;

/// Engine parameters, resolved from [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub magic: i32,
    pub default_port: u16,
    pub use_ssl: bool,
    pub discovery: NodeDiscovery,
    pub websocket_close_delay: Duration,
    pub rpc_timeout: Duration,
    pub submission_timeout: Duration,
    pub max_simultaneous_connections: usize,
}

impl EngineSettings {
    pub fn new(magic: i32, discovery: NodeDiscovery) -> Self {
        EngineSettings {
            magic,
            default_port: 8080,
            use_ssl: false,
            discovery,
            websocket_close_delay: Duration::from_millis(5000),
            rpc_timeout: Duration::from_secs(30),
            submission_timeout: Duration::from_secs(60),
            max_simultaneous_connections: 1,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let network = &config.network;
        let discovery = match &network.bootstrap_url {
            Some(url) => NodeDiscovery::NodeFinder { url: url.clone() },
            None => NodeDiscovery::Static(
                network
                    .bootstrap_nodes
                    .iter()
                    .map(|s| RadixNode::parse(s, config.universe.port, network.use_ssl))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?,
            ),
        };
        Ok(EngineSettings {
            magic: config.universe.magic,
            default_port: config.universe.port,
            use_ssl: network.use_ssl,
            discovery,
            websocket_close_delay: Duration::from_millis(network.websocket_close_delay_ms),
            rpc_timeout: Duration::from_secs(network.rpc_timeout_secs),
            submission_timeout: Duration::from_secs(network.submission_timeout_secs),
            max_simultaneous_connections: network.max_simultaneous_connections.max(1),
        })
    }
}

pub struct RadixNetworkController {
    dispatcher: ActionDispatcher,
    actions: broadcast::Sender<NodeAction>,
    state: watch::Receiver<RadixNetworkState>,
    websockets: Arc<WebSockets>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RadixNetworkController {
    /// Starts the engine with the full epic set. Must be called within a
    /// tokio runtime.
    pub fn spawn(
        settings: EngineSettings,
        connector: Arc<dyn WebSocketConnector>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        let epics = Self::default_epics(&settings, http);
        Self::spawn_with_epics(settings, connector, epics)
    }

    pub fn default_epics(settings: &EngineSettings, http: Arc<dyn HttpClient>) -> Vec<Arc<dyn Epic>> {
        vec![
            Arc::new(DiscoveryEpic::new(settings.discovery.clone(), http)),
            Arc::new(WebSocketsEpic::new()),
            Arc::new(AutoCloseEpic::new()),
            Arc::new(FindANodeEpic::new()),
            Arc::new(JsonRpcEpic::new()),
            Arc::new(SubmitAtomEpic::new()),
            Arc::new(FetchAtomsEpic::new()),
        ]
    }

    pub fn spawn_with_epics(
        settings: EngineSettings,
        connector: Arc<dyn WebSocketConnector>,
        epics: Vec<Arc<dyn Epic>>,
    ) -> Self {
        let predicate = is_universe_suitable(settings.magic);
        Self::spawn_with_predicate(settings, connector, epics, predicate)
    }

    pub fn spawn_with_predicate(
        settings: EngineSettings,
        connector: Arc<dyn WebSocketConnector>,
        epics: Vec<Arc<dyn Epic>>,
        predicate: UniversePredicate,
    ) -> Self {
        let (dispatch_tx, mut dispatch_rx) = mpsc::unbounded_channel::<NodeAction>();
        let (actions, _) = broadcast::channel(ACTION_BUS_CAPACITY);
        let (state_tx, state) = watch::channel(RadixNetworkState::new());
        let websockets = Arc::new(WebSockets::new(connector, settings.rpc_timeout));
        let cancel = CancellationToken::new();
        let dispatcher = ActionDispatcher::new(dispatch_tx);
        let settings = Arc::new(settings);
        let mut tasks = Vec::with_capacity(epics.len() + 1);

        for epic in epics {
            let ctx = EpicContext {
                dispatcher: dispatcher.clone(),
                state: state.clone(),
                websockets: websockets.clone(),
                settings: settings.clone(),
                predicate: predicate.clone(),
                cancel: cancel.clone(),
            };
            // Subscribe before the reducer starts so no action is missed.
            let rx = actions.subscribe();
            tasks.push(tokio::spawn(run_epic(epic, rx, ctx)));
        }

        let bus = actions.clone();
        let reducer_cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = reducer_cancel.cancelled() => break,
                    received = dispatch_rx.recv() => {
                        let Some(action) = received else { break };
                        state_tx.send_modify(|s| *s = reduce(std::mem::take(s), &action));
                        debug!(action = action.name(), "Action reduced");
                        let _ = bus.send(action);
                    }
                }
            }
            debug!("Network reducer stopped");
        }));

        info!(magic = settings.magic, "Network engine started");
        RadixNetworkController {
            dispatcher,
            actions,
            state,
            websockets,
            cancel,
            tasks: Mutex::new(tasks),
        }
    }

    pub fn dispatch(&self, action: NodeAction) -> Result<(), RadixError> {
        if self.cancel.is_cancelled() || !self.dispatcher.dispatch(action) {
            return Err(RadixError::EngineStopped);
        }
        Ok(())
    }

    pub fn dispatcher(&self) -> ActionDispatcher {
        self.dispatcher.clone()
    }

    /// Every action after it has been reduced, in dispatch order.
    pub fn observe_actions(&self) -> broadcast::Receiver<NodeAction> {
        self.actions.subscribe()
    }

    pub fn state(&self) -> RadixNetworkState {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<RadixNetworkState> {
        self.state.clone()
    }

    pub fn websockets(&self) -> &Arc<WebSockets> {
        &self.websockets
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Stops every epic and the reducer, then closes all sockets.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
        self.websockets.close_all();
        info!("Network engine stopped");
    }
}

impl Drop for RadixNetworkController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
