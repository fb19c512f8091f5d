//! End-to-end tests of the network engine and client against an
//! in-process node

use async_trait::async_trait;
use futures::StreamExt;
use radix_client::atom::Atom;
use radix_client::chemistry::{CreateTokenAction, ExecutedAction, SendMessageAction, TransferTokensAction, UserAction};
use radix_client::client::{RadixClient, SubmissionUpdate};
use radix_client::config::ClientConfig;
use radix_client::crypto::{KeyPair, LocalIdentity, RadixIdentity};
use radix_client::dson::{self, Output};
use radix_client::error::{RadixError, RpcError, SubmissionError};
use radix_client::network::transport::{HttpClient, WebSocketChannel, WebSocketConnector};
use radix_client::network::{
    AtomStatus, EngineSettings, NodeAction, NodeDiscovery, ObservationKind, RadixNetworkController, RadixNode,
    UniverseConfig, WebSocketStatus,
};
use radix_client::particles::TokenSupplyType;
use radix_client::primitives::{Rri, UInt256};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

const MAGIC: i32 = 77;

#[derive(Default)]
struct Ledger {
    atoms: Vec<Value>,
    atom_subscribers: Vec<(mpsc::Sender<String>, String)>,
    /// Number of upcoming `Atoms.subscribe` calls to answer with an error.
    failing_subscribes: usize,
}

/// Answers the JSON-RPC methods the engine uses. Submitted atoms are stored
/// immediately and pushed to every atom subscriber.
struct FakeNode {
    magic: i32,
    ledger: Mutex<Ledger>,
}

impl FakeNode {
    fn new(magic: i32) -> Arc<Self> {
        Arc::new(FakeNode {
            magic,
            ledger: Mutex::new(Ledger::default()),
        })
    }
}

fn atoms_update(subscriber_id: &str, atoms: &[Value], is_head: bool) -> String {
    let events: Vec<Value> = atoms.iter().map(|a| json!({"type": "store", "atom": a})).collect();
    json!({
        "jsonrpc": "2.0",
        "method": "Atoms.subscribeUpdate",
        "params": {"subscriberId": subscriber_id, "atomEvents": events, "isHead": is_head},
    })
    .to_string()
}

async fn serve(node: Arc<FakeNode>, mut from_client: mpsc::Receiver<String>, to_client: mpsc::Sender<String>) {
    let mut status_subscribers: HashMap<String, String> = HashMap::new();
    while let Some(text) = from_client.recv().await {
        let Ok(request) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        let params = request["params"].clone();
        let subscriber_id = params["subscriberId"].as_str().unwrap_or_default().to_string();
        let mut pushes: Vec<(mpsc::Sender<String>, String)> = Vec::new();
        let mut error: Option<Value> = None;
        let result = match request["method"].as_str().unwrap_or_default() {
            "Universe.getUniverse" => dson::to_json(&UniverseConfig::new(node.magic, "fake", 8080), Output::Wire),
            "Network.getInfo" => json!({"system": {"agent": {"name": ":str:fake-node"}}}),
            "Network.getLivePeers" => json!([]),
            "Atoms.getAtomStatusNotifications" => {
                let aid = params["aid"].as_str().unwrap_or_default().to_string();
                status_subscribers.insert(aid, subscriber_id);
                json!({})
            }
            "Atoms.submitAtom" => {
                let atom: Atom = dson::from_json(&params).unwrap();
                if let Some(sid) = status_subscribers.get(&atom.hid().to_string()) {
                    for status in ["PENDING_CM_VERIFICATION", "STORED"] {
                        let push = json!({
                            "jsonrpc": "2.0",
                            "method": "AtomStatusNotification",
                            "params": {"subscriberId": sid, "status": status},
                        });
                        pushes.push((to_client.clone(), push.to_string()));
                    }
                }
                let mut ledger = node.ledger.lock().unwrap();
                ledger.atoms.push(params.clone());
                for (tx, sid) in &ledger.atom_subscribers {
                    pushes.push((tx.clone(), atoms_update(sid, std::slice::from_ref(&params), true)));
                }
                json!({})
            }
            "Atoms.subscribe" => {
                let mut ledger = node.ledger.lock().unwrap();
                if ledger.failing_subscribes > 0 {
                    ledger.failing_subscribes -= 1;
                    error = Some(json!({"code": -32000, "message": "subscriptions unavailable"}));
                } else {
                    ledger.atom_subscribers.push((to_client.clone(), subscriber_id.clone()));
                    pushes.push((to_client.clone(), atoms_update(&subscriber_id, &ledger.atoms, true)));
                }
                json!({})
            }
            "Atoms.cancel" => {
                node.ledger
                    .lock()
                    .unwrap()
                    .atom_subscribers
                    .retain(|(_, sid)| *sid != subscriber_id);
                json!({})
            }
            _ => json!({}),
        };
        let reply = match error {
            Some(error) => json!({"jsonrpc": "2.0", "id": request["id"], "error": error}),
            None => json!({"jsonrpc": "2.0", "id": request["id"], "result": result}),
        };
        if to_client.send(reply.to_string()).await.is_err() {
            break;
        }
        for (tx, push) in pushes {
            let _ = tx.send(push).await;
        }
    }
}

struct FakeConnector(Arc<FakeNode>);

#[async_trait]
impl WebSocketConnector for FakeConnector {
    async fn connect(&self, _node: &RadixNode) -> Result<WebSocketChannel, RpcError> {
        let (out_tx, out_rx) = mpsc::channel(64);
        let (in_tx, in_rx) = mpsc::channel(64);
        tokio::spawn(serve(self.0.clone(), out_rx, in_tx));
        Ok(WebSocketChannel {
            outgoing: out_tx,
            incoming: in_rx,
        })
    }
}

struct RefusingConnector;

#[async_trait]
impl WebSocketConnector for RefusingConnector {
    async fn connect(&self, node: &RadixNode) -> Result<WebSocketChannel, RpcError> {
        Err(RpcError::ConnectionFailed(format!("{node} refused")))
    }
}

struct StaticHttp(String);

#[async_trait]
impl HttpClient for StaticHttp {
    async fn load_content(&self, _url: &str) -> Result<String, RpcError> {
        Ok(self.0.clone())
    }
}

fn config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.universe.magic = MAGIC;
    config.network.bootstrap_nodes = vec!["fake:8080".to_string()];
    config.network.websocket_close_delay_ms = 50;
    config.pow.leading_zeros = 4;
    config
}

fn client(node: &Arc<FakeNode>, identity: Arc<LocalIdentity>) -> RadixClient {
    RadixClient::with_transports(
        config(),
        identity,
        Arc::new(FakeConnector(node.clone())),
        Arc::new(StaticHttp(String::new())),
    )
    .unwrap()
}

#[tokio::test]
async fn test_submit_message_and_read_history() {
    tokio::time::timeout(Duration::from_secs(20), async {
        let node = FakeNode::new(MAGIC);
        let identity = Arc::new(LocalIdentity::generate());
        let client = client(&node, identity);
        let a = client.address();

        let action: UserAction = SendMessageAction {
            from: a,
            to: a,
            data: b"hello ledger".to_vec(),
        }
        .into();
        let mut submission = client.execute(&[action]).unwrap();

        let mut statuses = Vec::new();
        while let Some(update) = submission.next_update().await {
            match update {
                SubmissionUpdate::Signed { .. } => {}
                SubmissionUpdate::Status { status, .. } => statuses.push(status),
            }
        }
        assert_eq!(
            statuses,
            vec![AtomStatus::PendingConstraintMachineVerification, AtomStatus::Stored]
        );
        let atom = submission.completion().await.unwrap();

        let pull = client.pull(&a).unwrap();
        assert!(client.on_sync(&a).await.is_some());
        assert_eq!(client.store().is_soft(&atom.hid()), Some(false));

        let history = client.transaction_history(&a);
        assert_eq!(history.len(), 1);
        assert_eq!(
            history[0].actions,
            vec![ExecutedAction::SendMessage {
                from: a,
                to: a,
                data: b"hello ledger".to_vec(),
            }]
        );

        let state = client.network_state();
        let fake = state.get(&RadixNode::new("fake", 8080, false)).unwrap();
        assert_eq!(fake.universe.as_ref().map(|u| u.magic), Some(MAGIC));

        pull.cancel();
        client.shutdown().await;
    })
    .await
    .expect("Test timed out");
}

#[tokio::test]
async fn test_token_lifecycle_updates_balances() {
    tokio::time::timeout(Duration::from_secs(30), async {
        let node = FakeNode::new(MAGIC);
        let identity = Arc::new(LocalIdentity::generate());
        let client = client(&node, identity);
        let a = client.address();
        let b = KeyPair::generate().address(MAGIC);
        let token = Rri::new(a, "GOLD").unwrap();

        let _pull = client.pull(&a).unwrap();
        client.on_sync(&a).await.unwrap();
        let mut observations = client.observe_atoms(&a);

        let create: UserAction = CreateTokenAction::new(
            a,
            "Gold",
            "GOLD",
            "",
            UInt256::from_u64(100),
            UInt256::ONE,
            TokenSupplyType::Fixed,
        )
        .into();
        let created = client.execute(&[create]).unwrap().completion().await.unwrap();
        while let Some(observation) = observations.next().await {
            if observation.kind == ObservationKind::Store
                && observation.atom.as_ref().map(Atom::hid) == Some(created.hid())
            {
                break;
            }
        }
        assert_eq!(client.balance(&a, &token).unwrap(), UInt256::from_u64(100));

        let transfer: UserAction = TransferTokensAction::new(a, b, token.clone(), UInt256::from_u64(40)).into();
        let sent = client.execute(&[transfer]).unwrap().completion().await.unwrap();
        while let Some(observation) = observations.next().await {
            if observation.atom.as_ref().map(Atom::hid) == Some(sent.hid()) {
                break;
            }
        }
        assert_eq!(client.balance(&a, &token).unwrap(), UInt256::from_u64(60));
        assert_eq!(client.balance(&b, &token).unwrap(), UInt256::from_u64(40));

        let definitions = client.token_definitions().unwrap();
        assert_eq!(
            definitions.get(&token).and_then(|t| t.total_supply),
            Some(UInt256::from_u64(100))
        );

        let history = client.transaction_history(&a);
        assert!(history.iter().any(|tx| tx.actions.contains(&ExecutedAction::TokenTransfer {
            from: a,
            to: b,
            token: token.clone(),
            amount: UInt256::from_u64(40),
            attachment: None,
        })));

        client.shutdown().await;
    })
    .await
    .expect("Test timed out");
}

#[tokio::test]
async fn test_idle_socket_closes_after_fetch_cancel() {
    tokio::time::timeout(Duration::from_secs(10), async {
        let node = FakeNode::new(MAGIC);
        let mut settings = EngineSettings::new(
            MAGIC,
            NodeDiscovery::NodeFinder {
                url: "http://finder".to_string(),
            },
        );
        settings.websocket_close_delay = Duration::from_millis(200);
        let controller = RadixNetworkController::spawn(
            settings,
            Arc::new(FakeConnector(node.clone())),
            Arc::new(StaticHttp("fake, fake".to_string())),
        );
        let mut actions = controller.observe_actions();
        let address = LocalIdentity::generate().address(MAGIC);
        let uuid = uuid::Uuid::new_v4();
        controller
            .dispatch(NodeAction::FetchAtomsRequest { uuid, address })
            .unwrap();

        let mut nodes_added = 0;
        loop {
            match actions.recv().await.unwrap() {
                NodeAction::AddNode { .. } => nodes_added += 1,
                NodeAction::FetchAtomsObservation { observation, .. } if observation.is_head => break,
                _ => {}
            }
        }
        assert_eq!(nodes_added, 1);

        controller
            .dispatch(NodeAction::FetchAtomsCancel { uuid, address })
            .unwrap();
        loop {
            if let NodeAction::WebSocketEvent {
                status: WebSocketStatus::Disconnected,
                ..
            } = actions.recv().await.unwrap()
            {
                break;
            }
        }
        assert!(controller.websockets().get(&RadixNode::new("fake", 8080, false)).is_none());
        controller.shutdown().await;
    })
    .await
    .expect("Test timed out");
}

#[tokio::test]
async fn test_universe_mismatch_is_reported() {
    tokio::time::timeout(Duration::from_secs(10), async {
        let node = FakeNode::new(MAGIC + 1);
        let settings = EngineSettings::new(
            MAGIC,
            NodeDiscovery::Static(vec![RadixNode::new("fake", 8080, false)]),
        );
        let controller = RadixNetworkController::spawn(
            settings,
            Arc::new(FakeConnector(node)),
            Arc::new(StaticHttp(String::new())),
        );
        let mut actions = controller.observe_actions();
        let address = LocalIdentity::generate().address(MAGIC);
        controller
            .dispatch(NodeAction::FetchAtomsRequest {
                uuid: uuid::Uuid::new_v4(),
                address,
            })
            .unwrap();
        loop {
            match actions.recv().await.unwrap() {
                NodeAction::NodeUniverseMismatch { expected, actual, .. } => {
                    assert_eq!(expected, MAGIC);
                    assert_eq!(actual, MAGIC + 1);
                    break;
                }
                NodeAction::FetchAtomsSubscribe { .. } => panic!("routed to a foreign universe"),
                _ => {}
            }
        }
        controller.shutdown().await;
    })
    .await
    .expect("Test timed out");
}

#[tokio::test]
async fn test_pull_recovers_from_failed_subscribe() {
    tokio::time::timeout(Duration::from_secs(10), async {
        let node = FakeNode::new(MAGIC);
        node.ledger.lock().unwrap().failing_subscribes = 2;
        let identity = Arc::new(LocalIdentity::generate());
        let client = client(&node, identity);
        let a = client.address();

        let pull = client.pull(&a).unwrap();
        assert!(client.on_sync(&a).await.is_some());
        assert_eq!(node.ledger.lock().unwrap().failing_subscribes, 0);
        assert_eq!(node.ledger.lock().unwrap().atom_subscribers.len(), 1);

        pull.cancel();
        client.shutdown().await;
    })
    .await
    .expect("Test timed out");
}

#[tokio::test]
async fn test_submission_fails_when_no_node_is_reachable() {
    tokio::time::timeout(Duration::from_secs(10), async {
        let mut config = config();
        config.network.bootstrap_nodes = vec!["dead:8080".to_string()];
        config.network.submission_timeout_secs = 1;
        let identity = Arc::new(LocalIdentity::generate());
        let client = RadixClient::with_transports(
            config,
            identity,
            Arc::new(RefusingConnector),
            Arc::new(StaticHttp(String::new())),
        )
        .unwrap();
        let a = client.address();

        let action: UserAction = SendMessageAction {
            from: a,
            to: a,
            data: b"nobody home".to_vec(),
        }
        .into();
        let result = client.execute(&[action]).unwrap().completion().await;
        assert!(
            matches!(result, Err(RadixError::Submission(SubmissionError::Transport(_)))),
            "unexpected result {result:?}"
        );
        client.shutdown().await;
    })
    .await
    .expect("Test timed out");
}
