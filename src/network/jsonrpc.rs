//! JSON-RPC over one node socket
//!
//! Requests carry UUID string ids and resolve through a pending table.
//! Server pushes are routed by `params.subscriberId` to whoever registered
//! that id; an id may only be registered once at a time.

use super::atom_status::AtomStatus;
use super::node::{peer_from_json, NodeInfo, RadixNode, UniverseConfig};
use super::transport::WebSocketChannel;
use crate::atom::Atom;
use crate::dson::{self, Output};
use crate::error::RpcError;
use crate::primitives::RadixAddress;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use uuid::Uuid;

type PendingTable = HashMap<String, oneshot::Sender<Result<Value, RpcError>>>;
type SubscriberTable = HashMap<String, mpsc::UnboundedSender<Value>>;

#[derive(Default)]
struct Routes {
    pending: PendingTable,
    subscribers: SubscriberTable,
}

/// One entry of a batch call.
#[derive(Debug, Clone)]
pub struct RpcRequest {
    pub method: String,
    pub params: Value,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        RpcRequest {
            method: method.into(),
            params,
        }
    }
}

/// Status push for a submitted atom.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomStatusNotification {
    pub status: AtomStatus,
    pub data: Option<Value>,
}

/// One `Atoms.subscribeUpdate` push.
#[derive(Debug, Clone)]
pub struct AtomsUpdate {
    pub events: Vec<(String, Value)>,
    pub is_head: bool,
}

pub struct RadixJsonRpcClient {
    node: RadixNode,
    outgoing: mpsc::Sender<String>,
    routes: Arc<Mutex<Routes>>,
    timeout: Duration,
    closed: CancellationToken,
}

impl RadixJsonRpcClient {
    /// Takes ownership of an open socket and starts routing its messages.
    pub fn new(node: RadixNode, channel: WebSocketChannel, timeout: Duration) -> Self {
        let WebSocketChannel {
            outgoing,
            mut incoming,
        } = channel;
        let routes = Arc::new(Mutex::new(Routes::default()));
        let closed = CancellationToken::new();

        let reader_routes = routes.clone();
        let reader_closed = closed.clone();
        let reader_node = node.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = reader_closed.cancelled() => break,
                    message = incoming.recv() => match message {
                        Some(text) => route_message(&reader_node, &reader_routes, &text),
                        None => break,
                    },
                }
            }
            let mut routes = reader_routes.lock();
            for (_, waiter) in routes.pending.drain() {
                let _ = waiter.send(Err(RpcError::Closed));
            }
            routes.subscribers.clear();
            drop(routes);
            reader_closed.cancel();
            debug!(node = %reader_node, "JSON-RPC reader stopped");
        });

        RadixJsonRpcClient {
            node,
            outgoing,
            routes,
            timeout,
            closed,
        }
    }

    pub fn node(&self) -> &RadixNode {
        &self.node
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the socket is gone.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    /// Stops routing and fails every outstanding request.
    pub fn close(&self) {
        self.closed.cancel();
    }

    async fn send(&self, text: String) -> Result<(), RpcError> {
        if self.is_closed() {
            return Err(RpcError::NotConnected);
        }
        self.outgoing
            .send(text)
            .await
            .map_err(|e| RpcError::SendFailed(e.to_string()))
    }

    fn register(&self, id: &str) -> oneshot::Receiver<Result<Value, RpcError>> {
        let (tx, rx) = oneshot::channel();
        self.routes.lock().pending.insert(id.to_string(), tx);
        rx
    }

    async fn await_response(
        &self,
        id: &str,
        method: &str,
        rx: oneshot::Receiver<Result<Value, RpcError>>,
    ) -> Result<Value, RpcError> {
        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RpcError::Closed),
            Err(_) => {
                self.routes.lock().pending.remove(id);
                Err(RpcError::Timeout {
                    method: method.to_string(),
                })
            }
        }
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = Uuid::new_v4().to_string();
        let rx = self.register(&id);
        let request = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        trace!(node = %self.node, method, id = %id, "RPC request");
        if let Err(e) = self.send(request.to_string()).await {
            self.routes.lock().pending.remove(&id);
            return Err(e);
        }
        self.await_response(&id, method, rx).await
    }

    /// Sends all requests as one JSON array; results come back in request
    /// order regardless of response order.
    pub async fn batch(&self, requests: Vec<RpcRequest>) -> Result<Vec<Result<Value, RpcError>>, RpcError> {
        let mut waiters = Vec::with_capacity(requests.len());
        let mut frames = Vec::with_capacity(requests.len());
        for request in &requests {
            let id = Uuid::new_v4().to_string();
            waiters.push((id.clone(), request.method.clone(), self.register(&id)));
            frames.push(json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": request.method,
                "params": request.params,
            }));
        }
        if let Err(e) = self.send(Value::Array(frames).to_string()).await {
            let mut routes = self.routes.lock();
            for (id, _, _) in &waiters {
                routes.pending.remove(id);
            }
            return Err(e);
        }
        let mut results = Vec::with_capacity(waiters.len());
        for (id, method, rx) in waiters {
            results.push(self.await_response(&id, &method, rx).await);
        }
        Ok(results)
    }

    /// Registers a push route for `subscriber_id`.
    pub fn subscribe_notifications(
        &self,
        subscriber_id: &str,
    ) -> Result<mpsc::UnboundedReceiver<Value>, RpcError> {
        let mut routes = self.routes.lock();
        if routes.subscribers.contains_key(subscriber_id) {
            return Err(RpcError::SubscriberIdCollision(subscriber_id.to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        routes.subscribers.insert(subscriber_id.to_string(), tx);
        Ok(rx)
    }

    pub fn unsubscribe_notifications(&self, subscriber_id: &str) {
        self.routes.lock().subscribers.remove(subscriber_id);
    }

    pub async fn get_info(&self) -> Result<NodeInfo, RpcError> {
        self.call("Network.getInfo", json!({})).await.map(NodeInfo::new)
    }

    pub async fn get_universe(&self) -> Result<UniverseConfig, RpcError> {
        let value = self.call("Universe.getUniverse", json!({})).await?;
        dson::from_json(&value).map_err(|e| RpcError::Decode(e.to_string()))
    }

    pub async fn get_live_peers(&self, default_port: u16) -> Result<Vec<RadixNode>, RpcError> {
        let value = self.call("Network.getLivePeers", json!({})).await?;
        let entries = value
            .as_array()
            .ok_or_else(|| RpcError::Decode("getLivePeers result is not an array".to_string()))?;
        Ok(entries
            .iter()
            .filter_map(|entry| peer_from_json(entry, default_port, self.node.ssl))
            .collect())
    }

    /// Subscribes to atoms for `address`. Each item is one update push.
    pub async fn observe_atoms(
        &self,
        subscriber_id: &str,
        address: &RadixAddress,
    ) -> Result<mpsc::UnboundedReceiver<Value>, RpcError> {
        let rx = self.subscribe_notifications(subscriber_id)?;
        let params = json!({
            "subscriberId": subscriber_id,
            "query": {"address": address.to_base58()},
        });
        if let Err(e) = self.call("Atoms.subscribe", params).await {
            self.unsubscribe_notifications(subscriber_id);
            return Err(e);
        }
        Ok(rx)
    }

    pub async fn cancel_atoms_subscribe(&self, subscriber_id: &str) -> Result<(), RpcError> {
        self.unsubscribe_notifications(subscriber_id);
        self.call("Atoms.cancel", json!({"subscriberId": subscriber_id}))
            .await
            .map(|_| ())
    }

    pub async fn submit_atom(&self, atom: &Atom) -> Result<(), RpcError> {
        self.call("Atoms.submitAtom", dson::to_json(atom, Output::Wire))
            .await
            .map(|_| ())
    }

    pub async fn observe_atom_status_notifications(
        &self,
        subscriber_id: &str,
        atom: &Atom,
    ) -> Result<mpsc::UnboundedReceiver<Value>, RpcError> {
        let rx = self.subscribe_notifications(subscriber_id)?;
        let params = json!({"subscriberId": subscriber_id, "aid": atom.hid().to_string()});
        if let Err(e) = self.call("Atoms.getAtomStatusNotifications", params).await {
            self.unsubscribe_notifications(subscriber_id);
            return Err(e);
        }
        Ok(rx)
    }

    pub async fn close_atom_status_notifications(&self, subscriber_id: &str) -> Result<(), RpcError> {
        self.unsubscribe_notifications(subscriber_id);
        self.call(
            "Atoms.closeAtomStatusNotifications",
            json!({"subscriberId": subscriber_id}),
        )
        .await
        .map(|_| ())
    }
}

impl Drop for RadixJsonRpcClient {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

fn route_message(node: &RadixNode, routes: &Mutex<Routes>, text: &str) {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!(node = %node, error = %e, "Dropping undecodable RPC message");
            return;
        }
    };
    match value {
        Value::Array(items) => items.into_iter().for_each(|item| route_one(node, routes, item)),
        item => route_one(node, routes, item),
    }
}

fn route_one(node: &RadixNode, routes: &Mutex<Routes>, message: Value) {
    if let Some(id) = message.get("id").and_then(Value::as_str) {
        let Some(waiter) = routes.lock().pending.remove(id) else {
            debug!(node = %node, id, "Response for unknown request");
            return;
        };
        let result = match message.get("error") {
            Some(error) => Err(RpcError::Remote {
                code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
            None => Ok(message.get("result").cloned().unwrap_or(Value::Null)),
        };
        let _ = waiter.send(result);
        return;
    }

    let Some(params) = message.get("params") else {
        debug!(node = %node, "Ignoring RPC message without id or params");
        return;
    };
    let Some(subscriber_id) = params.get("subscriberId").and_then(Value::as_str) else {
        debug!(node = %node, "Ignoring notification without subscriberId");
        return;
    };
    let mut routes = routes.lock();
    let delivered = routes
        .subscribers
        .get(subscriber_id)
        .map(|tx| tx.send(params.clone()).is_ok());
    match delivered {
        Some(true) => {}
        Some(false) => {
            routes.subscribers.remove(subscriber_id);
        }
        None => debug!(node = %node, subscriber_id, "Notification for unknown subscriber"),
    }
}

/// Reads an `AtomStatusNotification` push.
pub fn parse_status_notification(params: &Value) -> Result<AtomStatusNotification, RpcError> {
    let status = params
        .get("status")
        .and_then(Value::as_str)
        .and_then(AtomStatus::parse)
        .ok_or_else(|| RpcError::Decode(format!("bad atom status in {params}")))?;
    Ok(AtomStatusNotification {
        status,
        data: params.get("data").cloned().filter(|d| !d.is_null()),
    })
}

/// Reads an `Atoms.subscribeUpdate` push into `(type, atom json)` pairs.
pub fn parse_atoms_update(params: &Value) -> Result<AtomsUpdate, RpcError> {
    let is_head = params.get("isHead").and_then(Value::as_bool).unwrap_or(false);
    let events = match params.get("atomEvents") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|event| {
                let kind = event
                    .get("type")
                    .and_then(Value::as_str)
                    .ok_or_else(|| RpcError::Decode("atom event without type".to_string()))?;
                let atom = event
                    .get("atom")
                    .cloned()
                    .ok_or_else(|| RpcError::Decode("atom event without atom".to_string()))?;
                Ok((kind.to_string(), atom))
            })
            .collect::<Result<Vec<_>, RpcError>>()?,
        Some(other) => return Err(RpcError::Decode(format!("atomEvents is {other}"))),
    };
    Ok(AtomsUpdate { events, is_head })
}
