//! Lazily opened, listener-counted node sockets
//!
//! A socket may only be closed while nobody holds a [`ConnectionLease`] on
//! it.

use super::jsonrpc::RadixJsonRpcClient;
use super::node::RadixNode;
use super::transport::WebSocketConnector;
use crate::error::RpcError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Default)]
struct Slot {
    client: Option<Arc<RadixJsonRpcClient>>,
    listeners: usize,
}

pub struct WebSockets {
    connector: Arc<dyn WebSocketConnector>,
    rpc_timeout: Duration,
    slots: Mutex<HashMap<RadixNode, Slot>>,
}

impl WebSockets {
    pub fn new(connector: Arc<dyn WebSocketConnector>, rpc_timeout: Duration) -> Self {
        WebSockets {
            connector,
            rpc_timeout,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// The live client for `node`, if one is open.
    pub fn get(&self, node: &RadixNode) -> Option<Arc<RadixJsonRpcClient>> {
        self.slots
            .lock()
            .get(node)
            .and_then(|slot| slot.client.clone())
            .filter(|client| !client.is_closed())
    }

    /// Returns the open client for `node`, connecting first if needed.
    pub async fn connect(&self, node: &RadixNode) -> Result<Arc<RadixJsonRpcClient>, RpcError> {
        if let Some(client) = self.get(node) {
            return Ok(client);
        }
        let channel = self.connector.connect(node).await?;
        let client = Arc::new(RadixJsonRpcClient::new(node.clone(), channel, self.rpc_timeout));
        let mut slots = self.slots.lock();
        let slot = slots.entry(node.clone()).or_default();
        // Another connect may have won the race while we were awaiting.
        if let Some(existing) = slot.client.as_ref().filter(|c| !c.is_closed()) {
            return Ok(existing.clone());
        }
        slot.client = Some(client.clone());
        info!(node = %node, "Connected to node");
        Ok(client)
    }

    /// Marks interest in `node`. The socket stays open while the lease lives.
    pub fn lease(self: &Arc<Self>, node: &RadixNode) -> ConnectionLease {
        self.slots.lock().entry(node.clone()).or_default().listeners += 1;
        ConnectionLease {
            sockets: self.clone(),
            node: node.clone(),
        }
    }

    pub fn listeners(&self, node: &RadixNode) -> usize {
        self.slots.lock().get(node).map(|s| s.listeners).unwrap_or(0)
    }

    /// Closes the socket unless someone still listens. Returns whether it
    /// was closed.
    pub fn close(&self, node: &RadixNode) -> bool {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get_mut(node) else {
            return false;
        };
        if slot.listeners > 0 {
            debug!(node = %node, listeners = slot.listeners, "Close deferred, socket in use");
            return false;
        }
        match slot.client.take() {
            Some(client) => {
                client.close();
                info!(node = %node, "Closed node socket");
                true
            }
            None => false,
        }
    }

    pub fn close_all(&self) {
        for (_, slot) in self.slots.lock().drain() {
            if let Some(client) = slot.client {
                client.close();
            }
        }
    }
}

pub struct ConnectionLease {
    sockets: Arc<WebSockets>,
    node: RadixNode,
}

impl ConnectionLease {
    pub fn node(&self) -> &RadixNode {
        &self.node
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        if let Some(slot) = self.sockets.slots.lock().get_mut(&self.node) {
            slot.listeners = slot.listeners.saturating_sub(1);
        }
    }
}
