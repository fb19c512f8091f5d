use super::{Epic, EpicContext};
use crate::network::actions::NodeAction;
use crate::network::node::{RadixNode, WebSocketStatus};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Opens and closes node sockets, reporting each transition as a
/// `WebSocketEvent`.
pub struct WebSocketsEpic {
    connecting: Arc<Mutex<HashSet<RadixNode>>>,
}

impl WebSocketsEpic {
    pub fn new() -> Self {
        WebSocketsEpic {
            connecting: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

impl Default for WebSocketsEpic {
    fn default() -> Self {
        Self::new()
    }
}

fn event(node: &RadixNode, status: WebSocketStatus) -> NodeAction {
    NodeAction::WebSocketEvent {
        node: node.clone(),
        status,
    }
}

#[async_trait]
impl Epic for WebSocketsEpic {
    fn name(&self) -> &'static str {
        "websockets"
    }

    async fn handle(&self, action: &NodeAction, ctx: &EpicContext) {
        match action {
            NodeAction::ConnectWebSocket { node } => {
                if ctx.websockets.get(node).is_some() {
                    let connected = ctx
                        .state()
                        .get(node)
                        .map(|n| n.status == WebSocketStatus::Connected)
                        .unwrap_or(false);
                    if !connected {
                        ctx.dispatch(event(node, WebSocketStatus::Connected));
                    }
                    return;
                }
                if !self.connecting.lock().insert(node.clone()) {
                    return;
                }
                ctx.dispatch(event(node, WebSocketStatus::Connecting));
                let node = node.clone();
                let ctx = ctx.clone();
                let connecting = self.connecting.clone();
                tokio::spawn(async move {
                    let result = ctx.websockets.connect(&node).await;
                    connecting.lock().remove(&node);
                    match result {
                        Ok(client) => {
                            ctx.dispatch(event(&node, WebSocketStatus::Connected));
                            tokio::select! {
                                _ = ctx.cancel.cancelled() => {}
                                _ = client.closed() => {
                                    info!(node = %node, "Node socket closed");
                                    ctx.dispatch(event(&node, WebSocketStatus::Disconnected));
                                }
                            }
                        }
                        Err(e) => {
                            warn!(node = %node, error = %e, "Failed to connect to node");
                            ctx.dispatch(event(&node, WebSocketStatus::Failed));
                        }
                    }
                });
            }
            NodeAction::CloseWebSocket { node } => {
                if ctx.websockets.close(node) {
                    ctx.dispatch(event(node, WebSocketStatus::Closing));
                }
            }
            _ => {}
        }
    }
}
