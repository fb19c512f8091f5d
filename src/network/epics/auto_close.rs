use super::{Epic, EpicContext};
use crate::network::actions::NodeAction;
use crate::network::node::{RadixNode, WebSocketStatus};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Closes sockets nobody listens to, after a grace delay. Any activity on a
/// node restarts its delay.
pub struct AutoCloseEpic {
    generations: Arc<Mutex<HashMap<RadixNode, u64>>>,
}

impl AutoCloseEpic {
    pub fn new() -> Self {
        AutoCloseEpic {
            generations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn schedule(&self, node: &RadixNode, ctx: &EpicContext) {
        let generation = {
            let mut generations = self.generations.lock();
            let entry = generations.entry(node.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        let generations = self.generations.clone();
        let node = node.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = ctx.cancel.cancelled() => return,
                _ = tokio::time::sleep(ctx.settings.websocket_close_delay) => {}
            }
            if generations.lock().get(&node).copied() != Some(generation) {
                return;
            }
            let connected = ctx
                .state()
                .get(&node)
                .map(|n| n.status == WebSocketStatus::Connected)
                .unwrap_or(false);
            if connected && ctx.websockets.listeners(&node) == 0 {
                debug!(node = %node, "Closing idle socket");
                ctx.dispatch(NodeAction::CloseWebSocket { node });
            }
        });
    }
}

impl Default for AutoCloseEpic {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Epic for AutoCloseEpic {
    fn name(&self) -> &'static str {
        "auto-close"
    }

    async fn handle(&self, action: &NodeAction, ctx: &EpicContext) {
        match action {
            NodeAction::WebSocketEvent {
                node,
                status: WebSocketStatus::Connected,
            }
            | NodeAction::GetNodeInfoResult { node, .. }
            | NodeAction::GetUniverseConfigResult { node, .. }
            | NodeAction::GetLivePeersResult { node, .. }
            | NodeAction::NodeUniverseMismatch { node, .. }
            | NodeAction::RpcFailure { node, .. }
            | NodeAction::SubmitAtomCompleted {
                node: Some(node), ..
            } => self.schedule(node, ctx),
            NodeAction::FetchAtomsCancel { .. } => {
                let connected: Vec<RadixNode> = ctx
                    .state()
                    .with_status(WebSocketStatus::Connected)
                    .map(|n| n.node.clone())
                    .collect();
                for node in &connected {
                    self.schedule(node, ctx);
                }
            }
            _ => {}
        }
    }
}
