use super::{Epic, EpicContext};
use crate::network::actions::NodeAction;
use crate::network::node::RadixNode;
use async_trait::async_trait;
use tracing::warn;

/// Serves the node-info, universe and live-peer requests over the node's
/// open socket.
pub struct JsonRpcEpic;

impl JsonRpcEpic {
    pub fn new() -> Self {
        JsonRpcEpic
    }
}

impl Default for JsonRpcEpic {
    fn default() -> Self {
        Self::new()
    }
}

fn failure(node: &RadixNode, method: &str, reason: impl ToString) -> NodeAction {
    NodeAction::RpcFailure {
        node: node.clone(),
        method: method.to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl Epic for JsonRpcEpic {
    fn name(&self) -> &'static str {
        "json-rpc"
    }

    async fn handle(&self, action: &NodeAction, ctx: &EpicContext) {
        let (node, method) = match action {
            NodeAction::GetNodeInfoRequest { node } => (node, "Network.getInfo"),
            NodeAction::GetUniverseConfigRequest { node } => (node, "Universe.getUniverse"),
            NodeAction::GetLivePeersRequest { node } => (node, "Network.getLivePeers"),
            _ => return,
        };
        let Some(client) = ctx.websockets.get(node) else {
            ctx.dispatch(failure(node, method, "not connected"));
            return;
        };
        let lease = ctx.websockets.lease(node);
        let node = node.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let _lease = lease;
            let result = match method {
                "Network.getInfo" => client
                    .get_info()
                    .await
                    .map(|info| NodeAction::GetNodeInfoResult { node: node.clone(), info }),
                "Universe.getUniverse" => client
                    .get_universe()
                    .await
                    .map(|config| NodeAction::GetUniverseConfigResult { node: node.clone(), config }),
                _ => client
                    .get_live_peers(ctx.settings.default_port)
                    .await
                    .map(|peers| NodeAction::GetLivePeersResult { node: node.clone(), peers }),
            };
            match result {
                Ok(action) => ctx.dispatch(action),
                Err(e) => {
                    warn!(node = %node, method, error = %e, "RPC failed");
                    ctx.dispatch(failure(&node, method, e));
                }
            }
        });
    }
}
