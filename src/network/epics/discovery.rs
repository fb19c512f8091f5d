use super::{Epic, EpicContext};
use crate::network::actions::NodeAction;
use crate::network::node::{RadixNode, WebSocketStatus};
use crate::network::transport::HttpClient;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where new nodes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeDiscovery {
    Static(Vec<RadixNode>),
    /// An HTTP endpoint answering with whitespace or comma separated hosts.
    NodeFinder { url: String },
}

/// Finds nodes, asks newly connected ones who they are, and follows their
/// peer lists. Each node is announced with `AddNode` once.
pub struct DiscoveryEpic {
    discovery: NodeDiscovery,
    http: Arc<dyn HttpClient>,
    seen: Arc<Mutex<HashSet<RadixNode>>>,
}

impl DiscoveryEpic {
    pub fn new(discovery: NodeDiscovery, http: Arc<dyn HttpClient>) -> Self {
        DiscoveryEpic {
            discovery,
            http,
            seen: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

fn announce(seen: &Mutex<HashSet<RadixNode>>, node: RadixNode, ctx: &EpicContext) {
    if ctx.state().contains(&node) || !seen.lock().insert(node.clone()) {
        return;
    }
    debug!(node = %node, "Discovered node");
    ctx.dispatch(NodeAction::AddNode { node, info: None });
}

pub(crate) fn parse_node_list(body: &str, default_port: u16, ssl: bool) -> Vec<RadixNode> {
    body.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .filter_map(|s| RadixNode::parse(s, default_port, ssl).ok())
        .collect()
}

#[async_trait]
impl Epic for DiscoveryEpic {
    fn name(&self) -> &'static str {
        "discovery"
    }

    async fn handle(&self, action: &NodeAction, ctx: &EpicContext) {
        match action {
            NodeAction::DiscoverMoreNodes => match &self.discovery {
                NodeDiscovery::Static(nodes) => {
                    for node in nodes {
                        announce(&self.seen, node.clone(), ctx);
                    }
                }
                NodeDiscovery::NodeFinder { url } => {
                    let url = url.clone();
                    let http = self.http.clone();
                    let seen = self.seen.clone();
                    let ctx = ctx.clone();
                    tokio::spawn(async move {
                        match http.load_content(&url).await {
                            Ok(body) => {
                                let nodes = parse_node_list(
                                    &body,
                                    ctx.settings.default_port,
                                    ctx.settings.use_ssl,
                                );
                                info!(url = %url, found = nodes.len(), "Node finder answered");
                                if nodes.is_empty() {
                                    ctx.dispatch(NodeAction::DiscoverMoreNodesError {
                                        reason: format!("{url} returned no nodes"),
                                    });
                                }
                                for node in nodes {
                                    announce(&seen, node, &ctx);
                                }
                            }
                            Err(e) => {
                                warn!(url = %url, error = %e, "Node finder failed");
                                ctx.dispatch(NodeAction::DiscoverMoreNodesError {
                                    reason: e.to_string(),
                                });
                            }
                        }
                    });
                }
            },
            NodeAction::WebSocketEvent {
                node,
                status: WebSocketStatus::Connected,
            } => {
                ctx.dispatch(NodeAction::GetUniverseConfigRequest { node: node.clone() });
                ctx.dispatch(NodeAction::GetNodeInfoRequest { node: node.clone() });
            }
            NodeAction::GetUniverseConfigResult { node, config } => {
                if (ctx.predicate)(config) {
                    ctx.dispatch(NodeAction::GetLivePeersRequest { node: node.clone() });
                } else {
                    warn!(node = %node, expected = ctx.settings.magic, actual = config.magic, "Node is in another universe");
                    ctx.dispatch(NodeAction::NodeUniverseMismatch {
                        node: node.clone(),
                        expected: ctx.settings.magic,
                        actual: config.magic,
                    });
                }
            }
            NodeAction::GetLivePeersResult { peers, .. } => {
                for peer in peers {
                    announce(&self.seen, peer.clone(), ctx);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RpcError;
    use crate::network::controller::EngineSettings;
    use crate::network::epics::test_support::{apply, context};
    use crate::network::node::UniverseConfig;

    struct StaticBody(&'static str);

    #[async_trait]
    impl HttpClient for StaticBody {
        async fn load_content(&self, _url: &str) -> Result<String, RpcError> {
            Ok(self.0.to_string())
        }
    }

    fn node(host: &str) -> RadixNode {
        RadixNode::new(host, 8080, false)
    }

    #[test]
    fn test_parse_node_list() {
        let nodes = parse_node_list("a.example, b.example:9000\n\n c.example", 8080, true);
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[1], RadixNode::new("b.example", 9000, true));
    }

    #[tokio::test]
    async fn test_duplicate_peers_collapse_to_one_add_node() {
        let settings = EngineSettings::new(7, NodeDiscovery::Static(vec![node("a")]));
        let (ctx, mut rx, state) = context(settings.clone());
        let epic = DiscoveryEpic::new(settings.discovery.clone(), Arc::new(StaticBody("")));

        epic.handle(&NodeAction::DiscoverMoreNodes, &ctx).await;
        let added = rx.try_recv().unwrap();
        assert_eq!(added, NodeAction::AddNode { node: node("a"), info: None });
        apply(&state, &added);

        let peers = NodeAction::GetLivePeersResult {
            node: node("a"),
            peers: vec![node("a"), node("b"), node("b"), node("c")],
        };
        epic.handle(&peers, &ctx).await;
        epic.handle(&peers, &ctx).await;
        let mut added = Vec::new();
        while let Ok(action) = rx.try_recv() {
            added.push(action);
        }
        assert_eq!(
            added,
            vec![
                NodeAction::AddNode { node: node("b"), info: None },
                NodeAction::AddNode { node: node("c"), info: None },
            ]
        );
    }

    #[tokio::test]
    async fn test_universe_mismatch_is_reported() {
        let settings = EngineSettings::new(7, NodeDiscovery::Static(vec![]));
        let (ctx, mut rx, _state) = context(settings.clone());
        let epic = DiscoveryEpic::new(settings.discovery.clone(), Arc::new(StaticBody("")));

        epic.handle(
            &NodeAction::GetUniverseConfigResult {
                node: node("a"),
                config: UniverseConfig::new(9, "other", 8080),
            },
            &ctx,
        )
        .await;
        assert_eq!(
            rx.try_recv().unwrap(),
            NodeAction::NodeUniverseMismatch { node: node("a"), expected: 7, actual: 9 }
        );

        epic.handle(
            &NodeAction::GetUniverseConfigResult {
                node: node("a"),
                config: UniverseConfig::new(7, "ours", 8080),
            },
            &ctx,
        )
        .await;
        assert_eq!(rx.try_recv().unwrap(), NodeAction::GetLivePeersRequest { node: node("a") });
    }

    #[tokio::test]
    async fn test_node_finder() {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            let discovery = NodeDiscovery::NodeFinder { url: "http://finder".to_string() };
            let settings = EngineSettings::new(7, discovery.clone());
            let (ctx, mut rx, _state) = context(settings);
            let epic = DiscoveryEpic::new(discovery, Arc::new(StaticBody("x.example y.example:1")));
            epic.handle(&NodeAction::DiscoverMoreNodes, &ctx).await;
            let first = rx.recv().await.unwrap();
            let second = rx.recv().await.unwrap();
            assert_eq!(first, NodeAction::AddNode { node: node("x.example"), info: None });
            assert_eq!(second, NodeAction::AddNode { node: RadixNode::new("y.example", 1, false), info: None });
        })
        .await
        .expect("Test timed out");
    }
}
