use super::{Epic, EpicContext};
use crate::network::actions::NodeAction;
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Routes requests to a node: a connected suitable node if there is one,
/// otherwise connect to candidates, otherwise discover more nodes. Requests
/// wait here until one of those pans out.
pub struct FindANodeEpic {
    pending: Mutex<Vec<Uuid>>,
}

impl FindANodeEpic {
    pub fn new() -> Self {
        FindANodeEpic {
            pending: Mutex::new(Vec::new()),
        }
    }

    fn try_resolve(&self, ctx: &EpicContext, fresh_request: bool) {
        if self.pending.lock().is_empty() {
            return;
        }
        let state = ctx.state();
        if let Some(found) = state.suitable(&ctx.predicate).next() {
            let waiting: Vec<Uuid> = self.pending.lock().drain(..).collect();
            for uuid in waiting {
                debug!(uuid = %uuid, node = %found.node, "Found a node");
                ctx.dispatch(NodeAction::FindANodeResult {
                    uuid,
                    node: found.node.clone(),
                });
            }
            return;
        }

        let busy = state.in_progress().count();
        let slots = ctx.settings.max_simultaneous_connections.saturating_sub(busy);
        let candidates: Vec<_> = state
            .candidates(&ctx.predicate, fresh_request)
            .take(slots)
            .map(|n| n.node.clone())
            .collect();
        if !candidates.is_empty() {
            for node in candidates {
                ctx.dispatch(NodeAction::ConnectWebSocket { node });
            }
        } else if busy == 0 {
            ctx.dispatch(NodeAction::DiscoverMoreNodes);
        }
    }
}

impl Default for FindANodeEpic {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Epic for FindANodeEpic {
    fn name(&self) -> &'static str {
        "find-a-node"
    }

    async fn handle(&self, action: &NodeAction, ctx: &EpicContext) {
        match action {
            NodeAction::FindANodeRequest { uuid } => {
                {
                    let mut pending = self.pending.lock();
                    if !pending.contains(uuid) {
                        pending.push(*uuid);
                    }
                }
                self.try_resolve(ctx, true);
            }
            NodeAction::SubmitAtomCancel { uuid }
            | NodeAction::SubmitAtomCompleted { uuid, .. }
            | NodeAction::FetchAtomsCancel { uuid, .. } => {
                self.pending.lock().retain(|p| p != uuid);
            }
            NodeAction::AddNode { .. }
            | NodeAction::WebSocketEvent { .. }
            | NodeAction::GetUniverseConfigResult { .. }
            | NodeAction::NodeUniverseMismatch { .. } => self.try_resolve(ctx, false),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::controller::EngineSettings;
    use crate::network::epics::test_support::{apply, context};
    use crate::network::epics::NodeDiscovery;
    use crate::network::node::{RadixNode, UniverseConfig, WebSocketStatus};

    #[tokio::test]
    async fn test_discovers_then_connects_then_resolves() {
        let (ctx, mut rx, state) = context(EngineSettings::new(5, NodeDiscovery::Static(vec![])));
        let epic = FindANodeEpic::new();
        let uuid = Uuid::new_v4();
        let node = RadixNode::new("a", 1, false);

        epic.handle(&NodeAction::FindANodeRequest { uuid }, &ctx).await;
        assert_eq!(rx.try_recv().unwrap(), NodeAction::DiscoverMoreNodes);

        let add = NodeAction::AddNode { node: node.clone(), info: None };
        apply(&state, &add);
        epic.handle(&add, &ctx).await;
        assert_eq!(rx.try_recv().unwrap(), NodeAction::ConnectWebSocket { node: node.clone() });

        let connected = NodeAction::WebSocketEvent { node: node.clone(), status: WebSocketStatus::Connected };
        apply(&state, &connected);
        epic.handle(&connected, &ctx).await;
        assert!(rx.try_recv().is_err());

        let universe = NodeAction::GetUniverseConfigResult {
            node: node.clone(),
            config: UniverseConfig::new(5, "u", 1),
        };
        apply(&state, &universe);
        epic.handle(&universe, &ctx).await;
        assert_eq!(rx.try_recv().unwrap(), NodeAction::FindANodeResult { uuid, node });

        // Resolved requests are forgotten.
        epic.handle(&universe, &ctx).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cancelled_request_is_dropped() {
        let (ctx, mut rx, _state) = context(EngineSettings::new(5, NodeDiscovery::Static(vec![])));
        let epic = FindANodeEpic::new();
        let uuid = Uuid::new_v4();
        epic.handle(&NodeAction::FindANodeRequest { uuid }, &ctx).await;
        let _ = rx.try_recv();
        epic.handle(&NodeAction::SubmitAtomCancel { uuid }, &ctx).await;
        assert!(epic.pending.lock().is_empty());
    }
}
