use super::node::{RadixNode, RadixNodeState, UniverseConfig, WebSocketStatus};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Decides whether a node's reported universe may serve local requests.
pub type UniversePredicate = Arc<dyn Fn(&UniverseConfig) -> bool + Send + Sync>;

/// Accepts nodes whose universe carries the expected magic.
pub fn is_universe_suitable(expected_magic: i32) -> UniversePredicate {
    Arc::new(move |config: &UniverseConfig| config.magic == expected_magic)
}

/// Snapshot of every known node. Owned by the reducer task; everyone else
/// sees clones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RadixNetworkState {
    nodes: BTreeMap<RadixNode, RadixNodeState>,
}

impl RadixNetworkState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &RadixNodeState> {
        self.nodes.values()
    }

    pub fn get(&self, node: &RadixNode) -> Option<&RadixNodeState> {
        self.nodes.get(node)
    }

    pub(crate) fn get_mut(&mut self, node: &RadixNode) -> Option<&mut RadixNodeState> {
        self.nodes.get_mut(node)
    }

    pub fn contains(&self, node: &RadixNode) -> bool {
        self.nodes.contains_key(node)
    }

    pub(crate) fn entry(&mut self, node: &RadixNode) -> &mut RadixNodeState {
        self.nodes
            .entry(node.clone())
            .or_insert_with(|| RadixNodeState::new(node.clone()))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn with_status(&self, status: WebSocketStatus) -> impl Iterator<Item = &RadixNodeState> {
        self.nodes.values().filter(move |n| n.status == status)
    }

    /// Connected nodes whose universe is known and accepted.
    pub fn suitable<'a>(
        &'a self,
        predicate: &'a UniversePredicate,
    ) -> impl Iterator<Item = &'a RadixNodeState> + 'a {
        self.with_status(WebSocketStatus::Connected)
            .filter(move |n| n.universe.as_ref().map(|u| predicate(u)).unwrap_or(false))
    }

    /// Nodes that could be connected to: idle and not known to be in another
    /// universe. Failed nodes count only when `include_failed` is set.
    pub fn candidates<'a>(
        &'a self,
        predicate: &'a UniversePredicate,
        include_failed: bool,
    ) -> impl Iterator<Item = &'a RadixNodeState> + 'a {
        self.nodes.values().filter(move |n| {
            let idle = match n.status {
                WebSocketStatus::Disconnected => true,
                WebSocketStatus::Failed => include_failed,
                _ => false,
            };
            idle && n.universe.as_ref().map(|u| predicate(u)).unwrap_or(true)
        })
    }

    /// Nodes whose connection or universe check is still in progress.
    pub fn in_progress<'a>(&'a self) -> impl Iterator<Item = &'a RadixNodeState> + 'a {
        self.nodes.values().filter(|n| match n.status {
            WebSocketStatus::Connecting => true,
            WebSocketStatus::Connected => n.universe.is_none(),
            _ => false,
        })
    }
}
