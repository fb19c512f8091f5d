use super::actions::NodeAction;
use super::node::WebSocketStatus;
use super::state::RadixNetworkState;
use tracing::debug;

/// Folds one action into the network state. Only per-node facts change here;
/// request routing lives in the epics.
pub fn reduce(mut state: RadixNetworkState, action: &NodeAction) -> RadixNetworkState {
    match action {
        NodeAction::AddNode { node, info } => {
            let entry = state.entry(node);
            if info.is_some() {
                entry.info = info.clone();
            }
        }
        NodeAction::WebSocketEvent { node, status } => {
            let entry = state.entry(node);
            if entry.status != *status {
                debug!(node = %node, from = ?entry.status, to = ?status, "Node status changed");
            }
            entry.status = *status;
            if *status == WebSocketStatus::Connected {
                entry.last_error = None;
            }
        }
        NodeAction::GetNodeInfoResult { node, info } => {
            state.entry(node).info = Some(info.clone());
        }
        NodeAction::GetUniverseConfigResult { node, config } => {
            state.entry(node).universe = Some(config.clone());
        }
        NodeAction::RpcFailure { node, reason, .. } => {
            if let Some(entry) = state.get_mut(node) {
                entry.last_error = Some(reason.clone());
            }
        }
        _ => {}
    }
    state
}
