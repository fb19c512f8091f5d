//! Events flowing through the network engine
//!
//! A closed set: every epic and reducer matches on [`NodeAction`]
//! exhaustively or ignores what it does not own.

use super::atom_status::AtomStatus;
use super::node::{NodeInfo, RadixNode, UniverseConfig, WebSocketStatus};
use crate::atom::Atom;
use crate::error::SubmissionError;
use crate::primitives::RadixAddress;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationKind {
    Store,
    Delete,
    /// No atom; the node has caught up with its head for the query.
    Head,
}

/// One update from an atom subscription.
///
/// Soft observations come from our own submissions: the node reported the
/// atom stored but no subscription has confirmed it yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomObservation {
    pub kind: ObservationKind,
    pub atom: Option<Atom>,
    pub is_soft: bool,
    pub is_head: bool,
    pub received_at: DateTime<Utc>,
}

impl AtomObservation {
    pub fn stored(atom: Atom, is_head: bool) -> Self {
        AtomObservation {
            kind: ObservationKind::Store,
            atom: Some(atom),
            is_soft: false,
            is_head,
            received_at: Utc::now(),
        }
    }

    pub fn deleted(atom: Atom, is_head: bool) -> Self {
        AtomObservation {
            kind: ObservationKind::Delete,
            atom: Some(atom),
            is_soft: false,
            is_head,
            received_at: Utc::now(),
        }
    }

    pub fn soft_stored(atom: Atom) -> Self {
        AtomObservation {
            kind: ObservationKind::Store,
            atom: Some(atom),
            is_soft: true,
            is_head: false,
            received_at: Utc::now(),
        }
    }

    pub fn head() -> Self {
        AtomObservation {
            kind: ObservationKind::Head,
            atom: None,
            is_soft: false,
            is_head: true,
            received_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeAction {
    // Discovery
    DiscoverMoreNodes,
    DiscoverMoreNodesError {
        reason: String,
    },
    AddNode {
        node: RadixNode,
        info: Option<NodeInfo>,
    },
    NodeUniverseMismatch {
        node: RadixNode,
        expected: i32,
        actual: i32,
    },

    // Connectivity
    ConnectWebSocket {
        node: RadixNode,
    },
    CloseWebSocket {
        node: RadixNode,
    },
    WebSocketEvent {
        node: RadixNode,
        status: WebSocketStatus,
    },

    // Node RPC
    GetNodeInfoRequest {
        node: RadixNode,
    },
    GetNodeInfoResult {
        node: RadixNode,
        info: NodeInfo,
    },
    GetUniverseConfigRequest {
        node: RadixNode,
    },
    GetUniverseConfigResult {
        node: RadixNode,
        config: UniverseConfig,
    },
    GetLivePeersRequest {
        node: RadixNode,
    },
    GetLivePeersResult {
        node: RadixNode,
        peers: Vec<RadixNode>,
    },
    RpcFailure {
        node: RadixNode,
        method: String,
        reason: String,
    },

    // Routing
    FindANodeRequest {
        uuid: Uuid,
    },
    FindANodeResult {
        uuid: Uuid,
        node: RadixNode,
    },

    // Atom submission
    SubmitAtomRequest {
        uuid: Uuid,
        atom: Atom,
    },
    SubmitAtomSend {
        uuid: Uuid,
        atom: Atom,
        node: RadixNode,
    },
    SubmitAtomStatus {
        uuid: Uuid,
        atom: Atom,
        node: RadixNode,
        status: AtomStatus,
        data: Option<serde_json::Value>,
    },
    SubmitAtomCompleted {
        uuid: Uuid,
        atom: Atom,
        node: Option<RadixNode>,
        result: Result<(), SubmissionError>,
    },
    SubmitAtomCancel {
        uuid: Uuid,
    },

    // Atom fetching
    FetchAtomsRequest {
        uuid: Uuid,
        address: RadixAddress,
    },
    FetchAtomsSubscribe {
        uuid: Uuid,
        address: RadixAddress,
        node: RadixNode,
    },
    FetchAtomsObservation {
        uuid: Uuid,
        address: RadixAddress,
        node: RadixNode,
        observation: AtomObservation,
    },
    FetchAtomsCancel {
        uuid: Uuid,
        address: RadixAddress,
    },
}

impl NodeAction {
    pub fn name(&self) -> &'static str {
        match self {
            NodeAction::DiscoverMoreNodes => "DiscoverMoreNodes",
            NodeAction::DiscoverMoreNodesError { .. } => "DiscoverMoreNodesError",
            NodeAction::AddNode { .. } => "AddNode",
            NodeAction::NodeUniverseMismatch { .. } => "NodeUniverseMismatch",
            NodeAction::ConnectWebSocket { .. } => "ConnectWebSocket",
            NodeAction::CloseWebSocket { .. } => "CloseWebSocket",
            NodeAction::WebSocketEvent { .. } => "WebSocketEvent",
            NodeAction::GetNodeInfoRequest { .. } => "GetNodeInfoRequest",
            NodeAction::GetNodeInfoResult { .. } => "GetNodeInfoResult",
            NodeAction::GetUniverseConfigRequest { .. } => "GetUniverseConfigRequest",
            NodeAction::GetUniverseConfigResult { .. } => "GetUniverseConfigResult",
            NodeAction::GetLivePeersRequest { .. } => "GetLivePeersRequest",
            NodeAction::GetLivePeersResult { .. } => "GetLivePeersResult",
            NodeAction::RpcFailure { .. } => "RpcFailure",
            NodeAction::FindANodeRequest { .. } => "FindANodeRequest",
            NodeAction::FindANodeResult { .. } => "FindANodeResult",
            NodeAction::SubmitAtomRequest { .. } => "SubmitAtomRequest",
            NodeAction::SubmitAtomSend { .. } => "SubmitAtomSend",
            NodeAction::SubmitAtomStatus { .. } => "SubmitAtomStatus",
            NodeAction::SubmitAtomCompleted { .. } => "SubmitAtomCompleted",
            NodeAction::SubmitAtomCancel { .. } => "SubmitAtomCancel",
            NodeAction::FetchAtomsRequest { .. } => "FetchAtomsRequest",
            NodeAction::FetchAtomsSubscribe { .. } => "FetchAtomsSubscribe",
            NodeAction::FetchAtomsObservation { .. } => "FetchAtomsObservation",
            NodeAction::FetchAtomsCancel { .. } => "FetchAtomsCancel",
        }
    }

    /// The node an action concerns, when it concerns exactly one.
    pub fn node(&self) -> Option<&RadixNode> {
        match self {
            NodeAction::AddNode { node, .. }
            | NodeAction::NodeUniverseMismatch { node, .. }
            | NodeAction::ConnectWebSocket { node }
            | NodeAction::CloseWebSocket { node }
            | NodeAction::WebSocketEvent { node, .. }
            | NodeAction::GetNodeInfoRequest { node }
            | NodeAction::GetNodeInfoResult { node, .. }
            | NodeAction::GetUniverseConfigRequest { node }
            | NodeAction::GetUniverseConfigResult { node, .. }
            | NodeAction::GetLivePeersRequest { node }
            | NodeAction::GetLivePeersResult { node, .. }
            | NodeAction::RpcFailure { node, .. }
            | NodeAction::FindANodeResult { node, .. }
            | NodeAction::SubmitAtomSend { node, .. }
            | NodeAction::SubmitAtomStatus { node, .. }
            | NodeAction::FetchAtomsSubscribe { node, .. }
            | NodeAction::FetchAtomsObservation { node, .. } => Some(node),
            NodeAction::SubmitAtomCompleted { node, .. } => node.as_ref(),
            _ => None,
        }
    }

    /// The request id an action belongs to, if any.
    pub fn uuid(&self) -> Option<Uuid> {
        match self {
            NodeAction::FindANodeRequest { uuid }
            | NodeAction::FindANodeResult { uuid, .. }
            | NodeAction::SubmitAtomRequest { uuid, .. }
            | NodeAction::SubmitAtomSend { uuid, .. }
            | NodeAction::SubmitAtomStatus { uuid, .. }
            | NodeAction::SubmitAtomCompleted { uuid, .. }
            | NodeAction::SubmitAtomCancel { uuid }
            | NodeAction::FetchAtomsRequest { uuid, .. }
            | NodeAction::FetchAtomsSubscribe { uuid, .. }
            | NodeAction::FetchAtomsObservation { uuid, .. }
            | NodeAction::FetchAtomsCancel { uuid, .. } => Some(*uuid),
            _ => None,
        }
    }
}
