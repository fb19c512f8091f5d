//! The network engine
//!
//! Actions go in through a single dispatch channel, the reducer folds them into
//! [`RadixNetworkState`], and epics react by dispatching more actions.
//!
//! ## Layout
//! - [`actions`] - the closed [`NodeAction`] set
//! - [`reducer`] - per-node state updates
//! - [`controller`] - the state-owning task and the action bus
//! - [`epics`] - discovery, sockets, routing, submission, fetching
//! - [`jsonrpc`] - JSON-RPC client over one socket
//! - [`websockets`] - listener-counted socket registry
//! - [`transport`] - WebSocket and HTTP seams

pub mod actions;
pub mod atom_status;
pub mod controller;
pub mod epics;
pub mod jsonrpc;
pub mod node;
pub mod reducer;
pub mod state;
pub mod transport;
pub mod websockets;

pub use actions::{AtomObservation, NodeAction, ObservationKind};
pub use atom_status::{AtomStatus, PendingSubmission, Resolution};
pub use controller::{EngineSettings, RadixNetworkController};
pub use epics::{ActionDispatcher, Epic, EpicContext, NodeDiscovery};
pub use jsonrpc::RadixJsonRpcClient;
pub use node::{NodeInfo, RadixNode, RadixNodeState, UniverseConfig, WebSocketStatus};
pub use state::{is_universe_suitable, RadixNetworkState, UniversePredicate};
pub use transport::{
    HttpClient, ReqwestHttpClient, TungsteniteConnector, WebSocketChannel, WebSocketConnector,
};
pub use websockets::{ConnectionLease, WebSockets};
