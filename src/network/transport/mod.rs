//! Transport seams
//!
//! The engine only needs text frames in and out of a node, plus plain HTTP
//! GETs for bootstrap. Both are traits so tests can swap in an in-process
//! node.

pub mod http;
pub mod tungstenite;

pub use self::http::ReqwestHttpClient;
pub use self::tungstenite::TungsteniteConnector;

use super::node::RadixNode;
use crate::error::RpcError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// An open socket as a pair of text channels. Dropping `outgoing` closes the
/// socket; `incoming` ends once the remote side is gone.
#[derive(Debug)]
pub struct WebSocketChannel {
    pub outgoing: mpsc::Sender<String>,
    pub incoming: mpsc::Receiver<String>,
}

#[async_trait]
pub trait WebSocketConnector: Send + Sync + 'static {
    async fn connect(&self, node: &RadixNode) -> Result<WebSocketChannel, RpcError>;
}

#[async_trait]
pub trait HttpClient: Send + Sync + 'static {
    async fn load_content(&self, url: &str) -> Result<String, RpcError>;
}
