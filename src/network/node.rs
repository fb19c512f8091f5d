//! Nodes and what the engine knows about each of them

use crate::dson::{json::PREFIX_STRING, DsonSerializable, DsonValue, MapBuilder, MapReader, Output};
use crate::error::{DsonError, RpcError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const UNIVERSE: &str = "radix.universe";

/// A node endpoint. Equality is by endpoint, so the same host reported by
/// several peers is one node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RadixNode {
    pub host: String,
    pub port: u16,
    pub ssl: bool,
}

impl RadixNode {
    pub fn new(host: impl Into<String>, port: u16, ssl: bool) -> Self {
        RadixNode {
            host: host.into(),
            port,
            ssl,
        }
    }

    /// Parses `host[:port]`, using `default_port` when none is given.
    pub fn parse(s: &str, default_port: u16, ssl: bool) -> Result<Self, RpcError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(RpcError::ConnectionFailed("empty node address".to_string()));
        }
        match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| RpcError::ConnectionFailed(format!("bad port in {s:?}")))?;
                Ok(RadixNode::new(host, port, ssl))
            }
            _ => Ok(RadixNode::new(s, default_port, ssl)),
        }
    }

    pub fn websocket_url(&self) -> String {
        let scheme = if self.ssl { "wss" } else { "ws" };
        format!("{}://{}:{}/rpc", scheme, self.host, self.port)
    }

    pub fn http_url(&self, path: &str) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{}://{}:{}{}", scheme, self.host, self.port, path)
    }
}

impl fmt::Display for RadixNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebSocketStatus {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Failed,
}

/// Ledger parameters a node reports; compared against the local universe to
/// decide whether the node may serve requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniverseConfig {
    pub magic: i32,
    pub name: String,
    pub description: String,
    pub port: u16,
    pub timestamp: i64,
    pub planck: i64,
}

impl UniverseConfig {
    pub fn new(magic: i32, name: impl Into<String>, port: u16) -> Self {
        UniverseConfig {
            magic,
            name: name.into(),
            description: String::new(),
            port,
            timestamp: 0,
            planck: 60_000,
        }
    }
}

impl DsonSerializable for UniverseConfig {
    fn to_dson(&self, output: Output) -> DsonValue {
        MapBuilder::new(UNIVERSE, output)
            .field("magic", i64::from(self.magic))
            .field("name", self.name.as_str())
            .field("description", self.description.as_str())
            .field("port", i64::from(self.port))
            .field("timestamp", self.timestamp)
            .field("planck", self.planck)
            .build()
    }

    fn from_dson(value: &DsonValue) -> Result<Self, DsonError> {
        let reader = MapReader::expect(value, UNIVERSE)?;
        let magic = i32::try_from(reader.int("magic")?).map_err(|_| DsonError::InvalidValue {
            field: "magic".to_string(),
            reason: "out of range".to_string(),
        })?;
        let port = u16::try_from(reader.int("port")?).map_err(|_| DsonError::InvalidValue {
            field: "port".to_string(),
            reason: "out of range".to_string(),
        })?;
        Ok(UniverseConfig {
            magic,
            name: reader.text("name")?.to_string(),
            description: reader
                .optional("description")
                .map(|v| v.as_text("description").map(str::to_string))
                .transpose()?
                .unwrap_or_default(),
            port,
            timestamp: reader.optional("timestamp").map(|v| v.as_int("timestamp")).transpose()?.unwrap_or(0),
            planck: reader.optional("planck").map(|v| v.as_int("planck")).transpose()?.unwrap_or(60_000),
        })
    }
}

/// Whatever `Network.getInfo` returned. Only a few fields are interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub raw: Value,
}

impl NodeInfo {
    pub fn new(raw: Value) -> Self {
        NodeInfo { raw }
    }

    pub fn agent(&self) -> Option<String> {
        self.raw
            .pointer("/system/agent/name")
            .and_then(Value::as_str)
            .map(|s| strip_string_prefix(s).to_string())
    }

    pub fn universe_magic(&self) -> Option<i64> {
        self.raw.pointer("/system/key/magic").and_then(Value::as_i64)
    }
}

pub(crate) fn strip_string_prefix(s: &str) -> &str {
    s.strip_prefix(PREFIX_STRING).unwrap_or(s)
}

/// Extracts a peer endpoint from one `Network.getLivePeers` entry. Accepts
/// both `{host: {ip, port}}` and flat `{ip, port}` forms.
pub fn peer_from_json(value: &Value, default_port: u16, ssl: bool) -> Option<RadixNode> {
    let host = value.get("host").filter(|h| h.is_object()).unwrap_or(value);
    let ip = host.get("ip").and_then(Value::as_str).map(strip_string_prefix)?;
    if ip.is_empty() {
        return None;
    }
    let port = host
        .get("port")
        .and_then(Value::as_u64)
        .and_then(|p| u16::try_from(p).ok())
        .unwrap_or(default_port);
    Some(RadixNode::new(ip, port, ssl))
}

#[derive(Debug, Clone, PartialEq)]
pub struct RadixNodeState {
    pub node: RadixNode,
    pub status: WebSocketStatus,
    pub info: Option<NodeInfo>,
    pub universe: Option<UniverseConfig>,
    pub last_error: Option<String>,
}

impl RadixNodeState {
    pub fn new(node: RadixNode) -> Self {
        RadixNodeState {
            node,
            status: WebSocketStatus::Disconnected,
            info: None,
            universe: None,
            last_error: None,
        }
    }
}
