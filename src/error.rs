//! Error types for the Radix client
//!
//! Each layer owns a focused error enum; [`RadixError`] wraps them all so
//! application code can use a single `Result` alias.

use crate::network::atom_status::AtomStatus;
use crate::primitives::{RadixAddress, Rri, UInt256};
use thiserror::Error;

/// Malformed primitive input: addresses, identifiers, amounts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrimitiveError {
    #[error("Invalid base58 encoding: {0}")]
    InvalidBase58(String),
    #[error("Invalid address length: expected {expected} bytes, got {actual}")]
    InvalidAddressLength { expected: usize, actual: usize },
    #[error("Address checksum mismatch")]
    InvalidChecksum,
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("Resource identifier must have the form /address/name, got {0:?}")]
    InvalidRri(String),
    #[error("Invalid resource name {0:?}")]
    InvalidRriName(String),
    #[error("Invalid decimal amount {0:?}")]
    InvalidDecimal(String),
    #[error("Arithmetic overflow")]
    Overflow,
    #[error("Arithmetic underflow")]
    Underflow,
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
    #[error("Expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Canonical codec failures. Decoding fails closed: no coercion between types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DsonError {
    #[error("Unexpected end of input at offset {0}")]
    Truncated(usize),
    #[error("Trailing bytes after value at offset {0}")]
    TrailingBytes(usize),
    #[error("Unsupported CBOR major type {major} (additional info {info})")]
    UnsupportedCbor { major: u8, info: u8 },
    #[error("Unknown byte-string tag 0x{0:02x}")]
    UnknownTag(u8),
    #[error("Empty byte string carries no type tag")]
    MissingTag,
    #[error("Type mismatch for {field}: expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("Missing field {0}")]
    MissingField(String),
    #[error("Unknown serializer {0:?}")]
    UnknownSerializer(String),
    #[error("Expected serializer {expected:?}, found {found:?}")]
    SerializerMismatch { expected: String, found: String },
    #[error("Non-canonical encoding at offset {0}")]
    NonCanonical(usize),
    #[error("Map keys must be text strings")]
    NonStringKey,
    #[error("Duplicate map key {0:?}")]
    DuplicateKey(String),
    #[error("Invalid UTF-8 in text string")]
    InvalidUtf8,
    #[error("JSON string {0:?} has no recognised type prefix")]
    UnknownJsonPrefix(String),
    #[error("Unsupported JSON value: {0}")]
    UnsupportedJson(String),
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error(transparent)]
    Primitive(#[from] PrimitiveError),
}

/// Key handling and signature failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("Invalid secret key: {0}")]
    InvalidSecretKey(String),
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Signature verification failed")]
    VerificationFailed,
    #[error("Signing failed: {0}")]
    SigningFailed(String),
}

/// Errors returned synchronously while mapping a user action to particles.
/// These never enter the network engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageActionError {
    #[error("Amount must be greater than zero")]
    ZeroAmount,
    #[error("Amount {amount} is not a multiple of granularity {granularity}")]
    NotMultipleOfGranularity {
        amount: UInt256,
        granularity: UInt256,
    },
    #[error("Granularity must be greater than zero")]
    ZeroGranularity,
    #[error("Action signer {signer} does not match active address {active}")]
    SignerMismatch {
        signer: RadixAddress,
        active: RadixAddress,
    },
    #[error("Insufficient funds for {token}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        token: Rri,
        balance: UInt256,
        requested: UInt256,
    },
    #[error("Unknown token {0}")]
    UnknownToken(Rri),
    #[error("{action} of {token} requires {required} permission, held by {holder:?}")]
    PermissionDenied {
        token: Rri,
        action: &'static str,
        required: &'static str,
        holder: Option<RadixAddress>,
    },
    #[error("Token {0} has a fixed supply")]
    FixedSupply(Rri),
    #[error("Resource identifier {0} is already claimed")]
    RriAlreadyClaimed(Rri),
    #[error("Invalid action: {0}")]
    Invalid(String),
}

/// Proof-of-work search failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PowError {
    #[error("Proof-of-work search cancelled after {0} attempts")]
    Cancelled(u64),
    #[error("Nonce space exhausted")]
    Exhausted,
    #[error("Leading zero target {0} exceeds 256 bits")]
    TargetTooLarge(u32),
    #[error("Proof-of-work task failed: {0}")]
    TaskFailed(String),
}

/// Transport and JSON-RPC failures, local to one node interaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    #[error("WebSocket is not connected")]
    NotConnected,
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Send failed: {0}")]
    SendFailed(String),
    #[error("Request {method} timed out")]
    Timeout { method: String },
    #[error("Node returned error {code}: {message}")]
    Remote { code: i64, message: String },
    #[error("Failed to decode RPC message: {0}")]
    Decode(String),
    #[error("Subscriber id {0} is already in use")]
    SubscriberIdCollision(String),
    #[error("Connection closed while waiting for a response")]
    Closed,
    #[error("HTTP request failed: {0}")]
    Http(String),
}

/// Terminal failure of a submitted atom.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmissionError {
    #[error("Atom rejected by ledger: {status:?}")]
    Rejected {
        status: AtomStatus,
        data: Option<serde_json::Value>,
    },
    #[error("Submission transport failure: {0}")]
    Transport(String),
    #[error("Submission cancelled")]
    Cancelled,
    #[error("Submission already resolved")]
    AlreadyResolved,
}

/// Projection merge failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    #[error("Conflicting granularity for {address} {token}")]
    ConflictingBalance { address: RadixAddress, token: Rri },
    #[error("Particle {0} present in both projections")]
    DuplicateParticle(String),
    #[error("Conflicting token definitions for {0}")]
    ConflictingDefinition(Rri),
}

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum RadixError {
    #[error(transparent)]
    Primitive(#[from] PrimitiveError),
    #[error(transparent)]
    Dson(#[from] DsonError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Stage(#[from] StageActionError),
    #[error(transparent)]
    Pow(#[from] PowError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Network engine stopped")]
    EngineStopped,
    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, RadixError>;
