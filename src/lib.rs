//! radix-client - A client library for the Radix ledger
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Data Model
//! - [`primitives`] - Amounts, hashes, addresses and resource identifiers
//! - [`dson`] - Canonical encoding used for hashing and signing
//! - [`particles`] - Particle kinds, spins and particle groups
//! - [`atom`] - Unsigned and signed atoms
//!
//! ## Chemistry
//! - [`chemistry`] - User actions to particles and back
//!
//! ## Proof-of-Work & Signing
//! - [`crypto`] - secp256k1 keys, signatures and identities
//! - [`pow`] - Nonce search and verification
//! - [`signing`] - Atom finalization
//!
//! ## Networking & State
//! - [`network`] - Node discovery, connections, submission and fetching
//! - [`store`] - Atom store and ledger projections
//! - [`client`] - The client context tying it together
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//! - [`logging`] - Tracing setup

#![forbid(unsafe_code)]

// ============================================================================
// Data Model
// ============================================================================
pub mod atom;
pub mod dson;
pub mod particles;
pub mod primitives;

// ============================================================================
// Chemistry
// ============================================================================
pub mod chemistry;

// ============================================================================
// Cryptography, Proof-of-Work & Signing
// ============================================================================
pub mod crypto;
pub mod pow;
pub mod signing;

// ============================================================================
// Networking & State
// ============================================================================
pub mod client;
pub mod network;
pub mod store;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
pub mod logging;

pub use atom::{Atom, UnsignedAtom};
pub use chemistry::{ExecutedAction, ExecutedTransaction, TransactionBuilder, UserAction};
pub use client::{AtomPull, RadixClient, Submission, SubmissionUpdate};
pub use config::{load_config, ClientConfig};
pub use crypto::{KeyPair, LocalIdentity, RadixIdentity};
pub use error::{RadixError, Result};
pub use network::{AtomStatus, RadixNetworkController};
pub use primitives::{Euid, Hash256, RadixAddress, Rri, UInt256};
pub use store::{InMemoryAtomStore, TokenBalanceState, TokenDefinitionsState};
