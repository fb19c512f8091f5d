//! Radix addresses
//!
//! An address is `magic_byte ‖ compressed_public_key ‖ checksum`, where the
//! checksum is the first four bytes of the double SHA-256 of the preceding 34
//! bytes. The textual form is base58.

use super::hash::{Euid, Hash256};
use crate::error::PrimitiveError;
use secp256k1::constants::PUBLIC_KEY_SIZE;
use secp256k1::PublicKey;
use std::fmt;
use std::str::FromStr;

const CHECKSUM_LEN: usize = 4;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RadixAddress {
    magic_byte: u8,
    public_key: [u8; PUBLIC_KEY_SIZE],
}

impl RadixAddress {
    /// Total encoded length in bytes.
    pub const LEN: usize = 1 + PUBLIC_KEY_SIZE + CHECKSUM_LEN;

    pub fn new(magic: i32, public_key: &PublicKey) -> Self {
        RadixAddress {
            magic_byte: (magic & 0xff) as u8,
            public_key: public_key.serialize(),
        }
    }

    /// Builds an address from raw compressed key bytes, validating the key.
    pub fn from_public_key_bytes(magic: i32, bytes: &[u8]) -> Result<Self, PrimitiveError> {
        let key = PublicKey::from_slice(bytes)
            .map_err(|e| PrimitiveError::InvalidPublicKey(e.to_string()))?;
        Ok(Self::new(magic, &key))
    }

    pub fn magic_byte(&self) -> u8 {
        self.magic_byte
    }

    pub fn public_key_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.public_key
    }

    pub fn public_key(&self) -> Result<PublicKey, PrimitiveError> {
        PublicKey::from_slice(&self.public_key)
            .map_err(|e| PrimitiveError::InvalidPublicKey(e.to_string()))
    }

    /// Identifier of the key owner, used for signature map keys and
    /// particle destinations.
    pub fn uid(&self) -> Euid {
        Hash256::of(&self.public_key).euid()
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[0] = self.magic_byte;
        out[1..1 + PUBLIC_KEY_SIZE].copy_from_slice(&self.public_key);
        let checksum = Hash256::of(&out[..1 + PUBLIC_KEY_SIZE]);
        out[1 + PUBLIC_KEY_SIZE..].copy_from_slice(&checksum.as_bytes()[..CHECKSUM_LEN]);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrimitiveError> {
        if bytes.len() != Self::LEN {
            return Err(PrimitiveError::InvalidAddressLength {
                expected: Self::LEN,
                actual: bytes.len(),
            });
        }
        let body = &bytes[..1 + PUBLIC_KEY_SIZE];
        let checksum = Hash256::of(body);
        if checksum.as_bytes()[..CHECKSUM_LEN] != bytes[1 + PUBLIC_KEY_SIZE..] {
            return Err(PrimitiveError::InvalidChecksum);
        }
        // Reject bytes that do not decode to a curve point.
        PublicKey::from_slice(&body[1..])
            .map_err(|e| PrimitiveError::InvalidPublicKey(e.to_string()))?;
        let mut public_key = [0u8; PUBLIC_KEY_SIZE];
        public_key.copy_from_slice(&body[1..]);
        Ok(RadixAddress {
            magic_byte: body[0],
            public_key,
        })
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.to_bytes()).into_string()
    }

    pub fn from_base58(s: &str) -> Result<Self, PrimitiveError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| PrimitiveError::InvalidBase58(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// True when this address belongs to the universe with the given magic.
    pub fn is_in_universe(&self, magic: i32) -> bool {
        self.magic_byte == (magic & 0xff) as u8
    }
}

impl fmt::Display for RadixAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for RadixAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RadixAddress({})", self.to_base58())
    }
}

impl FromStr for RadixAddress {
    type Err = PrimitiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base58(s)
    }
}

impl PartialOrd for RadixAddress {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RadixAddress {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.magic_byte, self.public_key).cmp(&(other.magic_byte, other.public_key))
    }
}
