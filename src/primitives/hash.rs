//! Hash values and entity identifiers

use crate::error::PrimitiveError;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// 32-byte double SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    pub const LEN: usize = 32;

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash256(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, PrimitiveError> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| PrimitiveError::InvalidLength {
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Hash256(array))
    }

    /// `sha256(sha256(data))`
    pub fn of(data: &[u8]) -> Self {
        let first = Sha256::digest(data);
        Hash256(Sha256::digest(first).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Number of leading zero bits when read as a big-endian integer.
    pub fn leading_zero_bits(&self) -> u32 {
        let mut count = 0;
        for byte in self.0 {
            if byte == 0 {
                count += 8;
            } else {
                count += byte.leading_zeros();
                break;
            }
        }
        count
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, PrimitiveError> {
        let bytes = hex::decode(s).map_err(|e| PrimitiveError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn euid(&self) -> Euid {
        Euid::from_hash(self)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl FromStr for Hash256 {
    type Err = PrimitiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// 128-bit entity identifier: the first 16 bytes of a [`Hash256`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Euid([u8; 16]);

impl Euid {
    pub const LEN: usize = 16;

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Euid(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, PrimitiveError> {
        let array: [u8; 16] = bytes.try_into().map_err(|_| PrimitiveError::InvalidLength {
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Euid(array))
    }

    pub fn from_hash(hash: &Hash256) -> Self {
        let mut out = [0u8; 16];
        out.copy_from_slice(&hash.as_bytes()[..16]);
        Euid(out)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, PrimitiveError> {
        let bytes = hex::decode(s).map_err(|e| PrimitiveError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for Euid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Euid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Euid({})", self.to_hex())
    }
}

impl FromStr for Euid {
    type Err = PrimitiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_hash() {
        let once: [u8; 32] = Sha256::digest(b"radix").into();
        let twice: [u8; 32] = Sha256::digest(once).into();
        assert_eq!(Hash256::of(b"radix").as_bytes(), &twice);
    }

    #[test]
    fn test_leading_zero_bits() {
        let mut bytes = [0xffu8; 32];
        assert_eq!(Hash256::from_bytes(bytes).leading_zero_bits(), 0);
        bytes[0] = 0;
        bytes[1] = 0x0f;
        assert_eq!(Hash256::from_bytes(bytes).leading_zero_bits(), 12);
        assert_eq!(Hash256::from_bytes([0u8; 32]).leading_zero_bits(), 256);
    }

    #[test]
    fn test_euid_is_hash_prefix() {
        let hash = Hash256::of(b"particle");
        let euid = hash.euid();
        assert_eq!(&hash.as_bytes()[..16], euid.as_bytes());
        assert_eq!(euid.to_hex().len(), 32);
        assert_eq!(euid.to_hex().parse::<Euid>().unwrap(), euid);
    }

    #[test]
    fn test_hex_length_checked() {
        assert!(Hash256::from_hex("abcd").is_err());
        assert!(Euid::from_hex("zz").is_err());
    }
}
