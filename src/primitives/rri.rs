//! Resource identifiers: `/address/name`

use super::address::RadixAddress;
use crate::error::PrimitiveError;
use std::fmt;
use std::str::FromStr;

const MAX_NAME_LEN: usize = 14;

/// Names a token or unique claim owned by an address.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rri {
    address: RadixAddress,
    name: String,
}

impl Rri {
    pub fn new(address: RadixAddress, name: impl Into<String>) -> Result<Self, PrimitiveError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Rri { address, name })
    }

    pub fn address(&self) -> &RadixAddress {
        &self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn validate_name(name: &str) -> Result<(), PrimitiveError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name.bytes().all(|b| b.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(PrimitiveError::InvalidRriName(name.to_string()))
    }
}

impl fmt::Display for Rri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.address, self.name)
    }
}

impl fmt::Debug for Rri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rri({})", self)
    }
}

impl FromStr for Rri {
    type Err = PrimitiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() != 3 || !parts[0].is_empty() {
            return Err(PrimitiveError::InvalidRri(s.to_string()));
        }
        let address = RadixAddress::from_base58(parts[1])?;
        Rri::new(address, parts[2])
    }
}
