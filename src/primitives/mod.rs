//! Leaf value types shared by every other module

pub mod address;
pub mod hash;
pub mod rri;
pub mod uint256;
pub mod units;

pub use address::RadixAddress;
pub use hash::{Euid, Hash256};
pub use rri::Rri;
pub use uint256::UInt256;
pub use units::{from_subunits, to_subunits};

/// Smallest divisible amount of a token. Always non-zero.
pub type Granularity = UInt256;
