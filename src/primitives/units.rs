//! Conversion between decimal token units and ledger sub-units.
//!
//! One token unit is `10^18` sub-units. Amounts on the ledger are always
//! sub-unit integers.

use super::uint256::UInt256;
use crate::error::PrimitiveError;

pub const SUBUNITS_SCALE: u32 = 18;

pub fn subunits_per_unit() -> UInt256 {
    UInt256::from_u64(1_000_000_000_000_000_000)
}

/// Parses `"12.5"` into `12_500_000_000_000_000_000` sub-units.
pub fn to_subunits(units: &str) -> Result<UInt256, PrimitiveError> {
    let invalid = || PrimitiveError::InvalidDecimal(units.to_string());
    let (whole, frac) = match units.split_once('.') {
        Some((w, f)) => (w, f),
        None => (units, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if frac.len() > SUBUNITS_SCALE as usize || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let whole: UInt256 = if whole.is_empty() {
        UInt256::ZERO
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let mut padded = frac.to_string();
    while padded.len() < SUBUNITS_SCALE as usize {
        padded.push('0');
    }
    let frac: UInt256 = padded.parse().map_err(|_| invalid())?;
    whole
        .checked_mul(&subunits_per_unit())
        .and_then(|w| w.checked_add(&frac))
        .ok_or(PrimitiveError::Overflow)
}

/// Formats sub-units as a decimal token amount without trailing zeros.
pub fn from_subunits(amount: &UInt256) -> String {
    // divisor is a nonzero constant
    let (whole, frac) = match amount.div_rem(&subunits_per_unit()) {
        Ok(parts) => parts,
        Err(_) => return amount.to_string(),
    };
    if frac.is_zero() {
        return whole.to_string();
    }
    let frac = format!("{:0>18}", frac.to_string());
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_subunits() {
        assert_eq!(
            to_subunits("1").unwrap(),
            UInt256::from_u64(1_000_000_000_000_000_000)
        );
        assert_eq!(
            to_subunits("1.5").unwrap(),
            UInt256::from_u64(1_500_000_000_000_000_000)
        );
        assert_eq!(to_subunits(".000000000000000001").unwrap(), UInt256::ONE);
        assert!(to_subunits("0.0000000000000000001").is_err());
        assert!(to_subunits("1.2.3").is_err());
        assert!(to_subunits("").is_err());
    }

    #[test]
    fn test_from_subunits() {
        assert_eq!(from_subunits(&to_subunits("42").unwrap()), "42");
        assert_eq!(from_subunits(&to_subunits("0.25").unwrap()), "0.25");
        assert_eq!(from_subunits(&UInt256::ONE), "0.000000000000000001");
    }
}
