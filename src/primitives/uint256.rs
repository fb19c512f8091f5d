//! 256-bit unsigned integer used for token amounts, supplies and granularity.
//!
//! Stored as four little-endian `u64` limbs. Only the operations the ledger
//! needs are provided, all of them checked.

use crate::error::PrimitiveError;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UInt256([u64; 4]);

impl UInt256 {
    pub const ZERO: UInt256 = UInt256([0, 0, 0, 0]);
    pub const ONE: UInt256 = UInt256([1, 0, 0, 0]);
    pub const MAX: UInt256 = UInt256([u64::MAX; 4]);
    pub const BYTES: usize = 32;

    pub const fn from_u64(value: u64) -> Self {
        UInt256([value, 0, 0, 0])
    }

    pub const fn from_u128(value: u128) -> Self {
        UInt256([value as u64, (value >> 64) as u64, 0, 0])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 4]
    }

    /// Returns the value as `u128` if it fits.
    pub fn to_u128(&self) -> Option<u128> {
        if self.0[2] != 0 || self.0[3] != 0 {
            return None;
        }
        Some((self.0[1] as u128) << 64 | self.0[0] as u128)
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        for (i, limb) in self.0.iter().rev().enumerate() {
            out[i * 8..(i + 1) * 8].copy_from_slice(&limb.to_be_bytes());
        }
        out
    }

    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        let mut limbs = [0u64; 4];
        for (i, chunk) in bytes.chunks_exact(8).enumerate() {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            limbs[3 - i] = u64::from_be_bytes(buf);
        }
        UInt256(limbs)
    }

    pub fn from_be_slice(bytes: &[u8]) -> Result<Self, PrimitiveError> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| PrimitiveError::InvalidLength {
            expected: Self::BYTES,
            actual: bytes.len(),
        })?;
        Ok(Self::from_be_bytes(array))
    }

    pub fn checked_add(&self, other: &UInt256) -> Option<UInt256> {
        let mut out = [0u64; 4];
        let mut carry = false;
        for (i, slot) in out.iter_mut().enumerate() {
            let (sum, c1) = self.0[i].overflowing_add(other.0[i]);
            let (sum, c2) = sum.overflowing_add(carry as u64);
            *slot = sum;
            carry = c1 || c2;
        }
        if carry {
            None
        } else {
            Some(UInt256(out))
        }
    }

    pub fn checked_sub(&self, other: &UInt256) -> Option<UInt256> {
        let mut out = [0u64; 4];
        let mut borrow = false;
        for (i, slot) in out.iter_mut().enumerate() {
            let (diff, b1) = self.0[i].overflowing_sub(other.0[i]);
            let (diff, b2) = diff.overflowing_sub(borrow as u64);
            *slot = diff;
            borrow = b1 || b2;
        }
        if borrow {
            None
        } else {
            Some(UInt256(out))
        }
    }

    pub fn checked_mul(&self, other: &UInt256) -> Option<UInt256> {
        let mut wide = [0u128; 8];
        for i in 0..4 {
            let mut carry: u128 = 0;
            for j in 0..4 {
                let cur = wide[i + j] + (self.0[i] as u128) * (other.0[j] as u128) + carry;
                wide[i + j] = cur & u64::MAX as u128;
                carry = cur >> 64;
            }
            wide[i + 4] += carry;
        }
        if wide[4..].iter().any(|&w| w != 0) {
            return None;
        }
        Some(UInt256([
            wide[0] as u64,
            wide[1] as u64,
            wide[2] as u64,
            wide[3] as u64,
        ]))
    }

    /// Long division; returns `(quotient, remainder)`.
    pub fn div_rem(&self, divisor: &UInt256) -> Result<(UInt256, UInt256), PrimitiveError> {
        if divisor.is_zero() {
            return Err(PrimitiveError::DivisionByZero);
        }
        if self < divisor {
            return Ok((UInt256::ZERO, *self));
        }
        let mut quotient = UInt256::ZERO;
        let mut remainder = UInt256::ZERO;
        for bit in (0..256).rev() {
            remainder = remainder.shl1();
            if self.bit(bit) {
                remainder.0[0] |= 1;
            }
            if remainder >= *divisor {
                // remainder >= divisor, cannot underflow
                remainder = remainder.wrapping_sub(divisor);
                quotient.set_bit(bit);
            }
        }
        Ok((quotient, remainder))
    }

    pub fn is_multiple_of(&self, divisor: &UInt256) -> bool {
        matches!(self.div_rem(divisor), Ok((_, rem)) if rem.is_zero())
    }

    pub fn saturating_sub(&self, other: &UInt256) -> UInt256 {
        self.checked_sub(other).unwrap_or(UInt256::ZERO)
    }

    fn wrapping_sub(&self, other: &UInt256) -> UInt256 {
        let mut out = [0u64; 4];
        let mut borrow = false;
        for (i, slot) in out.iter_mut().enumerate() {
            let (diff, b1) = self.0[i].overflowing_sub(other.0[i]);
            let (diff, b2) = diff.overflowing_sub(borrow as u64);
            *slot = diff;
            borrow = b1 || b2;
        }
        UInt256(out)
    }

    fn shl1(&self) -> UInt256 {
        let mut out = [0u64; 4];
        let mut carry = 0u64;
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = (self.0[i] << 1) | carry;
            carry = self.0[i] >> 63;
        }
        UInt256(out)
    }

    fn bit(&self, index: usize) -> bool {
        (self.0[index / 64] >> (index % 64)) & 1 == 1
    }

    fn set_bit(&mut self, index: usize) {
        self.0[index / 64] |= 1 << (index % 64);
    }

    /// Sum of an iterator of amounts, `None` on overflow.
    pub fn checked_sum<'a>(values: impl IntoIterator<Item = &'a UInt256>) -> Option<UInt256> {
        values
            .into_iter()
            .try_fold(UInt256::ZERO, |acc, v| acc.checked_add(v))
    }
}

impl Ord for UInt256 {
    fn cmp(&self, other: &Self) -> Ordering {
        for i in (0..4).rev() {
            match self.0[i].cmp(&other.0[i]) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for UInt256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<u64> for UInt256 {
    fn from(value: u64) -> Self {
        UInt256::from_u64(value)
    }
}

impl From<u128> for UInt256 {
    fn from(value: u128) -> Self {
        UInt256::from_u128(value)
    }
}

impl fmt::Display for UInt256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }
        let ten_pow_19 = UInt256::from_u64(10_000_000_000_000_000_000);
        let mut chunks = Vec::new();
        let mut value = *self;
        while !value.is_zero() {
            let (q, r) = value.div_rem(&ten_pow_19).map_err(|_| fmt::Error)?;
            chunks.push(r.0[0]);
            value = q;
        }
        let mut out = String::new();
        for (i, chunk) in chunks.iter().rev().enumerate() {
            if i == 0 {
                out.push_str(&chunk.to_string());
            } else {
                out.push_str(&format!("{:019}", chunk));
            }
        }
        f.write_str(&out)
    }
}

impl fmt::Debug for UInt256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UInt256({})", self)
    }
}

impl FromStr for UInt256 {
    type Err = PrimitiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PrimitiveError::InvalidDecimal(s.to_string()));
        }
        let ten = UInt256::from_u64(10);
        s.bytes().try_fold(UInt256::ZERO, |acc, digit| {
            acc.checked_mul(&ten)
                .and_then(|v| v.checked_add(&UInt256::from_u64((digit - b'0') as u64)))
                .ok_or(PrimitiveError::Overflow)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_sub_carry() {
        let a = UInt256::from_u64(u64::MAX);
        let b = a.checked_add(&UInt256::ONE).unwrap();
        assert_eq!(b.to_u128(), Some(1u128 << 64));
        assert_eq!(b.checked_sub(&UInt256::ONE), Some(a));
        assert!(UInt256::MAX.checked_add(&UInt256::ONE).is_none());
        assert!(UInt256::ZERO.checked_sub(&UInt256::ONE).is_none());
    }

    #[test]
    fn test_mul_and_div() {
        let a = UInt256::from_u128(123_456_789_012_345_678_901_234_567u128);
        let b = UInt256::from_u64(1_000_000_007);
        let product = a.checked_mul(&b).unwrap();
        let (q, r) = product.div_rem(&b).unwrap();
        assert_eq!(q, a);
        assert!(r.is_zero());
        assert!(UInt256::MAX.checked_mul(&UInt256::from_u64(2)).is_none());
        assert_eq!(
            UInt256::ONE.div_rem(&UInt256::ZERO),
            Err(PrimitiveError::DivisionByZero)
        );
    }

    #[test]
    fn test_decimal_round_trip() {
        let max = UInt256::MAX.to_string();
        assert_eq!(
            max,
            "115792089237316195423570985008687907853269984665640564039457584007913129639935"
        );
        assert_eq!(max.parse::<UInt256>().unwrap(), UInt256::MAX);
        assert_eq!("0".parse::<UInt256>().unwrap(), UInt256::ZERO);
        assert_eq!(
            "10000000000000000000".parse::<UInt256>().unwrap().to_string(),
            "10000000000000000000"
        );
        assert!("12a".parse::<UInt256>().is_err());
        assert!("".parse::<UInt256>().is_err());
    }

    #[test]
    fn test_byte_order_and_ordering() {
        let v = UInt256::from_u64(0x0102);
        let bytes = v.to_be_bytes();
        assert_eq!(bytes[30], 0x01);
        assert_eq!(bytes[31], 0x02);
        assert_eq!(UInt256::from_be_bytes(bytes), v);
        assert!(UInt256::from_u128(1u128 << 64) > UInt256::from_u64(u64::MAX));
    }

    #[test]
    fn test_multiple_of() {
        assert!(UInt256::from_u64(100).is_multiple_of(&UInt256::from_u64(10)));
        assert!(!UInt256::from_u64(105).is_multiple_of(&UInt256::from_u64(10)));
        assert!(!UInt256::from_u64(1).is_multiple_of(&UInt256::ZERO));
    }
}
