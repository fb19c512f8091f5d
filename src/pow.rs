//! Proof-of-work gating atom submission
//!
//! `hash(magic ‖ seed ‖ nonce)` must not exceed a target with the requested
//! number of leading zero bits. The search walks nonces upward from zero, so
//! a given seed, magic and difficulty always yield the same nonce.

use crate::error::PowError;
use crate::primitives::Hash256;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const DEFAULT_LEADING_ZEROS: u32 = 16;

/// How often the async search checks for cancellation.
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Convert a leading zero bit count to a 256-bit big-endian target.
pub fn target(leading_zeros: u32) -> Result<[u8; 32], PowError> {
    if leading_zeros > 256 {
        return Err(PowError::TargetTooLarge(leading_zeros));
    }
    let mut target = [0xFF; 32];
    let zero_bytes = leading_zeros / 8;
    let partial_bits = leading_zeros % 8;

    for item in target.iter_mut().take(zero_bytes as usize) {
        *item = 0;
    }

    if zero_bytes < 32 && partial_bits > 0 {
        target[zero_bytes as usize] = 0xFF >> partial_bits;
    }
    Ok(target)
}

fn pow_input(magic: i32, seed: &Hash256) -> [u8; 44] {
    let mut input = [0u8; 44];
    input[..4].copy_from_slice(&magic.to_be_bytes());
    input[4..36].copy_from_slice(seed.as_bytes());
    input
}

pub fn pow_hash(magic: i32, seed: &Hash256, nonce: u64) -> Hash256 {
    let mut input = pow_input(magic, seed);
    input[36..].copy_from_slice(&nonce.to_be_bytes());
    Hash256::of(&input)
}

/// Parameters of one proof-of-work puzzle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofOfWork {
    pub seed: Hash256,
    pub magic: i32,
    pub leading_zeros: u32,
}

impl ProofOfWork {
    pub fn new(seed: Hash256, magic: i32, leading_zeros: u32) -> Self {
        ProofOfWork {
            seed,
            magic,
            leading_zeros,
        }
    }

    /// Verification counterpart of [`ProofOfWork::work`].
    pub fn prove(&self, nonce: u64) -> Result<bool, PowError> {
        let target = target(self.leading_zeros)?;
        Ok(pow_hash(self.magic, &self.seed, nonce).as_bytes() <= &target)
    }

    /// Blocking search. Returns the smallest nonce meeting the target.
    pub fn work(&self) -> Result<u64, PowError> {
        self.search(|_| false)
    }

    /// Search stopping when `cancel` is triggered.
    pub fn work_cancellable(&self, cancel: &CancellationToken) -> Result<u64, PowError> {
        self.search(|_| cancel.is_cancelled())
    }

    fn search(&self, should_stop: impl Fn(u64) -> bool) -> Result<u64, PowError> {
        let target = target(self.leading_zeros)?;
        let mut input = pow_input(self.magic, &self.seed);
        let mut nonce: u64 = 0;
        loop {
            if nonce % CANCEL_CHECK_INTERVAL == 0 && should_stop(nonce) {
                debug!(attempts = nonce, "Proof-of-work search cancelled");
                return Err(PowError::Cancelled(nonce));
            }
            input[36..].copy_from_slice(&nonce.to_be_bytes());
            if Hash256::of(&input).as_bytes() <= &target {
                return Ok(nonce);
            }
            nonce = nonce.checked_add(1).ok_or(PowError::Exhausted)?;
        }
    }

    /// Runs the search on the blocking pool so the event loop stays free.
    pub async fn work_async(self, cancel: CancellationToken) -> Result<u64, PowError> {
        let started = std::time::Instant::now();
        let nonce = tokio::task::spawn_blocking(move || self.work_cancellable(&cancel))
            .await
            .map_err(|e| PowError::TaskFailed(e.to_string()))??;
        info!(
            nonce,
            leading_zeros = self.leading_zeros,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Proof-of-work found"
        );
        Ok(nonce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_target_shape() {
        let t = target(12).unwrap();
        assert_eq!(t[0], 0x00);
        assert_eq!(t[1], 0x0F);
        assert_eq!(t[2], 0xFF);
        assert_eq!(target(0).unwrap(), [0xFF; 32]);
        assert_eq!(target(256).unwrap(), [0x00; 32]);
        assert_eq!(target(257), Err(PowError::TargetTooLarge(257)));
    }

    #[test]
    fn test_work_is_deterministic_and_provable() {
        let pow = ProofOfWork::new(Hash256::of(b"seed"), -1332248574, 8);
        let nonce = pow.work().unwrap();
        assert_eq!(pow.work().unwrap(), nonce);
        assert!(pow.prove(nonce).unwrap());
        assert!(pow_hash(pow.magic, &pow.seed, nonce).leading_zero_bits() >= 8);
        // No smaller nonce satisfies the target.
        for smaller in 0..nonce {
            assert!(!pow.prove(smaller).unwrap());
        }
    }

    #[test]
    fn test_harder_target_never_easier() {
        let seed = Hash256::of(b"difficulty");
        let easy = ProofOfWork::new(seed, 1, 4).work().unwrap();
        let hard = ProofOfWork::new(seed, 1, 10).work().unwrap();
        assert!(hard >= easy);
        assert!(ProofOfWork::new(seed, 1, 4).prove(hard).unwrap());
    }

    #[test]
    fn test_magic_is_part_of_the_puzzle() {
        let seed = Hash256::of(b"magic");
        assert_ne!(pow_hash(1, &seed, 0), pow_hash(2, &seed, 0));
    }

    #[tokio::test]
    async fn test_async_search_cancels() {
        let result = tokio::time::timeout(Duration::from_secs(5), async {
            let cancel = CancellationToken::new();
            cancel.cancel();
            // Unreachable difficulty; only cancellation can end it.
            ProofOfWork::new(Hash256::of(b"never"), 1, 200)
                .work_async(cancel)
                .await
        })
        .await
        .expect("Test timed out");
        assert_eq!(result, Err(PowError::Cancelled(0)));
    }

    #[tokio::test]
    async fn test_async_search_matches_blocking() {
        tokio::time::timeout(Duration::from_secs(5), async {
            let pow = ProofOfWork::new(Hash256::of(b"async"), 7, 8);
            let nonce = pow.work_async(CancellationToken::new()).await.unwrap();
            assert_eq!(nonce, pow.work().unwrap());
        })
        .await
        .expect("Test timed out");
    }
}
