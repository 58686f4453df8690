//! Randomness for handshake nonces and mask keys.

use std::sync::{Mutex, MutexGuard};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// A random source shared by every connection of a process.
///
/// Construct one at startup and hand it to connections through an `Arc`. A seeded instance
/// makes keys reproducible in tests.
#[derive(Debug)]
pub struct Entropy {
    rng: Mutex<StdRng>,
}

impl Default for Entropy {
    fn default() -> Self {
        Self::new()
    }
}

impl Entropy {
    /// Seeded from the operating system.
    pub fn new() -> Self {
        Self { rng: Mutex::new(StdRng::from_entropy()) }
    }

    /// Deterministic output for a given seed.
    pub fn from_seed(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }

    pub fn fill(&self, buf: &mut [u8]) {
        self.lock().fill_bytes(buf);
    }

    /// A fresh 4 byte frame mask key.
    pub fn mask_key(&self) -> [u8; 4] {
        let mut key = [0u8; 4];
        self.fill(&mut key);
        key
    }

    /// 16 random bytes, as used for `Sec-WebSocket-Key`.
    pub fn nonce(&self) -> [u8; 16] {
        let mut nonce = [0u8; 16];
        self.fill(&mut nonce);
        nonce
    }

    fn lock(&self) -> MutexGuard<'_, StdRng> {
        // a panic while holding the lock leaves the generator usable
        self.rng.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_is_reproducible() {
        let a = Entropy::from_seed(7);
        let b = Entropy::from_seed(7);
        assert_eq!(a.nonce(), b.nonce());
        assert_eq!(a.mask_key(), b.mask_key());
    }

    #[test]
    fn keys_differ() {
        let entropy = Entropy::new();
        let keys: Vec<[u8; 16]> = (0..8).map(|_| entropy.nonce()).collect();
        assert!(keys.windows(2).any(|pair| pair[0] != pair[1]));
    }
}
