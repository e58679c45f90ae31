//! Random payload generation.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::error::{Error, Result};

/// Source of trial payloads.
pub trait PayloadSource {
    /// Produce `len` bytes of payload.
    fn random_bytes(&mut self, len: usize) -> Result<Vec<u8>>;
}

/// Cryptographically strong bytes from the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandomSource;

impl PayloadSource for OsRandomSource {
    fn random_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut out = vec![0u8; len];
        if len > 0 {
            getrandom::fill(&mut out)
                .map_err(|e| Error::payload(format!("OS random source failed: {e}")))?;
        }
        Ok(out)
    }
}

/// Reproducible pseudo-random bytes for tests and benches.
#[derive(Debug, Clone)]
pub struct SeededPayloadSource {
    rng: StdRng,
}

impl SeededPayloadSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl PayloadSource for SeededPayloadSource {
    fn random_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut out = vec![0u8; len];
        self.rng.fill_bytes(&mut out);
        Ok(out)
    }
}
