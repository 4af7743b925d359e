use {
    crate::error::{Error, Result},
    parking_lot::Mutex,
    rand::{RngCore, SeedableRng, TryRngCore, rngs::OsRng},
    rand_chacha::ChaCha20Rng,
    std::fmt::{self, Debug},
};

/// Source of the random bytes used for keys and nonces.
pub trait EntropySource: Send + Sync {
    fn fill(&self, dest: &mut [u8]) -> Result<()>;
}

/// Operating system CSPRNG. The only source suitable for real pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    #[inline]
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|err| Error::Entropy(err.to_string()))
    }
}

/// Deterministic stream seeded from a number, for reproducible tests.
///
/// Two instances with the same seed produce the same keys and nonces.
pub struct SeededEntropy(Mutex<ChaCha20Rng>);

impl SeededEntropy {
    #[must_use]
    #[inline]
    pub fn new(seed: u64) -> Self {
        Self(Mutex::new(ChaCha20Rng::seed_from_u64(seed)))
    }
}

impl EntropySource for SeededEntropy {
    #[inline]
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        self.0.lock().fill_bytes(dest);
        Ok(())
    }
}

impl Debug for SeededEntropy {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeededEntropy").finish_non_exhaustive()
    }
}
