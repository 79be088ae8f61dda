//! Random sample source for synthetic observations.
//!
//! Wraps a ChaCha20 generator so that a run can be reproduced from a
//! single seed. Without a seed the generator is initialized from OS
//! entropy.

use rand::Rng;
use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore, SeedableRng};
use rand_distr::{Exp1, StandardNormal};

/// Seedable source of uniform, normal and exponential samples.
#[derive(Debug, Clone)]
pub struct Sampler {
    inner: ChaCha20Rng,
}

impl Sampler {
    /// Creates a sampler seeded from the OS entropy source.
    pub fn from_os_entropy() -> Self {
        let mut seed = [0u8; 32];
        rand_core::OsRng.fill_bytes(&mut seed);
        Self {
            inner: ChaCha20Rng::from_seed(seed),
        }
    }

    /// Creates a deterministic sampler.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Creates a sampler from an optional seed.
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::from_seed(seed),
            None => Self::from_os_entropy(),
        }
    }

    /// Derives an independent sampler, deterministic if `self` is.
    pub fn fork(&mut self) -> Self {
        Self::from_seed(self.inner.next_u64())
    }

    /// Uniform sample in `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    /// Standard normal sample (mean 0, stddev 1).
    pub fn normal(&mut self) -> f64 {
        self.inner.sample(StandardNormal)
    }

    /// Exponential sample with rate 1.
    pub fn exponential(&mut self) -> f64 {
        self.inner.sample(Exp1)
    }

    /// Non-negative 63-bit integer.
    pub fn non_negative_int(&mut self) -> i64 {
        self.inner.gen_range(0..=i64::MAX)
    }

    /// Integer in `[0, n)`.
    pub fn int_below(&mut self, n: u32) -> u32 {
        self.inner.gen_range(0..n)
    }
}
