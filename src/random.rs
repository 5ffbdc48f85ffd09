//! Random sources injected into the annealing engine.
//!
//! The engine never touches ambient global randomness. A run owns exactly
//! one [`RandomSource`], handed over at construction, so tests can replace
//! it with a [`SequenceSource`] and replay a fixed decision sequence.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform random numbers consumed by the engine and energy models.
pub trait RandomSource {
    /// Returns a uniform real in `[0, 1)`.
    fn uniform(&mut self) -> f64;

    /// Returns a uniform integer in `[0, bound)`.
    ///
    /// `bound` must be positive.
    fn uniform_int(&mut self, bound: usize) -> usize;
}

impl<S: RandomSource + ?Sized> RandomSource for &mut S {
    fn uniform(&mut self) -> f64 {
        (**self).uniform()
    }

    fn uniform_int(&mut self, bound: usize) -> usize {
        (**self).uniform_int(bound)
    }
}

/// [`RandomSource`] backed by [`StdRng`].
#[derive(Debug, Clone)]
pub struct StdRandomSource {
    rng: StdRng,
}

impl StdRandomSource {
    /// Creates a reproducible source from a seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates a source seeded from operating system entropy.
    ///
    /// Runs using this source are not reproducible.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Seeded when `seed` is `Some`, entropy-seeded otherwise.
    pub fn from_seed_option(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }
}

impl RandomSource for StdRandomSource {
    fn uniform(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    fn uniform_int(&mut self, bound: usize) -> usize {
        debug_assert!(bound > 0, "uniform_int bound must be positive");
        self.rng.random_range(0..bound)
    }
}

/// Deterministic source that cycles through a fixed list of reals.
///
/// Integers are derived from the same sequence as `floor(u * bound)`.
#[derive(Debug, Clone)]
pub struct SequenceSource {
    values: Vec<f64>,
    cursor: usize,
    draws: usize,
}

impl SequenceSource {
    /// Creates a source cycling through `values`.
    ///
    /// # Panics
    /// Panics if `values` is empty or any value is outside `[0, 1)`.
    pub fn new(values: Vec<f64>) -> Self {
        assert!(!values.is_empty(), "sequence must not be empty");
        assert!(
            values.iter().all(|v| (0.0..1.0).contains(v)),
            "sequence values must lie in [0, 1)"
        );
        Self {
            values,
            cursor: 0,
            draws: 0,
        }
    }

    /// Number of values drawn so far.
    pub fn draws(&self) -> usize {
        self.draws
    }

    fn next_value(&mut self) -> f64 {
        let v = self.values[self.cursor];
        self.cursor = (self.cursor + 1) % self.values.len();
        self.draws += 1;
        v
    }
}

impl RandomSource for SequenceSource {
    fn uniform(&mut self) -> f64 {
        self.next_value()
    }

    fn uniform_int(&mut self, bound: usize) -> usize {
        let v = self.next_value();
        ((v * bound as f64) as usize).min(bound.saturating_sub(1))
    }
}
