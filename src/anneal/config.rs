//! Annealing schedule and stopping configuration.

use crate::error::AnnealError;

/// Configuration for the annealing engine.
///
/// # Examples
///
/// ```
/// use u_anneal::anneal::AnnealConfig;
///
/// let config = AnnealConfig::default()
///     .with_temperature(4.0)
///     .with_epsilon(1e-4)
///     .with_decay(0.99)
///     .with_max_iterations(1000)
///     .with_check_interval(100)
///     .with_seed(42);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnnealConfig {
    /// Starting temperature. Must be positive.
    pub temperature: f64,

    /// Temperature floor. The search stops once `T < epsilon`.
    pub epsilon: f64,

    /// Multiplicative temperature decay per iteration, in (0, 1).
    pub decay: f64,

    /// Hard iteration budget. Must be positive.
    pub max_iterations: u64,

    /// Cadence (in iterations) of progress dumps and plateau checks.
    ///
    /// `1` checks every iteration, `0` disables both.
    pub check_interval: u64,

    /// Random seed. `None` seeds from entropy and makes runs
    /// non-reproducible.
    pub seed: Option<u64>,
}

impl Default for AnnealConfig {
    fn default() -> Self {
        Self {
            temperature: 4.0,
            epsilon: 1e-4,
            decay: 0.99999,
            max_iterations: 100_000_000,
            check_interval: 1_000_000,
            seed: None,
        }
    }
}

impl AnnealConfig {
    pub fn with_temperature(mut self, t: f64) -> Self {
        self.temperature = t;
        self
    }

    pub fn with_epsilon(mut self, eps: f64) -> Self {
        self.epsilon = eps;
        self
    }

    pub fn with_decay(mut self, decay: f64) -> Self {
        self.decay = decay;
        self
    }

    pub fn with_max_iterations(mut self, n: u64) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_check_interval(mut self, n: u64) -> Self {
        self.check_interval = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), AnnealError> {
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(AnnealError::InvalidConfig(format!(
                "temperature must be positive and finite, got {}",
                self.temperature
            )));
        }
        if self.epsilon.is_nan() || self.epsilon < 0.0 {
            return Err(AnnealError::InvalidConfig(format!(
                "epsilon must be non-negative, got {}",
                self.epsilon
            )));
        }
        if self.decay.is_nan() || self.decay <= 0.0 || self.decay >= 1.0 {
            return Err(AnnealError::InvalidConfig(format!(
                "decay must be in (0, 1), got {}",
                self.decay
            )));
        }
        if self.max_iterations == 0 {
            return Err(AnnealError::InvalidConfig("max_iterations must be positive".into()));
        }
        Ok(())
    }
}
