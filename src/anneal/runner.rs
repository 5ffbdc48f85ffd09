//! Annealing execution loop.
//!
//! # Algorithm
//!
//! 1. `init` the model, set `objective = evaluate()`
//! 2. Until a stop condition holds:
//!    a. at the check cadence, `dump` progress
//!    b. `sample` one mutation, `newObjective = evaluate()`
//!    c. if the candidate is not better, draw `u ~ U[0, 1)` and reject
//!       (`revert`) when `u > T / |objective - newObjective|`
//!    d. decay the temperature, accepted or not
//!    e. on acceptance, `objective = newObjective`

use super::config::AnnealConfig;
use super::types::EnergyModel;
use crate::error::AnnealError;
use crate::random::{RandomSource, StdRandomSource};

/// Minimum objective change between two checks that keeps the search alive.
const PLATEAU_TOLERANCE: f64 = 1e-3;

/// Upper bound on the sampled objective history, whatever the budget.
const HISTORY_SAMPLES: u64 = 1000;

/// Why a run ended.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StopReason {
    /// `iteration >= max_iterations`.
    MaxIterations,
    /// `temperature < epsilon`.
    TemperatureFloor,
    /// The objective moved less than the plateau tolerance between two checks.
    Plateau,
    /// A model-defined stop condition.
    Custom(String),
}

/// Mutable bookkeeping of one `solve` call.
///
/// Passed to [`EnergyModel::stop_condition`] and [`EnergyModel::dump`].
#[derive(Debug, Clone)]
pub struct AnnealRun {
    /// Objective of the currently accepted state.
    pub objective: f64,
    /// Objective of the most recently sampled candidate.
    pub new_objective: f64,
    /// Objective recorded at the previous plateau check.
    pub last_objective: f64,
    /// Current temperature. Never increases and never goes negative.
    pub temperature: f64,
    /// Completed iterations.
    pub iteration: u64,
    /// Hard iteration budget.
    pub max_iterations: u64,
    /// Temperature floor.
    pub epsilon: f64,
    /// Multiplicative decay applied every iteration.
    pub decay: f64,
    /// Cadence of dumps and plateau checks; `0` disables both.
    pub check_interval: u64,
}

impl AnnealRun {
    fn new(config: &AnnealConfig) -> Self {
        Self {
            objective: 0.0,
            new_objective: 0.0,
            last_objective: f64::MAX,
            temperature: config.temperature,
            iteration: 0,
            max_iterations: config.max_iterations,
            epsilon: config.epsilon,
            decay: config.decay,
            check_interval: config.check_interval,
        }
    }

    /// Whether the current iteration falls on the check cadence.
    pub fn is_check_iteration(&self) -> bool {
        self.check_interval > 0 && self.iteration % self.check_interval == 0
    }

    /// Iteration budget, temperature floor, then (at the check cadence
    /// only) the plateau test, which also records `last_objective`.
    pub fn default_stop_condition(&mut self) -> Option<StopReason> {
        if self.iteration >= self.max_iterations {
            return Some(StopReason::MaxIterations);
        }
        if self.temperature < self.epsilon {
            return Some(StopReason::TemperatureFloor);
        }
        if self.is_check_iteration() {
            if (self.objective - self.last_objective).abs() < PLATEAU_TOLERANCE {
                return Some(StopReason::Plateau);
            }
            self.last_objective = self.objective;
        }
        None
    }
}

/// Result of an annealing run. The final state stays in the model.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnnealResult {
    /// Objective of the final accepted state.
    pub objective: f64,

    /// Total number of accept/reject iterations.
    pub iterations: u64,

    /// Temperature when the run stopped.
    pub final_temperature: f64,

    /// Number of accepted moves (including improvements).
    pub accepted_moves: u64,

    /// Number of improving moves.
    pub improving_moves: u64,

    /// Which stop condition ended the run.
    pub stop_reason: StopReason,

    /// Accepted objective sampled at regular intervals, plus the first and
    /// final values. Holds at most about a thousand entries.
    pub objective_history: Vec<f64>,
}

/// Drives an [`EnergyModel`] through the annealing loop.
///
/// The engine owns its [`RandomSource`]; the default is a
/// [`StdRandomSource`] seeded from [`AnnealConfig::seed`].
///
/// # Examples
///
/// ```
/// use u_anneal::anneal::{AnnealConfig, AnnealingEngine};
/// use u_anneal::random::SequenceSource;
///
/// let config = AnnealConfig::default().with_max_iterations(100);
/// let engine = AnnealingEngine::with_source(config, SequenceSource::new(vec![0.5]));
/// assert!(engine.is_ok());
/// ```
#[derive(Debug)]
pub struct AnnealingEngine<S: RandomSource = StdRandomSource> {
    config: AnnealConfig,
    source: S,
}

impl AnnealingEngine<StdRandomSource> {
    /// Creates an engine with a source seeded from `config.seed`
    /// (entropy when unset).
    pub fn new(config: AnnealConfig) -> Result<Self, AnnealError> {
        let source = StdRandomSource::from_seed_option(config.seed);
        Self::with_source(config, source)
    }
}

impl<S: RandomSource> AnnealingEngine<S> {
    /// Creates an engine around a caller-supplied source.
    pub fn with_source(config: AnnealConfig, source: S) -> Result<Self, AnnealError> {
        config.validate()?;
        Ok(Self { config, source })
    }

    pub fn config(&self) -> &AnnealConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Runs the search to completion.
    ///
    /// Hook errors are propagated. When `evaluate` fails after a `sample`,
    /// the mutation is reverted first so the model holds the last accepted
    /// state.
    pub fn solve<M: EnergyModel>(&mut self, model: &mut M) -> Result<AnnealResult, AnnealError> {
        let mut run = AnnealRun::new(&self.config);
        let mut accepted_moves = 0u64;
        let mut improving_moves = 0u64;

        model.init(&mut self.source)?;
        run.objective = model.evaluate()?;
        // History: sample every N iterations
        let history_interval = 100.max(self.config.max_iterations / HISTORY_SAMPLES);
        let mut objective_history = vec![run.objective];

        let stop_reason = loop {
            if let Some(reason) = model.stop_condition(&mut run) {
                break reason;
            }

            if run.is_check_iteration() {
                model.dump(&run);
            }

            model.sample(&mut self.source)?;
            run.new_objective = match model.evaluate() {
                Ok(value) => value,
                Err(e) => {
                    model.revert();
                    return Err(e);
                }
            };
            run.iteration += 1;

            let accepted = if model.is_better(run.new_objective, run.objective) {
                improving_moves += 1;
                true
            } else {
                let rnd = self.source.uniform();
                let ratio = run.temperature / (run.objective - run.new_objective).abs();
                let reject = rnd > ratio;
                !reject
            };

            if !accepted {
                model.revert();
                log::trace!(
                    "rejected candidate {:.6} at iteration {}",
                    run.new_objective,
                    run.iteration
                );
            }

            let next = model.decrease_temperature(run.temperature, run.decay);
            if next < run.temperature {
                run.temperature = next.max(0.0);
            }

            if accepted {
                run.objective = run.new_objective;
                accepted_moves += 1;
            }

            if run.iteration % history_interval == 0 {
                objective_history.push(run.objective);
            }
        };

        // Final history entry
        if run.iteration % history_interval != 0 {
            objective_history.push(run.objective);
        }

        log::info!(
            "stop condition satisfied: {:?} (iteration: {}, objective: {:.6}, temperature: {:.6e})",
            stop_reason,
            run.iteration,
            run.objective,
            run.temperature
        );

        Ok(AnnealResult {
            objective: run.objective,
            iterations: run.iteration,
            final_temperature: run.temperature,
            accepted_moves,
            improving_moves,
            stop_reason,
            objective_history,
        })
    }
}
