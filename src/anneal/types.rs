//! Core trait for annealing energy models.

use super::runner::{AnnealRun, StopReason};
use crate::error::AnnealError;
use crate::random::RandomSource;

/// Defines the state, objective and local moves searched by the engine.
///
/// The model owns the mutable state (for example a label field) and
/// mutates it in place. At most one mutation is outstanding at any time:
/// the engine always resolves `sample` with either an acceptance or a
/// `revert` before sampling again, so a single undo record suffices.
///
/// # Maximization
///
/// The default [`is_better`](EnergyModel::is_better) treats a larger
/// objective as better. Override it for minimization.
///
/// # Examples
///
/// ```
/// use u_anneal::anneal::EnergyModel;
/// use u_anneal::error::AnnealError;
/// use u_anneal::random::RandomSource;
///
/// /// Maximizes the number of set bits.
/// struct OnesModel { bits: Vec<bool>, undo: Option<usize> }
///
/// impl EnergyModel for OnesModel {
///     fn init<R: RandomSource + ?Sized>(&mut self, _rng: &mut R) -> Result<(), AnnealError> {
///         self.bits.iter_mut().for_each(|b| *b = false);
///         Ok(())
///     }
///
///     fn sample<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> Result<(), AnnealError> {
///         let i = rng.uniform_int(self.bits.len());
///         self.bits[i] = !self.bits[i];
///         self.undo = Some(i);
///         Ok(())
///     }
///
///     fn evaluate(&mut self) -> Result<f64, AnnealError> {
///         Ok(self.bits.iter().filter(|&&b| b).count() as f64)
///     }
///
///     fn revert(&mut self) {
///         if let Some(i) = self.undo.take() {
///             self.bits[i] = !self.bits[i];
///         }
///     }
/// }
/// ```
pub trait EnergyModel {
    /// Allocates and seeds the state. Must leave the model ready for
    /// [`evaluate`](EnergyModel::evaluate).
    fn init<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> Result<(), AnnealError>;

    /// Applies exactly one local mutation and records how to undo it.
    ///
    /// Must not leave the state partially mutated on error.
    fn sample<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> Result<(), AnnealError>;

    /// Objective of the current state.
    fn evaluate(&mut self) -> Result<f64, AnnealError>;

    /// Undoes the most recent mutation. A no-op when nothing is pending.
    fn revert(&mut self);

    /// Whether `candidate` improves on `current`; improvements are always
    /// accepted.
    fn is_better(&self, candidate: f64, current: f64) -> bool {
        candidate > current
    }

    /// Next temperature. Called once per iteration, accepted or not.
    fn decrease_temperature(&self, temperature: f64, decay: f64) -> f64 {
        temperature * decay
    }

    /// Checked before every iteration; `Some` ends the run.
    fn stop_condition(&mut self, run: &mut AnnealRun) -> Option<StopReason> {
        run.default_stop_condition()
    }

    /// Progress report at the check cadence.
    fn dump(&mut self, run: &AnnealRun) {
        log::debug!(
            "iteration: {} objective: {:.6} temperature: {:.6e}",
            run.iteration,
            run.objective,
            run.temperature
        );
    }
}
