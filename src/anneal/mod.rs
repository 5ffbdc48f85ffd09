//! Stochastic relaxation (simulated annealing) engine.
//!
//! A single-solution trajectory search over a mutable state owned by an
//! [`EnergyModel`]. Each iteration the model proposes one local mutation;
//! the engine accepts or rejects it, decays the temperature, and checks
//! its stop conditions. Rejected mutations are undone in place through
//! the model's `revert` hook, so the state is never copied.
//!
//! # Acceptance
//!
//! A candidate that is not better than the current objective is rejected
//! when `u > T / |objective - candidate|` with `u ~ U[0, 1)`. This is not
//! the Metropolis rule `exp(-delta / T)` and must not be replaced by it.
//!
//! # References
//!
//! - Kirkpatrick, Gelatt & Vecchi (1983), "Optimization by Simulated Annealing"
//! - Geman & Geman (1984), "Stochastic Relaxation, Gibbs Distributions, and
//!   the Bayesian Restoration of Images"

mod config;
mod runner;
mod types;

pub use config::AnnealConfig;
pub use runner::{AnnealResult, AnnealRun, AnnealingEngine, StopReason};
pub use types::EnergyModel;
